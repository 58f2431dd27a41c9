use std::time::Duration;
use thiserror::Error;

use crate::enums::ScanKind;

/// Failure of a single external command.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("`{command}` was not found")]
    NotFound { command: String },
    #[error("not permitted to run `{command}`")]
    PermissionDenied { command: String },
    #[error("`{command}` exited with status {code:?}: {output}")]
    NonZeroExit {
        command: String,
        code: Option<i32>,
        output: String,
    },
    #[error("`{command}` did not finish within {timeout:?}")]
    Timeout { command: String, timeout: Duration },
    #[error("`{command}` was cancelled")]
    Cancelled { command: String },
    #[error("`{command}` output could not be decoded")]
    Undecodable { command: String },
    #[error("failed to run `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Everything that can go wrong during a discovery pass.
///
/// Strategies never return these directly; they attach them to a
/// [`ScanOutcome`](super::ScanOutcome) as a diagnostic. The session controller decides which ones
/// the user gets to see.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("{command} is unavailable: {reason}")]
    ProcessUnavailable { command: String, reason: String },
    #[error("{command} timed out after {timeout:?}")]
    ProcessTimeout { command: String, timeout: Duration },
    #[error("{command} failed with status {code:?}")]
    ProcessFailed { command: String, code: Option<i32> },
    #[error("output of {command} could not be decoded")]
    DecodeFailure { command: String },
    #[error("could not determine the local IPv4 address")]
    NoLocalAddress,
    #[error("address resolution probe failed: {0}")]
    Probe(String),
    #[error("no wireless interface found")]
    NoWirelessInterface,
    #[error("a {0} scan is already running")]
    AlreadyScanning(ScanKind),
    #[error("scan cancelled")]
    Cancelled,
    #[error("scan task failed: {0}")]
    Task(String),
}

impl ScanError {
    /// Faults that leave a scan kind entirely non-functional, as opposed to per-pass hiccups the
    /// next pass may not hit.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScanError::ProcessUnavailable { .. })
    }
}

impl From<ProcessError> for ScanError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::NotFound { command } => ScanError::ProcessUnavailable {
                command,
                reason: "command not found".to_string(),
            },
            ProcessError::PermissionDenied { command } => ScanError::ProcessUnavailable {
                command,
                reason: "permission denied".to_string(),
            },
            ProcessError::NonZeroExit { command, code, .. } => {
                ScanError::ProcessFailed { command, code }
            }
            ProcessError::Timeout { command, timeout } => {
                ScanError::ProcessTimeout { command, timeout }
            }
            ProcessError::Cancelled { .. } => ScanError::Cancelled,
            ProcessError::Undecodable { command } => ScanError::DecodeFailure { command },
            ProcessError::Io { command, source } => ScanError::ProcessFailed {
                command: format!("{command} ({source})"),
                code: None,
            },
        }
    }
}
