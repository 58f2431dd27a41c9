//! Running the external discovery tools.
//!
//! [`ProcessRunner`] spawns a command without a console window, collects both pipes, enforces a
//! hard timeout and honours cooperative cancellation. Output is decoded with the configured
//! legacy code page first, falling back to UTF-16/UTF-8 with replacement characters.

use async_trait::async_trait;
use std::fmt;
use std::io;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use super::codepage::CodePage;
use super::error::ProcessError;

const REPLACEMENT_CHARACTER: char = '\u{fffd}';

// keep diagnostics in errors and logs short
const MAX_DIAGNOSTIC_LEN: usize = 512;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(500);

/// Program plus arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Builds a command from a config-style argv list; `None` when it is empty.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    /// Platform command that lists the OS neighbor cache.
    pub fn neighbor_cache() -> Self {
        if cfg!(target_os = "linux") {
            Self::new("ip", &["neigh", "show"])
        } else {
            Self::new("arp", &["-a"])
        }
    }

    /// `netsh` listing of visible networks grouped by access point.
    pub fn netsh_networks() -> Self {
        Self::new("netsh", &["wlan", "show", "networks", "mode=bssid"])
    }

    pub fn iw_interfaces() -> Self {
        Self::new("iw", &["dev"])
    }

    pub fn iw_scan(interface: &str) -> Self {
        Self::new("iw", &["dev", interface, "scan"])
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Runs a command to completion and returns its decoded stdout.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        command: &CommandSpec,
        cancel: &CancellationToken,
    ) -> Result<String, ProcessError>;
}

/// Captured pipes of a finished process.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RawOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
    grace_period: Duration,
    code_page: CodePage,
}

enum Interrupted {
    Timeout,
    Cancelled,
}

impl ProcessRunner {
    pub fn new(timeout: Duration, grace_period: Duration, code_page: CodePage) -> Self {
        Self {
            timeout,
            grace_period,
            code_page,
        }
    }

    /// Spawns `command` and waits for it, the timeout or `cancel`, whichever comes first.
    pub async fn run_raw(
        &self,
        command: &CommandSpec,
        cancel: &CancellationToken,
    ) -> Result<RawOutput, ProcessError> {
        let started = Instant::now();
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        extend_search_path(&mut cmd);
        hide_console(&mut cmd);

        let mut child = cmd.spawn().map_err(|e| spawn_error(command, e))?;
        tracing::debug!(%command, pid = ?child.id(), "spawned");

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let finished = tokio::select! {
            res = async { tokio::try_join!(child.wait(), drain(stdout), drain(stderr)) } => Ok(res),
            _ = tokio::time::sleep(self.timeout) => Err(Interrupted::Timeout),
            _ = cancel.cancelled() => Err(Interrupted::Cancelled),
        };

        match finished {
            Ok(Ok((status, stdout, stderr))) => {
                tracing::debug!(
                    %command,
                    code = ?status.code(),
                    stdout = stdout.len(),
                    stderr = stderr.len(),
                    elapsed = ?started.elapsed(),
                    "finished"
                );
                if status.success() {
                    Ok(RawOutput { stdout, stderr })
                } else {
                    let diagnostic = if stderr.is_empty() { &stdout } else { &stderr };
                    Err(ProcessError::NonZeroExit {
                        command: command.to_string(),
                        code: status.code(),
                        output: diagnostic_text(diagnostic),
                    })
                }
            }
            Ok(Err(source)) => Err(ProcessError::Io {
                command: command.to_string(),
                source,
            }),
            Err(Interrupted::Timeout) => {
                tracing::warn!(%command, timeout = ?self.timeout, "timed out, killing");
                if let Err(e) = child.kill().await {
                    tracing::warn!(%command, "kill failed: {e}");
                }
                Err(ProcessError::Timeout {
                    command: command.to_string(),
                    timeout: self.timeout,
                })
            }
            Err(Interrupted::Cancelled) => {
                self.terminate(&mut child, command).await;
                Err(ProcessError::Cancelled {
                    command: command.to_string(),
                })
            }
        }
    }

    /// Gives a cancelled child the grace period to exit on its own, then kills it.
    async fn terminate(&self, child: &mut Child, command: &CommandSpec) {
        match tokio::time::timeout(self.grace_period, child.wait()).await {
            Ok(_) => tracing::debug!(%command, "exited after cancellation"),
            Err(_) => {
                tracing::debug!(%command, grace = ?self.grace_period, "still running, killing");
                if let Err(e) = child.kill().await {
                    tracing::warn!(%command, "kill failed: {e}");
                }
            }
        }
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT, DEFAULT_GRACE_PERIOD, CodePage::default())
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        command: &CommandSpec,
        cancel: &CancellationToken,
    ) -> Result<String, ProcessError> {
        let raw = self.run_raw(command, cancel).await?;
        decode(&raw.stdout, self.code_page).ok_or_else(|| ProcessError::Undecodable {
            command: command.to_string(),
        })
    }
}

async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

fn spawn_error(command: &CommandSpec, err: io::Error) -> ProcessError {
    let command_text = command.to_string();
    match err.kind() {
        io::ErrorKind::NotFound => ProcessError::NotFound {
            command: command_text,
        },
        io::ErrorKind::PermissionDenied => ProcessError::PermissionDenied {
            command: command_text,
        },
        _ => ProcessError::Io {
            command: command_text,
            source: err,
        },
    }
}

#[cfg(windows)]
fn hide_console(cmd: &mut Command) {
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    cmd.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(windows))]
fn hide_console(_cmd: &mut Command) {}

// `iw` and `ip` live in sbin, which is not on every user's PATH
#[cfg(unix)]
fn extend_search_path(cmd: &mut Command) {
    const SYSTEM_PATH: &str = "/usr/sbin:/sbin";
    let path = std::env::var_os("PATH").map_or(SYSTEM_PATH.to_string(), |v| {
        format!("{}:{}", v.to_string_lossy(), SYSTEM_PATH)
    });
    cmd.env("PATH", path);
}

#[cfg(not(unix))]
fn extend_search_path(_cmd: &mut Command) {}

fn diagnostic_text(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    match text.char_indices().nth(MAX_DIAGNOSTIC_LEN) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Decodes tool output.
///
/// Tries `code_page` strictly, then UTF-16LE (BOM or interleaved NULs) or UTF-8 with
/// replacement characters. ANSI escape sequences are removed. Returns `None` when nothing but
/// replacement characters survives.
pub fn decode(bytes: &[u8], code_page: CodePage) -> Option<String> {
    let text = match code_page.decode(bytes) {
        Some(text) => text,
        None => decode_universal(bytes),
    };
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
    let text = if text.contains('\u{1b}') {
        strip_ansi_escapes::strip_str(text)
    } else {
        text.to_string()
    };

    let mut visible = text.chars().filter(|c| !c.is_whitespace()).peekable();
    if visible.peek().is_some() && visible.all(|c| c == REPLACEMENT_CHARACTER) {
        return None;
    }
    Some(text)
}

fn decode_universal(bytes: &[u8]) -> String {
    if let Some(body) = bytes.strip_prefix(&[0xff, 0xfe]) {
        return utf16le(body);
    }
    if looks_wide(bytes) {
        return utf16le(bytes);
    }
    String::from_utf8_lossy(bytes).into_owned()
}

fn looks_wide(bytes: &[u8]) -> bool {
    let sample = &bytes[..bytes.len().min(256)];
    if sample.len() < 4 {
        return false;
    }
    let odd = sample.iter().skip(1).step_by(2);
    let zeros = odd.clone().filter(|&&b| b == 0).count();
    zeros * 4 >= odd.count() * 3
}

fn utf16le(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair.get(1).copied().unwrap_or(0)]))
        .collect();
    String::from_utf16_lossy(&units)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_page_comes_first() {
        let text = decode(b"Authentification : WPA2 - Personnel\r\nChiffrement\xff: CCMP", CodePage::Cp850)
            .unwrap();
        assert!(text.contains("Chiffrement\u{a0}: CCMP"));
    }

    #[test]
    fn utf8_with_replacement() {
        let text = decode(b"SSID 1 : Caf\xc3\xa9 \xff", CodePage::Utf8).unwrap();
        assert_eq!(text, "SSID 1 : Café \u{fffd}");
    }

    #[test]
    fn wide_output_falls_back_to_utf16() {
        let wide: Vec<u8> = "SSID 1 : Home"
            .encode_utf16()
            .flat_map(|u| u.to_le_bytes())
            .collect();
        assert_eq!(decode(&wide, CodePage::Cp850).unwrap(), "SSID 1 : Home");

        let mut with_bom = vec![0xff, 0xfe];
        with_bom.extend_from_slice(&wide);
        assert_eq!(decode(&with_bom, CodePage::Utf8).unwrap(), "SSID 1 : Home");
    }

    #[test]
    fn ansi_colours_are_stripped() {
        let text = decode(b"\x1b[32m192.168.1.1\x1b[0m dev eth0", CodePage::Utf8).unwrap();
        assert_eq!(text, "192.168.1.1 dev eth0");
    }

    #[test]
    fn garbage_only_is_undecodable() {
        assert_eq!(decode(b"\xfd\xfe\xff", CodePage::Utf8), None);
        assert_eq!(decode(b"", CodePage::Utf8).as_deref(), Some(""));
    }

    #[test]
    fn argv_round_trip() {
        let spec = CommandSpec::from_argv(&["arp".to_string(), "-a".to_string()]).unwrap();
        assert_eq!(spec, CommandSpec::new("arp", &["-a"]));
        assert_eq!(spec.to_string(), "arp -a");
        assert!(CommandSpec::from_argv(&[]).is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn missing_program_is_not_found() {
        let runner = ProcessRunner::default();
        let cmd = CommandSpec::new("netsurvey-definitely-missing-tool", &[]);
        let err = runner
            .run(&cmd, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::NotFound { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_keeps_diagnostics() {
        let runner = ProcessRunner::default();
        let cmd = CommandSpec::new("sh", &["-c", "echo boom >&2; exit 3"]);
        match runner.run(&cmd, &CancellationToken::new()).await {
            Err(ProcessError::NonZeroExit { code, output, .. }) => {
                assert_eq!(code, Some(3));
                assert_eq!(output, "boom");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_process_times_out() {
        let runner = ProcessRunner::new(
            Duration::from_millis(100),
            Duration::from_millis(50),
            CodePage::Utf8,
        );
        let cmd = CommandSpec::new("sleep", &["5"]);
        let started = Instant::now();
        let err = runner
            .run(&cmd, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cancellation_stops_waiting() {
        let runner = ProcessRunner::new(
            Duration::from_secs(30),
            Duration::from_millis(50),
            CodePage::Utf8,
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });
        let started = Instant::now();
        let err = runner
            .run(&CommandSpec::new("sleep", &["5"]), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Cancelled { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_stdout() {
        let runner = ProcessRunner::default();
        let text = runner
            .run(
                &CommandSpec::new("printf", &["SSID 1 : Home\\n"]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(text, "SSID 1 : Home\n");
    }
}
