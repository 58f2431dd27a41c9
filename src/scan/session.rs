//! Scan lifecycle: admission, cancellation and result delivery for one scan kind.
//!
//! ```text
//! Idle ──start──▶ Scanning ──▶ Completed ─┐
//!  ▲                  │    └──▶ Failed ────┤
//!  └──────stop────────┴────────────────────┘
//! ```
//!
//! `start` is also accepted from `Completed` and `Failed`; only a running pass blocks it.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use strum::Display;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::error::ScanError;
pub use super::process::DEFAULT_GRACE_PERIOD;
use super::ScanOutcome;
use crate::enums::ScanKind;

/// A discovery path the controller can drive.
#[async_trait]
pub trait Strategy: Send + Sync + 'static {
    type Record: Send + 'static;

    fn kind(&self) -> ScanKind;

    /// One complete pass. Implementations never fail; faults ride along in the outcome.
    async fn discover(&self, cancel: &CancellationToken) -> ScanOutcome<Self::Record>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
pub enum ScanState {
    Idle,
    Scanning,
    Completed,
    Failed,
}

/// Result of a completed pass.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport<R> {
    pub kind: ScanKind,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub records: Vec<R>,
    /// Non-fatal fault met during the pass, if any.
    pub warning: Option<String>,
}

/// Resolves once the pass started by [`ScanSession::start`] ends.
#[derive(Debug)]
pub struct ScanTicket<R> {
    rx: oneshot::Receiver<Result<ScanReport<R>, ScanError>>,
}

impl<R> ScanTicket<R> {
    pub async fn wait(self) -> Result<ScanReport<R>, ScanError> {
        self.rx
            .await
            .unwrap_or_else(|_| Err(ScanError::Task("scan task ended without a result".into())))
    }
}

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct ScanSession<S: Strategy> {
    strategy: Arc<S>,
    state: Arc<watch::Sender<ScanState>>,
    running: Mutex<Option<Running>>,
    grace_period: Duration,
}

impl<S: Strategy> ScanSession<S> {
    pub fn new(strategy: S, grace_period: Duration) -> Self {
        let (state, _) = watch::channel(ScanState::Idle);
        Self {
            strategy: Arc::new(strategy),
            state: Arc::new(state),
            running: Mutex::new(None),
            grace_period,
        }
    }

    pub fn kind(&self) -> ScanKind {
        self.strategy.kind()
    }

    pub fn state(&self) -> ScanState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ScanState> {
        self.state.subscribe()
    }

    /// Spawns a pass. Rejected with [`ScanError::AlreadyScanning`] while one is in flight.
    pub fn start(&self) -> Result<ScanTicket<S::Record>, ScanError> {
        let kind = self.kind();
        let admitted = self.state.send_if_modified(|state| {
            if *state == ScanState::Scanning {
                false
            } else {
                *state = ScanState::Scanning;
                true
            }
        });
        if !admitted {
            log::debug!("{kind} scan already running, start rejected");
            return Err(ScanError::AlreadyScanning(kind));
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let strategy = self.strategy.clone();
        let state = self.state.clone();
        let (tx, rx) = oneshot::channel();

        log::info!("{kind} scan started");
        let handle = tokio::spawn(async move {
            let started_at = Local::now();
            // strategies observe the token and wind down on their own; stop() bounds the wait
            let outcome = strategy.discover(&token).await;
            if token.is_cancelled() {
                log::info!("{kind} scan cancelled");
                let _ = tx.send(Err(ScanError::Cancelled));
                return;
            }

            let ScanOutcome { records, fault } = outcome;
            let result = match fault {
                Some(fault) if fault.is_fatal() => {
                    log::error!("{kind} scan failed: {fault}");
                    state.send_replace(ScanState::Failed);
                    Err(fault)
                }
                fault => {
                    if let Some(fault) = &fault {
                        log::warn!("{kind} scan completed with a warning: {fault}");
                    }
                    log::info!("{kind} scan completed with {} records", records.len());
                    state.send_replace(ScanState::Completed);
                    Ok(ScanReport {
                        kind,
                        started_at,
                        finished_at: Local::now(),
                        records,
                        warning: fault.map(|f| f.to_string()),
                    })
                }
            };
            // the caller may have dropped its ticket
            let _ = tx.send(result);
        });

        if let Ok(mut running) = self.running.lock() {
            *running = Some(Running { cancel, handle });
        }
        Ok(ScanTicket { rx })
    }

    /// Cancels the running pass, waits up to the grace period for it to wind down, and returns
    /// to `Idle`.
    pub async fn stop(&self) {
        let running = self.running.lock().ok().and_then(|mut r| r.take());
        if let Some(Running { cancel, mut handle }) = running {
            cancel.cancel();
            match tokio::time::timeout(self.grace_period, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::error!("{} scan task failed: {e}", self.kind()),
                Err(_) => {
                    log::warn!(
                        "{} scan did not stop within {:?}, aborting",
                        self.kind(),
                        self.grace_period
                    );
                    handle.abort();
                }
            }
        }
        self.state.send_replace(ScanState::Idle);
    }
}
