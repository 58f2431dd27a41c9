//! Wireless discovery through the platform's network configuration tool.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use super::error::ScanError;
use super::iw_parser::{parse_iw_dev, parse_iw_scan};
use super::process::{CommandRunner, CommandSpec};
use super::records::AccessPoint;
use super::session::Strategy;
use super::wifi_parser::{TraceEvent, WifiGrammar};
use super::ScanOutcome;
use crate::enums::{ScanKind, WifiTool};

/// Shared collector for netsh parser decisions.
pub type TraceLog = Arc<Mutex<Vec<TraceEvent>>>;

pub struct WifiDiscovery {
    runner: Arc<dyn CommandRunner>,
    tool: WifiTool,
    command: Option<CommandSpec>,
    grammar: WifiGrammar,
    trace: Option<TraceLog>,
}

impl WifiDiscovery {
    pub fn new(runner: Arc<dyn CommandRunner>, tool: WifiTool, grammar: WifiGrammar) -> Self {
        Self {
            runner,
            tool,
            command: None,
            grammar,
            trace: None,
        }
    }

    /// Runs `command` instead of the tool's default listing command.
    pub fn with_command(mut self, command: Option<CommandSpec>) -> Self {
        self.command = command;
        self
    }

    pub fn with_trace(mut self, trace: Option<TraceLog>) -> Self {
        self.trace = trace;
        self
    }

    pub async fn discover(&self, cancel: &CancellationToken) -> ScanOutcome<AccessPoint> {
        let result = match self.tool {
            WifiTool::Netsh => self.netsh(cancel).await,
            WifiTool::Iw => self.iw(cancel).await,
        };
        match result {
            Ok(records) => {
                tracing::info!(tool = %self.tool, access_points = records.len(), "wifi scan finished");
                ScanOutcome::ok(records)
            }
            Err(e) => {
                tracing::warn!(tool = %self.tool, error = %e, "wifi scan failed");
                ScanOutcome::failed(e)
            }
        }
    }

    async fn netsh(&self, cancel: &CancellationToken) -> Result<Vec<AccessPoint>, ScanError> {
        let command = self.command.clone().unwrap_or_else(CommandSpec::netsh_networks);
        let text = self.runner.run(&command, cancel).await?;
        let records = match &self.trace {
            Some(trace) => {
                let mut events = Vec::new();
                let records = self.grammar.parse_traced(&text, &mut events);
                if let Ok(mut log) = trace.lock() {
                    log.extend(events);
                }
                records
            }
            None => self.grammar.parse(&text),
        };
        Ok(records)
    }

    async fn iw(&self, cancel: &CancellationToken) -> Result<Vec<AccessPoint>, ScanError> {
        let command = match &self.command {
            Some(command) => command.clone(),
            None => {
                let interfaces = self.runner.run(&CommandSpec::iw_interfaces(), cancel).await?;
                let interface = parse_iw_dev(&interfaces).ok_or(ScanError::NoWirelessInterface)?;
                tracing::debug!(%interface, "scanning with iw");
                CommandSpec::iw_scan(&interface)
            }
        };
        let text = self.runner.run(&command, cancel).await?;
        Ok(parse_iw_scan(&text))
    }
}

#[async_trait]
impl Strategy for WifiDiscovery {
    type Record = AccessPoint;

    fn kind(&self) -> ScanKind {
        ScanKind::Wifi
    }

    async fn discover(&self, cancel: &CancellationToken) -> ScanOutcome<AccessPoint> {
        WifiDiscovery::discover(self, cancel).await
    }
}
