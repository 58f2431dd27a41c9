use color_eyre::eyre::{eyre, Result};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::time::{interval_at, Instant};

use crate::{
    action::Action,
    cli::{Cli, Command},
    config::Config,
    enums::{OutputFormat, ScanKind},
    export::{write_records, write_report},
    scan::{
        arp::ArpProbe,
        discovery::{NeighborCacheProbe, UdpRoute},
        iw_parser::parse_iw_scan,
        keywords::Locales,
        process::{self, ProcessRunner},
        resolver::{DnsResolver, ResolutionPool},
        vendor::VendorLookup,
        wifi::TraceLog,
        wifi_parser::WifiGrammar,
        HostDiscovery, ScanError, ScanReport, ScanSession, Strategy, WifiDiscovery,
    },
};

pub struct App {
    pub config: Config,
    pub command: Command,
    pub format: OutputFormat,
    pub watch: Option<Duration>,
    pub parser_trace: Option<PathBuf>,
    pub should_quit: bool,
    pub action_tx: Sender<Action>,
    pub action_rx: Receiver<Action>,
    pub post_exit_msg: Option<String>,
}

/// Sessions for the scan kinds the command asked for.
struct Sessions {
    hosts: Option<ScanSession<HostDiscovery>>,
    wifi: Option<ScanSession<WifiDiscovery>>,
    trace: Option<TraceLog>,
}

impl App {
    pub fn new(args: &Cli) -> Result<Self> {
        let config = Config::new()?;
        // Bounded channel; scan results are few and large
        let (action_tx, action_rx) = mpsc::channel(100);

        Ok(Self {
            config,
            command: args.command.clone(),
            format: args.format,
            watch: args.watch.filter(|secs| *secs > 0).map(Duration::from_secs),
            parser_trace: args.parser_trace.clone(),
            should_quit: false,
            action_tx,
            action_rx,
            post_exit_msg: None,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        if let Command::Parse { file, iw } = &self.command {
            let (file, iw) = (file.clone(), *iw);
            return self.parse_file(&file, iw);
        }

        let kinds = self.command.scan_kinds();
        let sessions = self.build_sessions(&kinds).await?;
        let action_tx = self.action_tx.clone();

        let ctrl_c_tx = action_tx.clone();
        tokio::spawn(async move {
            let action = match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    log::info!("Interrupted");
                    Action::Quit
                }
                Err(e) => Action::Error(format!("Unable to listen for ctrl-c: {e}")),
            };
            let _ = ctrl_c_tx.send(action).await;
        });

        if let Some(period) = self.watch {
            let tick_tx = action_tx.clone();
            tokio::spawn(async move {
                let mut ticker = interval_at(Instant::now() + period, period);
                loop {
                    ticker.tick().await;
                    if tick_tx.send(Action::Tick).await.is_err() {
                        break;
                    }
                }
            });
        }

        for kind in &kinds {
            action_tx.try_send(Action::Scan(*kind))?;
        }

        let mut pending: HashSet<ScanKind> = HashSet::new();
        let mut stdout = std::io::stdout();

        while let Some(action) = self.action_rx.recv().await {
            if !matches!(action, Action::Tick) {
                log::debug!("{action:?}");
            }
            let finished = action.finished_kind();
            match action {
                Action::Scan(kind) => {
                    let started = match kind {
                        ScanKind::Hosts => sessions
                            .hosts
                            .as_ref()
                            .map(|s| launch(s, action_tx.clone(), Action::HostsReady)),
                        ScanKind::Wifi => sessions
                            .wifi
                            .as_ref()
                            .map(|s| launch(s, action_tx.clone(), Action::WifiReady)),
                    };
                    match started {
                        Some(Ok(())) => {
                            pending.insert(kind);
                        }
                        Some(Err(e)) => log::warn!("{e}"),
                        None => log::debug!("No {kind} session configured"),
                    }
                }
                Action::HostsReady(ref report) => {
                    write_report(&mut stdout, report, self.format)?;
                    stdout.flush()?;
                }
                Action::WifiReady(ref report) => {
                    write_report(&mut stdout, report, self.format)?;
                    stdout.flush()?;
                }
                Action::ScanFailed(kind, ref message) => {
                    eprintln!("{kind} scan failed: {message}");
                    if self.watch.is_none() {
                        self.post_exit_msg = Some(message.clone());
                    }
                }
                Action::Tick => {
                    for kind in &kinds {
                        action_tx.try_send(Action::Scan(*kind))?;
                    }
                }
                Action::Quit => self.should_quit = true,
                Action::Error(ref err_msg) => {
                    self.post_exit_msg = Some(err_msg.to_string());
                    self.should_quit = true;
                }
            }

            if let Some(kind) = finished {
                pending.remove(&kind);
                if self.watch.is_none() && pending.is_empty() {
                    self.should_quit = true;
                }
            }

            if self.should_quit {
                log::info!("Application shutting down, stopping scans");
                self.shutdown(&sessions).await;
                break;
            }
        }

        if let Some(trace) = &sessions.trace {
            self.write_trace(trace)?;
        }

        self.exit_status()
    }

    /// Turns a recorded failure into the error `main` exits with.
    fn exit_status(&self) -> Result<()> {
        match &self.post_exit_msg {
            Some(msg) => Err(eyre!("`netsurvey` failed with Error: {msg}")),
            None => Ok(()),
        }
    }

    async fn build_sessions(&self, kinds: &[ScanKind]) -> Result<Sessions> {
        let cfg = &self.config;
        let grace = cfg.process.grace_period();
        let runner = Arc::new(ProcessRunner::new(
            cfg.process.timeout(),
            grace,
            cfg.process.code_page,
        ));
        // a stopping pass may spend one grace period on its child before killing it
        let stop_grace = grace * 2;

        let hosts = if kinds.contains(&ScanKind::Hosts) {
            let vendors = if cfg.scan.vendor_lookup {
                VendorLookup::load().await
            } else {
                None
            };
            let pool = ResolutionPool::new(
                Arc::new(DnsResolver::new()),
                cfg.scan.resolver_concurrency,
                cfg.scan.resolver_timeout(),
            );
            let fallback = NeighborCacheProbe::new(
                runner.clone(),
                cfg.commands.neighbor_command(),
                cfg.commands.neighbor_format(),
            );
            let discovery = HostDiscovery::new(
                Arc::new(UdpRoute::new(cfg.scan.probe_target)),
                Arc::new(ArpProbe::new(cfg.scan.arp_window())),
                Arc::new(fallback),
                pool,
            )
            .with_vendors(vendors);
            Some(ScanSession::new(discovery, stop_grace))
        } else {
            None
        };

        let trace: Option<TraceLog> = self.parser_trace.as_ref().map(|_| TraceLog::default());
        let wifi = if kinds.contains(&ScanKind::Wifi) {
            let discovery = WifiDiscovery::new(runner, cfg.wifi.tool, self.grammar()?)
                .with_command(cfg.commands.wifi_command())
                .with_trace(trace.clone());
            Some(ScanSession::new(discovery, stop_grace))
        } else {
            None
        };

        Ok(Sessions { hosts, wifi, trace })
    }

    fn grammar(&self) -> Result<WifiGrammar> {
        let locales = Locales::with_extra(&self.config.wifi.locales);
        WifiGrammar::new(&locales).map_err(|e| eyre!("invalid wifi keyword in configuration: {e}"))
    }

    async fn shutdown(&self, sessions: &Sessions) {
        let shutdown_start = std::time::Instant::now();
        if let Some(hosts) = &sessions.hosts {
            log::debug!("Stopping {} session ({})", hosts.kind(), hosts.state());
            hosts.stop().await;
        }
        if let Some(wifi) = &sessions.wifi {
            log::debug!("Stopping {} session ({})", wifi.kind(), wifi.state());
            wifi.stop().await;
        }
        log::info!("All scans stopped in {:?}", shutdown_start.elapsed());
    }

    /// Parses a saved tool dump with the same decoding as a live run.
    fn parse_file(&self, path: &Path, iw: bool) -> Result<()> {
        let bytes = std::fs::read(path)?;
        let text = process::decode(&bytes, self.config.process.code_page).unwrap_or_else(|| {
            log::warn!("{} holds no readable text", path.display());
            String::new()
        });

        let records = if iw {
            parse_iw_scan(&text)
        } else {
            let grammar = self.grammar()?;
            match &self.parser_trace {
                Some(_) => {
                    let mut events = Vec::new();
                    let records = grammar.parse_traced(&text, &mut events);
                    self.write_trace(&Arc::new(Mutex::new(events)))?;
                    records
                }
                None => grammar.parse(&text),
            }
        };
        log::info!("Parsed {} access points from {}", records.len(), path.display());

        let mut stdout = std::io::stdout();
        write_records(&mut stdout, &records, self.format)?;
        stdout.flush()?;
        Ok(())
    }

    fn write_trace(&self, trace: &TraceLog) -> Result<()> {
        let Some(path) = &self.parser_trace else {
            return Ok(());
        };
        let events = trace.lock().map_err(|_| eyre!("parser trace lock poisoned"))?;
        let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
        for event in events.iter() {
            writeln!(file, "{event}")?;
        }
        file.flush()?;
        log::info!("Wrote {} parser trace events to {}", events.len(), path.display());
        Ok(())
    }
}

/// Starts a pass and forwards its result to the loop.
fn launch<S: Strategy>(
    session: &ScanSession<S>,
    tx: Sender<Action>,
    ready: fn(ScanReport<S::Record>) -> Action,
) -> Result<(), ScanError> {
    let kind = session.kind();
    let ticket = session.start()?;
    tokio::spawn(async move {
        let action = match ticket.wait().await {
            Ok(report) => ready(report),
            Err(ScanError::Cancelled) => return,
            Err(e) => Action::ScanFailed(kind, e.to_string()),
        };
        // the loop may already be gone
        let _ = tx.send(action).await;
    });
    Ok(())
}
