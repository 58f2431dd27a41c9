use color_eyre::eyre::Result;
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

use crate::enums::{NeighborFormat, WifiTool};
use crate::scan::{
    arp, codepage::CodePage, discovery::DEFAULT_PROBE_TARGET, keywords::Locale, process, resolver,
    session, CommandSpec,
};
use crate::utils::{get_config_dir, PROJECT_NAME};

const CONFIG: &str = include_str!("../.config/config.json5");

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    pub probe_target: SocketAddr,
    pub arp_timeout_ms: u64,
    pub resolver_concurrency: usize,
    pub resolver_timeout_ms: u64,
    pub vendor_lookup: bool,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            probe_target: DEFAULT_PROBE_TARGET,
            arp_timeout_ms: arp::DEFAULT_WINDOW.as_millis() as u64,
            resolver_concurrency: resolver::DEFAULT_CONCURRENCY,
            resolver_timeout_ms: resolver::DEFAULT_TIMEOUT.as_millis() as u64,
            vendor_lookup: true,
        }
    }
}

impl ScanSettings {
    pub fn arp_window(&self) -> Duration {
        Duration::from_millis(self.arp_timeout_ms)
    }

    pub fn resolver_timeout(&self) -> Duration {
        Duration::from_millis(self.resolver_timeout_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProcessSettings {
    pub timeout_ms: u64,
    pub grace_period_ms: u64,
    pub code_page: CodePage,
}

impl Default for ProcessSettings {
    fn default() -> Self {
        Self {
            timeout_ms: process::DEFAULT_TIMEOUT.as_millis() as u64,
            grace_period_ms: session::DEFAULT_GRACE_PERIOD.as_millis() as u64,
            code_page: CodePage::default(),
        }
    }
}

impl ProcessSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

/// Overrides for the external commands. Empty lists keep the platform default.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CommandSettings {
    pub neighbors: Vec<String>,
    /// Grammar of the neighbor listing; follows the platform when unset.
    pub neighbor_format: Option<NeighborFormat>,
    pub wifi: Vec<String>,
}

impl CommandSettings {
    pub fn neighbor_command(&self) -> CommandSpec {
        CommandSpec::from_argv(&self.neighbors).unwrap_or_else(CommandSpec::neighbor_cache)
    }

    pub fn neighbor_format(&self) -> NeighborFormat {
        self.neighbor_format.unwrap_or_else(|| {
            match CommandSpec::from_argv(&self.neighbors) {
                Some(command) if command.program.ends_with("arp") => NeighborFormat::arp_listing(),
                Some(command) if command.program.ends_with("ip") => NeighborFormat::IpNeigh,
                _ => NeighborFormat::default(),
            }
        })
    }

    pub fn wifi_command(&self) -> Option<CommandSpec> {
        CommandSpec::from_argv(&self.wifi)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct WifiSettings {
    pub tool: WifiTool,
    /// Keyword locales in addition to the built-in ones.
    pub locales: Vec<Locale>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanSettings,
    #[serde(default)]
    pub process: ProcessSettings,
    #[serde(default)]
    pub commands: CommandSettings,
    #[serde(default)]
    pub wifi: WifiSettings,
}

impl Config {
    pub fn new() -> Result<Self> {
        let default_config: Config = json5::from_str(CONFIG)?;
        let config_dir = get_config_dir();
        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(CONFIG, config::FileFormat::Json5));

        let config_files = [
            ("config.json5", config::FileFormat::Json5),
            ("config.json", config::FileFormat::Json),
            ("config.yaml", config::FileFormat::Yaml),
            ("config.toml", config::FileFormat::Toml),
            ("config.ini", config::FileFormat::Ini),
        ];
        let mut found_config = false;
        for (file, format) in &config_files {
            let path = config_dir.join(file);
            builder = builder.add_source(config::File::from(path.clone()).format(*format).required(false));
            if path.exists() {
                found_config = true;
            }
        }
        if !found_config {
            log::info!("No configuration file found in {}, using defaults", config_dir.display());
        }
        builder = builder.add_source(
            config::Environment::with_prefix(&PROJECT_NAME)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let mut cfg: Self = builder.build()?.try_deserialize()?;

        // a user list replaces the embedded one; keep embedded locales the user did not redefine
        for locale in default_config.wifi.locales {
            if !cfg.wifi.locales.iter().any(|l| l.name == locale.name) {
                cfg.wifi.locales.push(locale);
            }
        }

        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn embedded_defaults_match_code_defaults() {
        let c: Config = json5::from_str(CONFIG).unwrap();
        assert_eq!(c.scan, ScanSettings::default());
        assert_eq!(c.process, ProcessSettings::default());
        assert_eq!(c.commands, CommandSettings::default());
        assert_eq!(c.wifi.tool, WifiTool::default());
    }

    #[test]
    fn embedded_locales_are_named() {
        let c: Config = json5::from_str(CONFIG).unwrap();
        let names: Vec<_> = c.wifi.locales.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["nl", "sv"]);
        assert_eq!(c.wifi.locales[0].channel, vec!["Kanaal".to_string()]);
    }

    #[test]
    fn command_overrides() {
        let commands: CommandSettings = json5::from_str(
            r#"{ "neighbors": ["arp", "-an"], "wifi": ["cat", "/tmp/netsh.txt"] }"#,
        )
        .unwrap();
        assert_eq!(commands.neighbor_command(), CommandSpec::new("arp", &["-an"]));
        assert_eq!(commands.neighbor_format(), NeighborFormat::arp_listing());
        assert_eq!(
            commands.wifi_command(),
            Some(CommandSpec::new("cat", &["/tmp/netsh.txt"]))
        );

        let explicit: CommandSettings =
            json5::from_str(r#"{ "neighbors": ["/usr/local/bin/neigh"], "neighbor_format": "ip-neigh" }"#)
                .unwrap();
        assert_eq!(explicit.neighbor_format(), NeighborFormat::IpNeigh);
    }

    #[test]
    fn empty_overrides_use_platform_defaults() {
        let commands = CommandSettings::default();
        assert_eq!(commands.neighbor_command(), CommandSpec::neighbor_cache());
        assert_eq!(commands.neighbor_format(), NeighborFormat::default());
        assert_eq!(commands.wifi_command(), None);
    }

    #[test]
    fn settings_parse_code_pages_and_tools() {
        let c: Config = json5::from_str(
            r#"{ "process": { "code_page": "cp437" }, "wifi": { "tool": "netsh" } }"#,
        )
        .unwrap();
        assert_eq!(c.process.code_page, CodePage::Cp437);
        assert_eq!(c.process.timeout(), process::DEFAULT_TIMEOUT);
        assert_eq!(c.wifi.tool, WifiTool::Netsh);
    }

    #[test]
    fn layered_config_loads() {
        let c = Config::new().unwrap();
        assert!(c.wifi.locales.iter().any(|l| l.name == "nl"));
        assert!(c.scan.resolver_concurrency > 0);
    }
}
