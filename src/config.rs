//! Configuration management for ewz
//!
//! Supports:
//! - TOML config file at XDG locations
//! - Environment variable overrides
//! - Command-line argument overrides

use std::env;
use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use config::{Config, Environment, File, FileFormat};
use env_logger::fmt::WriteStyle;
use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::api::CloudSettings;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::zeroconf::{ProbeSettings, SystemArp};

const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// Runtime context containing resolved configuration
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    pub global: GlobalOpts,
    pub config: AppConfig,
    config_path: PathBuf,
}

impl RuntimeContext {
    pub fn new(global: &GlobalOpts) -> Result<Self> {
        let config_path = resolve_config_path(global.config.as_ref())?;
        let config = load_config(&config_path, global)?;

        Ok(Self {
            global: global.clone(),
            config,
            config_path,
        })
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn init_logging(&self) -> Result<()> {
        if self.global.quiet {
            log::set_max_level(LevelFilter::Off);
            return Ok(());
        }

        let mut builder = env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(&self.config.logging.level),
        );

        builder.filter_level(self.effective_log_level());

        let force_color = env::var_os("FORCE_COLOR").is_some();
        let disable_color = self.global.no_color
            || env::var_os("NO_COLOR").is_some()
            || (!force_color && !std::io::stderr().is_terminal());

        if disable_color {
            builder.write_style(WriteStyle::Never);
        } else if force_color {
            builder.write_style(WriteStyle::Always);
        } else {
            builder.write_style(WriteStyle::Auto);
        }

        builder.try_init().or_else(|err| {
            if self.global.verbose > 0 {
                eprintln!("logger already initialized: {err}");
            }
            Ok(())
        })
    }

    fn effective_log_level(&self) -> LevelFilter {
        if self.global.trace {
            LevelFilter::Trace
        } else if self.global.debug {
            LevelFilter::Debug
        } else {
            match self.global.verbose {
                0 => self
                    .config
                    .logging
                    .level
                    .parse()
                    .unwrap_or(LevelFilter::Warn),
                1 => LevelFilter::Info,
                2 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }

    /// Resolve the cloud settings, failing when credentials are missing
    pub fn cloud_settings(&self) -> Result<CloudSettings> {
        let ewelink = &self.config.ewelink;
        let email = self
            .global
            .email
            .clone()
            .or_else(|| ewelink.email.clone())
            .ok_or_else(|| {
                anyhow!(
                    "No eWeLink account configured.\n\
                    Set via --email, EWELINK_EMAIL env var, or in config file."
                )
            })?;
        let password = self
            .global
            .password
            .clone()
            .or_else(|| ewelink.password.clone())
            .ok_or_else(|| {
                anyhow!(
                    "No eWeLink password configured.\n\
                    Set via --password, EWELINK_PASSWORD env var, or in config file."
                )
            })?;
        let (app_id, app_secret) = match (&ewelink.app_id, &ewelink.app_secret) {
            (Some(id), Some(secret)) => (id.clone(), secret.clone()),
            _ => {
                return Err(anyhow!(
                    "No eWeLink app credentials configured.\n\
                    Set ewelink.app_id and ewelink.app_secret in {}",
                    self.config_path.display()
                ))
            }
        };

        Ok(CloudSettings {
            region: self.region().to_string(),
            email,
            password,
            app_id,
            app_secret,
            api_url: ewelink.api_url.clone(),
            timeout: self.timeout(),
        })
    }

    /// Get the effective cloud region
    pub fn region(&self) -> &str {
        self.global
            .region
            .as_deref()
            .unwrap_or(&self.config.ewelink.region)
    }

    /// Get the effective timeout in seconds
    pub fn timeout(&self) -> u64 {
        self.global.timeout.unwrap_or(self.config.ewelink.timeout)
    }

    /// Device cache path, from the argument or the configured default
    pub fn devices_cache(&self, path: Option<&Path>) -> Result<PathBuf> {
        match path {
            Some(path) => Ok(path.to_path_buf()),
            None => expand_path(Path::new(&self.config.zeroconf.devices_cache)),
        }
    }

    /// ARP table path, from the argument or the configured default
    pub fn arp_table(&self, path: Option<&Path>) -> Result<PathBuf> {
        match path {
            Some(path) => Ok(path.to_path_buf()),
            None => expand_path(Path::new(&self.config.zeroconf.arp_table)),
        }
    }

    /// The system neighbour table reader
    pub fn arp_source(&self) -> Result<SystemArp> {
        let zeroconf = &self.config.zeroconf;
        Ok(SystemArp::new(
            expand_path(Path::new(&zeroconf.arp_source))?,
            zeroconf.arp_command.clone(),
        ))
    }

    /// Probe settings when probing is enabled by flag or config
    pub fn probe(&self, flag: bool) -> Option<ProbeSettings> {
        let zeroconf = &self.config.zeroconf;
        (flag || zeroconf.probe).then(|| ProbeSettings {
            max_hosts: zeroconf.probe_max_hosts,
            settle: Duration::from_millis(zeroconf.probe_settle_ms),
        })
    }

    /// Get the effective output format
    pub fn output_format(&self) -> OutputFormat {
        if self.global.json {
            return OutputFormat::Json;
        }
        self.global
            .output_format
            .unwrap_or(match self.config.output.format.as_str() {
                "json" => OutputFormat::Json,
                "yaml" => OutputFormat::Yaml,
                "table" => OutputFormat::Table,
                _ => OutputFormat::Auto,
            })
    }
}

/// Application configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ewelink: EwelinkConfig,
    pub zeroconf: ZeroconfConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EwelinkConfig {
    pub region: String,
    pub email: Option<String>,
    pub password: Option<String>,
    pub app_id: Option<String>,
    pub app_secret: Option<String>,
    pub api_url: Option<String>,
    pub timeout: u64,
}

impl Default for EwelinkConfig {
    fn default() -> Self {
        Self {
            region: "us".to_string(),
            email: None,
            password: None,
            app_id: None,
            app_secret: None,
            api_url: None,
            timeout: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZeroconfConfig {
    pub devices_cache: String,
    pub arp_table: String,
    pub arp_source: String,
    pub arp_command: String,
    pub probe: bool,
    pub probe_settle_ms: u64,
    pub probe_max_hosts: usize,
}

impl Default for ZeroconfConfig {
    fn default() -> Self {
        Self {
            devices_cache: "./devices-cache.json".to_string(),
            arp_table: "./arp-table.json".to_string(),
            arp_source: "/proc/net/arp".to_string(),
            arp_command: "arp".to_string(),
            probe: false,
            probe_settle_ms: 500,
            probe_max_hosts: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: String,
    pub no_headers: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "auto".to_string(),
            no_headers: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

fn resolve_config_path(override_path: Option<&PathBuf>) -> Result<PathBuf> {
    if let Some(path) = override_path {
        let expanded = expand_path(path)?;
        if expanded.is_dir() {
            return Ok(expanded.join("config.toml"));
        }
        return Ok(expanded);
    }

    Ok(default_config_dir()?.join("config.toml"))
}

fn load_config(config_path: &Path, global: &GlobalOpts) -> Result<AppConfig> {
    // Create default config if it doesn't exist
    if !config_path.exists() {
        write_default_config(config_path)?;
    }

    let config = Config::builder()
        .set_default("ewelink.region", "us")?
        .set_default("ewelink.timeout", 30_i64)?
        .set_default("zeroconf.devices_cache", "./devices-cache.json")?
        .set_default("zeroconf.arp_table", "./arp-table.json")?
        .set_default("zeroconf.arp_source", "/proc/net/arp")?
        .set_default("zeroconf.arp_command", "arp")?
        .set_default("zeroconf.probe", false)?
        .set_default("zeroconf.probe_settle_ms", 500_i64)?
        .set_default("zeroconf.probe_max_hosts", 1024_i64)?
        .set_default("output.format", "auto")?
        .set_default("output.no_headers", false)?
        .set_default("logging.level", "warn")?
        // Load from file
        .add_source(
            File::from(config_path)
                .format(FileFormat::Toml)
                .required(false),
        )
        // EWZ__SECTION__KEY overrides any value
        .add_source(
            Environment::with_prefix("EWZ")
                .try_parsing(true)
                .separator("__"),
        )
        .build()?;

    let mut app_config: AppConfig = config.try_deserialize()?;

    // Apply CLI overrides
    if global.no_headers {
        app_config.output.no_headers = true;
    }

    Ok(app_config)
}

pub fn write_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {}", parent.display()))?;
    }

    let config = AppConfig::default();
    let toml = toml::to_string_pretty(&config).context("serializing default config")?;

    let content = format!(
        "# ewz configuration\n\
        # File: {}\n\
        #\n\
        # Environment variables:\n\
        #   EWELINK_EMAIL    - eWeLink account email\n\
        #   EWELINK_PASSWORD - eWeLink account password\n\
        #   EWELINK_REGION   - Cloud region (us, eu, as, cn)\n\
        #   EWZ__*           - Override any config value (e.g., EWZ__LOGGING__LEVEL=debug)\n\
        \n\
        {toml}",
        path.display()
    );

    fs::write(path, content).with_context(|| format!("writing config to {}", path.display()))
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    if let Some(text) = path.to_str() {
        let expanded = shellexpand::full(text).context("expanding path")?;
        Ok(PathBuf::from(expanded.to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}

fn default_config_dir() -> Result<PathBuf> {
    // Check XDG_CONFIG_HOME first
    if let Some(dir) = env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir).join(APP_NAME));
    }

    // Use platform-specific config directory
    if let Some(mut dir) = dirs::config_dir() {
        dir.push(APP_NAME);
        return Ok(dir);
    }

    // Fallback to ~/.config
    dirs::home_dir()
        .map(|home| home.join(".config").join(APP_NAME))
        .ok_or_else(|| anyhow!("unable to determine configuration directory"))
}
