//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    num::NonZeroUsize,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::render::{DaemonHosts, RenderEngineConfig};
use crate::domain::settings::{SettingsValue, default_latexml_settings};

pub use cli::{CliArgs, Command, Overrides, PostDataArgs, RenderArgs, ValidateArgs};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "latexml-render";
const ENV_PREFIX: &str = "LATEXML_RENDER";
pub(crate) const DEFAULT_DAEMON_URL: &str = "http://latexml.mathweb.org/convert";
const DEFAULT_DAEMON_TIMEOUT_SECS: u64 = 240;
const DEFAULT_MEMORY_CACHE_CAPACITY: u64 = 1024;
const DEFAULT_SCRIPT_PATH: &str = "/w";

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub daemon: DaemonSettings,
    pub cache: CacheSettings,
    pub embed: EmbedSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DaemonSettings {
    pub hosts: DaemonHosts,
    pub timeout: Duration,
    pub default_settings: SettingsValue,
}

impl From<&DaemonSettings> for RenderEngineConfig {
    fn from(daemon: &DaemonSettings) -> Self {
        Self {
            hosts: daemon.hosts.clone(),
            timeout: daemon.timeout,
            default_settings: daemon.default_settings.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// File-backed cache directory; in-memory only when unset.
    pub directory: Option<PathBuf>,
    pub memory_capacity: NonZeroUsize,
}

#[derive(Debug, Clone)]
pub struct EmbedSettings {
    pub script_path: String,
    pub existing_pages: Vec<String>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    daemon: RawDaemonSettings,
    cache: RawCacheSettings,
    embed: RawEmbedSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &Overrides) {
        match overrides.daemon_urls.as_slice() {
            [] => {}
            [single] => self.daemon.url = Some(DaemonHosts::Single(single.clone())),
            many => self.daemon.url = Some(DaemonHosts::Pool(many.to_vec())),
        }
        if let Some(seconds) = overrides.daemon_timeout_seconds {
            self.daemon.timeout_seconds = Some(seconds);
        }
        if let Some(dir) = overrides.cache_dir.as_ref() {
            self.cache.directory = Some(dir.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            daemon,
            cache,
            embed,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            daemon: build_daemon_settings(daemon)?,
            cache: build_cache_settings(cache)?,
            embed: build_embed_settings(embed),
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_daemon_settings(daemon: RawDaemonSettings) -> Result<DaemonSettings, LoadError> {
    let hosts = daemon
        .url
        .unwrap_or_else(|| DaemonHosts::Single(DEFAULT_DAEMON_URL.to_string()));
    if hosts.is_empty() {
        return Err(LoadError::invalid(
            "daemon.url",
            "at least one daemon URL is required",
        ));
    }
    for host in hosts.iter() {
        if host.trim().is_empty() {
            return Err(LoadError::invalid("daemon.url", "URL must not be empty"));
        }
        url::Url::parse(host)
            .map_err(|err| LoadError::invalid("daemon.url", format!("invalid URL `{host}`: {err}")))?;
    }

    let timeout_seconds = daemon.timeout_seconds.unwrap_or(DEFAULT_DAEMON_TIMEOUT_SECS);
    if timeout_seconds == 0 {
        return Err(LoadError::invalid(
            "daemon.timeout_seconds",
            "must be greater than zero",
        ));
    }

    let default_settings = daemon
        .settings
        .filter(|settings| !settings.is_empty())
        .unwrap_or_else(default_latexml_settings);

    Ok(DaemonSettings {
        hosts,
        timeout: Duration::from_secs(timeout_seconds),
        default_settings,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let directory = cache
        .directory
        .filter(|dir| !dir.as_os_str().is_empty());

    let capacity = cache
        .memory_capacity
        .unwrap_or(DEFAULT_MEMORY_CACHE_CAPACITY);
    let capacity = usize::try_from(capacity).map_err(|_| {
        LoadError::invalid(
            "cache.memory_capacity",
            "value exceeds supported range for usize",
        )
    })?;
    let memory_capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
        LoadError::invalid("cache.memory_capacity", "must be greater than zero")
    })?;

    Ok(CacheSettings {
        directory,
        memory_capacity,
    })
}

fn build_embed_settings(embed: RawEmbedSettings) -> EmbedSettings {
    EmbedSettings {
        script_path: embed
            .script_path
            .unwrap_or_else(|| DEFAULT_SCRIPT_PATH.to_string()),
        existing_pages: embed.existing_pages.unwrap_or_default(),
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDaemonSettings {
    url: Option<DaemonHosts>,
    timeout_seconds: Option<u64>,
    settings: Option<SettingsValue>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    directory: Option<PathBuf>,
    memory_capacity: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawEmbedSettings {
    script_path: Option<String>,
    existing_pages: Option<Vec<String>>,
}
