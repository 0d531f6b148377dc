//! Configuration system for the `taskdeck` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/taskdeck/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use taskdeck_proto::task::TaskId;

use crate::filter::fuzzy::{DEFAULT_DISTANCE, DEFAULT_THRESHOLD};
use crate::filter::{FilterConfig, FuzzyMatcher, SortBy, StatusFilter};

/// Base URL used when neither the CLI nor the config file names one.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5173";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// The API base URL is not a usable absolute URL.
    #[error("invalid API base URL `{url}`: {reason}")]
    InvalidUrl {
        /// The rejected value.
        url: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A config file setting is outside its allowed range.
    #[error("invalid value for `{key}`: {reason}")]
    InvalidValue {
        /// Dotted TOML key, e.g. `api.timeout_secs`.
        key: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    api: ApiFileConfig,
    sync: SyncFileConfig,
    search: SearchFileConfig,
    view: ViewFileConfig,
}

/// `[api]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ApiFileConfig {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

/// `[sync]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SyncFileConfig {
    event_buffer: Option<usize>,
}

/// `[search]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SearchFileConfig {
    threshold: Option<f64>,
    distance: Option<usize>,
}

/// `[view]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ViewFileConfig {
    status: Option<StatusFilter>,
    sort_by: Option<SortBy>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the task API; requests go to `<base>/api/tasks`.
    pub api_url: Url,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Use the seeded in-memory repository instead of the API.
    pub offline: bool,
    /// Buffer size for the `SyncEvent` channel.
    pub event_buffer: usize,
    /// Matcher settings for search.
    pub search: FuzzyMatcher,
    /// Filter applied by `list` before its own flags.
    pub default_filter: FilterConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: Url::parse(DEFAULT_API_URL).unwrap_or_else(|_| unreachable!()),
            request_timeout: Duration::from_secs(10),
            offline: false,
            event_buffer: 64,
            search: FuzzyMatcher::new(DEFAULT_THRESHOLD, DEFAULT_DISTANCE),
            default_filter: FilterConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an
    /// error. Otherwise the default path is tried and silently ignored if
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed,
    /// if the resolved API URL is invalid, or if a setting is out of range.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Self::resolve(cli, &file)
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let api_url = match cli.api_url.as_deref().or(file.api.base_url.as_deref()) {
            Some(raw) => parse_api_url(raw)?,
            None => defaults.api_url,
        };

        let request_timeout = match file.api.timeout_secs {
            Some(0) => return Err(invalid("api.timeout_secs", "must be at least 1 second")),
            Some(secs) => Duration::from_secs(secs),
            None => defaults.request_timeout,
        };
        let event_buffer = match file.sync.event_buffer {
            Some(0) => return Err(invalid("sync.event_buffer", "must be at least 1")),
            Some(n) => n,
            None => defaults.event_buffer,
        };
        let threshold = file.search.threshold.unwrap_or(defaults.search.threshold);
        if !(0.0..=1.0).contains(&threshold) {
            return Err(invalid(
                "search.threshold",
                format!("{threshold} is not within 0.0..=1.0"),
            ));
        }

        Ok(Self {
            api_url,
            request_timeout,
            offline: cli.offline,
            event_buffer,
            search: FuzzyMatcher::new(
                threshold,
                file.search.distance.unwrap_or(defaults.search.distance),
            ),
            default_filter: FilterConfig {
                status: file.view.status.unwrap_or(defaults.default_filter.status),
                search_query: String::new(),
                sort_by: file.view.sort_by.unwrap_or(defaults.default_filter.sort_by),
            },
        })
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Task list client")]
pub struct CliArgs {
    /// Path to config file (default: `~/.config/taskdeck/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Base URL of the task API.
    #[arg(long, env = "TASKDECK_API_URL")]
    pub api_url: Option<String>,

    /// Work against a seeded in-memory collection instead of the API.
    #[arg(long)]
    pub offline: bool,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "warn", env = "TASKDECK_LOG")]
    pub log_level: String,

    /// Write logs to this file instead of stderr.
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// What to do (default: `list`).
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Subcommands of the `taskdeck` binary.
#[derive(clap::Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the task list.
    List(ListArgs),
    /// Create a task.
    Add {
        /// Task title.
        title: String,
        /// Task description.
        description: String,
    },
    /// Mark a task completed.
    Done {
        /// Task id.
        id: TaskId,
    },
    /// Mark a task not completed.
    Reopen {
        /// Task id.
        id: TaskId,
    },
    /// Delete a task.
    Rm {
        /// Task id.
        id: TaskId,
    },
}

/// Flags of `taskdeck list`; unset flags fall back to the `[view]` config.
#[derive(clap::Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct ListArgs {
    /// Status filter (all, completed, active).
    #[arg(long)]
    pub status: Option<StatusFilter>,

    /// Fuzzy search over title and description.
    #[arg(long)]
    pub search: Option<String>,

    /// Sort key (none, name, status).
    #[arg(long)]
    pub sort: Option<SortBy>,
}

impl ListArgs {
    /// Overlays these flags on `base`.
    #[must_use]
    pub fn apply_to(&self, base: &FilterConfig) -> FilterConfig {
        FilterConfig {
            status: self.status.unwrap_or(base.status),
            search_query: self
                .search
                .clone()
                .unwrap_or_else(|| base.search_query.clone()),
            sort_by: self.sort.unwrap_or(base.sort_by),
        }
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        reason: reason.into(),
    }
}

/// Parses an API base URL; only `http` and `https` are accepted.
fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme `{other}`"))),
    }
}

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&Path>) -> Result<ConfigFile, ConfigError> {
    if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    }

    let Some(config_dir) = dirs::config_dir() else {
        return Ok(ConfigFile::default());
    };
    let path = config_dir.join("taskdeck").join("config.toml");

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
