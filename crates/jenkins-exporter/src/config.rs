//! Exporter configuration.
//!
//! Settings come from command-line flags (credentials may also come from
//! the environment) and an optional TOML file. A flag always wins over the
//! file; anything unset falls back to a built-in default. The resolved
//! [`ExporterConfig`] is validated before anything is started.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::http::Uri;
use clap::{Parser, ValueEnum};
use jenkins_client::ClientConfig;
use jenkins_metrics::{DEFAULT_BUILDS_PER_JOB, StoreConfig};
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 9103;
pub const DEFAULT_TELEMETRY_PATH: &str = "/metrics";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const STORE_CAPACITY_HINT: usize = 1024;

/// Paths served by the router itself; the telemetry path may not shadow them.
const RESERVED_PATHS: [&str; 2] = ["/", "/healthz"];

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid jenkins url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "jenkins-exporter",
    version,
    about = "Prometheus exporter for Jenkins build history"
)]
pub struct Cli {
    /// TOML config file. Flags override values from the file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Address on which to expose metrics [default: 0.0.0.0:9103].
    #[arg(long)]
    pub listen_address: Option<SocketAddr>,

    /// Path under which to expose metrics [default: /metrics].
    #[arg(long)]
    pub telemetry_path: Option<String>,

    /// Base URL of the Jenkins controller.
    #[arg(long, env = "JENKINS_URL")]
    pub jenkins_url: Option<String>,

    /// Jenkins user name.
    #[arg(long, env = "JENKINS_USER")]
    pub jenkins_user: Option<String>,

    /// Jenkins API token.
    #[arg(long, env = "JENKINS_TOKEN", hide_env_values = true)]
    pub jenkins_token: Option<String>,

    /// Seconds between Jenkins polls [default: 30].
    #[arg(long)]
    pub poll_interval: Option<u64>,

    /// Seconds a whole poll may take [default: 2/3 of the poll interval].
    #[arg(long)]
    pub fetch_timeout: Option<u64>,

    /// Seconds a single Jenkins request may take [default: 10, at most the fetch timeout].
    #[arg(long)]
    pub request_timeout: Option<u64>,

    /// Seconds a sample is kept [default: the poll interval].
    #[arg(long)]
    pub ttl: Option<u64>,

    /// Recent builds read per job [default: 5].
    #[arg(long)]
    pub builds_per_job: Option<usize>,

    /// Hard cap on stored samples; oldest are dropped first.
    #[arg(long)]
    pub max_entries: Option<usize>,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Contents of the optional TOML config file.
#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub listen_address: Option<SocketAddr>,
    pub telemetry_path: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub fetch_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub ttl_secs: Option<u64>,
    pub builds_per_job: Option<usize>,
    pub max_entries: Option<usize>,
    pub jenkins: Option<JenkinsFileConfig>,
}

#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JenkinsFileConfig {
    pub url: Option<String>,
    pub user: Option<String>,
    pub token: Option<String>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Upstream connection settings.
#[derive(Clone)]
pub struct JenkinsSettings {
    pub url: String,
    pub user: String,
    pub token: String,
}

impl fmt::Debug for JenkinsSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JenkinsSettings")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Fully resolved and validated configuration.
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    pub listen_address: SocketAddr,
    pub telemetry_path: String,
    pub jenkins: JenkinsSettings,
    pub poll_interval: Duration,
    pub fetch_timeout: Duration,
    pub request_timeout: Duration,
    pub ttl: Duration,
    pub builds_per_job: usize,
    pub max_entries: Option<usize>,
}

impl ExporterConfig {
    /// Load the file named by `--config` (if any), merge flags over it and
    /// validate the result.
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => FileConfig::from_file(path)?,
            None => FileConfig::default(),
        };
        Self::merge(cli, file)
    }

    /// Merge flags over file values, apply defaults and validate.
    pub fn merge(cli: &Cli, file: FileConfig) -> Result<Self, ConfigError> {
        let jenkins = file.jenkins.unwrap_or_default();
        let non_empty = |s: &String| !s.trim().is_empty();

        let url = cli
            .jenkins_url
            .clone()
            .or(jenkins.url)
            .filter(non_empty)
            .ok_or(ConfigError::Missing("jenkins url"))?;
        let user = cli
            .jenkins_user
            .clone()
            .or(jenkins.user)
            .filter(non_empty)
            .ok_or(ConfigError::Missing("jenkins user"))?;
        let token = cli
            .jenkins_token
            .clone()
            .or(jenkins.token)
            .filter(non_empty)
            .ok_or(ConfigError::Missing("jenkins token"))?;

        let poll_interval = Duration::from_secs(
            cli.poll_interval
                .or(file.poll_interval_secs)
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
        );
        let fetch_timeout = cli
            .fetch_timeout
            .or(file.fetch_timeout_secs)
            .map(Duration::from_secs)
            .unwrap_or(poll_interval * 2 / 3);
        let request_timeout = cli
            .request_timeout
            .or(file.request_timeout_secs)
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS).min(fetch_timeout));
        let ttl = cli
            .ttl
            .or(file.ttl_secs)
            .map(Duration::from_secs)
            .unwrap_or(poll_interval);

        let config = Self {
            listen_address: cli
                .listen_address
                .or(file.listen_address)
                .unwrap_or(SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT))),
            telemetry_path: cli
                .telemetry_path
                .clone()
                .or(file.telemetry_path)
                .unwrap_or_else(|| DEFAULT_TELEMETRY_PATH.to_string()),
            jenkins: JenkinsSettings { url, user, token },
            poll_interval,
            fetch_timeout,
            request_timeout,
            ttl,
            builds_per_job: cli
                .builds_per_job
                .or(file.builds_per_job)
                .unwrap_or(DEFAULT_BUILDS_PER_JOB),
            max_entries: cli.max_entries.or(file.max_entries),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_jenkins_url(&self.jenkins.url)?;

        if self.jenkins.user.trim().is_empty() {
            return Err(ConfigError::Missing("jenkins user"));
        }
        if self.jenkins.token.trim().is_empty() {
            return Err(ConfigError::Missing("jenkins token"));
        }

        if !self.telemetry_path.starts_with('/') {
            return Err(invalid("telemetry path", "must start with '/'"));
        }
        if RESERVED_PATHS.contains(&self.telemetry_path.as_str()) {
            return Err(invalid(
                "telemetry path",
                format!("{} is reserved", self.telemetry_path),
            ));
        }

        if self.poll_interval.is_zero() {
            return Err(invalid("poll interval", "must be at least one second"));
        }
        if self.fetch_timeout.is_zero() || self.fetch_timeout >= self.poll_interval {
            return Err(invalid(
                "fetch timeout",
                format!(
                    "must be non-zero and shorter than the poll interval ({}s)",
                    self.poll_interval.as_secs()
                ),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(invalid("request timeout", "must be at least one second"));
        }
        if self.ttl.is_zero() {
            return Err(invalid("ttl", "must be at least one second"));
        }
        if self.builds_per_job == 0 {
            return Err(invalid("builds per job", "must be at least 1"));
        }
        if self.max_entries == Some(0) {
            return Err(invalid("max entries", "must be at least 1 when set"));
        }
        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            url: self.jenkins.url.clone(),
            user: self.jenkins.user.clone(),
            token: self.jenkins.token.clone(),
            request_timeout: self.request_timeout,
        }
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            ttl: self.ttl,
            capacity_hint: STORE_CAPACITY_HINT,
            max_entries: self.max_entries,
        }
    }
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        name,
        reason: reason.into(),
    }
}

fn validate_jenkins_url(url: &str) -> Result<(), ConfigError> {
    let invalid_url = |reason: String| ConfigError::InvalidUrl {
        url: url.to_string(),
        reason,
    };

    let uri: Uri = url.parse().map_err(|e: axum::http::uri::InvalidUri| invalid_url(e.to_string()))?;
    match uri.scheme_str() {
        Some("http" | "https") => {}
        Some(other) => {
            return Err(invalid_url(format!(
                "unsupported scheme {other}, expected http or https"
            )));
        }
        None => return Err(invalid_url("missing scheme".to_string())),
    }
    if uri.host().is_none() {
        return Err(invalid_url("missing host".to_string()));
    }
    Ok(())
}
