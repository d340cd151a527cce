//! Relay configuration parsing, validation, and environment overrides.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::{AppError, Result};

/// Worker subprocess launch and supervision settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct WorkerConfig {
    /// Executable used to launch the worker (e.g., `npx`).
    #[serde(default = "default_worker_command")]
    pub command: String,
    /// Arguments passed to the worker command.
    #[serde(default = "default_worker_args")]
    pub args: Vec<String>,
    /// Browser selection forwarded as `--browser <name>` when set.
    #[serde(default)]
    pub browser: Option<String>,
    /// Run the browser headless (`--headless`).
    #[serde(default)]
    pub headless: bool,
    /// Seconds between health-check ticks.
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval_seconds: u64,
    /// Timeout for a single health probe call, in seconds.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_seconds: u64,
    /// Maximum restart attempts within the restart window.
    #[serde(default = "default_max_restart_attempts")]
    pub max_restart_attempts: usize,
    /// Sliding window over which restart attempts are counted, in seconds.
    #[serde(default = "default_restart_window")]
    pub restart_window_seconds: u64,
    /// Grace period for SIGTERM before SIGKILL, in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            command: default_worker_command(),
            args: default_worker_args(),
            browser: None,
            headless: false,
            health_check_interval_seconds: default_health_check_interval(),
            probe_timeout_seconds: default_probe_timeout(),
            max_restart_attempts: default_max_restart_attempts(),
            restart_window_seconds: default_restart_window(),
            shutdown_timeout_seconds: default_shutdown_timeout(),
        }
    }
}

impl WorkerConfig {
    /// Health-check tick interval as a [`Duration`].
    #[must_use]
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_seconds)
    }

    /// Health probe timeout as a [`Duration`].
    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_seconds)
    }

    /// Restart window as a [`Duration`].
    #[must_use]
    pub fn restart_window(&self) -> Duration {
        Duration::from_secs(self.restart_window_seconds)
    }

    /// Graceful-shutdown grace period as a [`Duration`].
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }
}

fn default_worker_command() -> String {
    "npx".into()
}

fn default_worker_args() -> Vec<String> {
    vec!["@playwright/mcp@latest".into()]
}

fn default_health_check_interval() -> u64 {
    30
}

fn default_probe_timeout() -> u64 {
    5
}

fn default_max_restart_attempts() -> usize {
    3
}

fn default_restart_window() -> u64 {
    300
}

fn default_shutdown_timeout() -> u64 {
    5
}

fn default_server_host() -> String {
    "127.0.0.1".into()
}

fn default_server_port() -> u16 {
    34501
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./relay.db")
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// HTTP listen host.
    #[serde(default = "default_server_host")]
    pub server_host: String,
    /// HTTP listen port.
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    /// Path to the `SQLite` database file.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// Worker subprocess settings.
    #[serde(default)]
    pub worker: WorkerConfig,
}

impl Config {
    /// Parse configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` on parse or validation failure.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(text)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration entirely from defaults and `RELAY_*` overrides.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if an override fails validation.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::baseline();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Defaults for every field.
    fn baseline() -> Self {
        Self {
            server_host: default_server_host(),
            server_port: default_server_port(),
            database_path: default_database_path(),
            worker: WorkerConfig::default(),
        }
    }

    /// Apply `RELAY_*` environment variable overrides for scalar fields.
    ///
    /// `worker.args` is deliberately TOML-only; splitting an argument vector
    /// out of a single env var invites quoting bugs.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("RELAY_SERVER_HOST") {
            self.server_host = v;
        }
        if let Ok(v) = env::var("RELAY_SERVER_PORT") {
            match v.parse() {
                Ok(port) => self.server_port = port,
                Err(_) => warn!(value = %v, "ignoring invalid RELAY_SERVER_PORT"),
            }
        }
        if let Ok(v) = env::var("RELAY_DATABASE_PATH") {
            self.database_path = PathBuf::from(v);
        }
        if let Ok(v) = env::var("RELAY_WORKER_COMMAND") {
            self.worker.command = v;
        }
        if let Ok(v) = env::var("RELAY_BROWSER") {
            self.worker.browser = Some(v);
        }
        if let Ok(v) = env::var("RELAY_HEADLESS") {
            self.worker.headless = matches!(v.as_str(), "1" | "true" | "yes");
        }
        if let Ok(v) = env::var("RELAY_HEALTH_CHECK_INTERVAL") {
            match v.parse() {
                Ok(secs) => self.worker.health_check_interval_seconds = secs,
                Err(_) => warn!(value = %v, "ignoring invalid RELAY_HEALTH_CHECK_INTERVAL"),
            }
        }
    }

    /// Validate field-level invariants.
    fn validate(&self) -> Result<()> {
        if self.worker.command.trim().is_empty() {
            return Err(AppError::Config("worker.command must not be empty".into()));
        }
        if self.worker.max_restart_attempts == 0 {
            return Err(AppError::Config(
                "worker.max_restart_attempts must be at least 1".into(),
            ));
        }
        if self.worker.health_check_interval_seconds == 0 {
            return Err(AppError::Config(
                "worker.health_check_interval_seconds must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
