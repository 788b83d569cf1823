//! Configuration management for dockhand
//!
//! Settings come from environment variables with defaults:
//!
//! - `DOCKHAND_HOME`: state directory (`projects.json`, `project-logs/`) - default: `~/.dockhand`
//! - `DOCKHAND_BUILD_TIMEOUT`: image build limit in seconds - default: "300"
//! - `DOCKHAND_STOP_TIMEOUT`: grace period before a container is killed - default: "10"
//! - `DOCKHAND_COMPOSE_COMMAND`: compose tool, e.g. "docker compose" - default: "docker-compose"
//! - `DOCKHAND_DEFAULT_MEMORY_MB`: memory limit for new projects - default: "512"
//! - `DOCKHAND_DEFAULT_CPUS`: CPU limit for new projects - default: "1.0"
//! - `DOCKHAND_LOG_LEVEL`: logging level - default: "info"
//!
//! # Example
//!
//! ```no_run
//! use dockhand::DockhandConfig;
//!
//! let config = DockhandConfig::default();
//! config.validate().expect("Invalid configuration");
//! println!("{}", config);
//! ```

use crate::engine::compose::DEFAULT_COMPOSE_COMMAND;
use crate::project::ResourceOptions;
use crate::store::PROJECTS_FILE;
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_HOME_DIR: &str = ".dockhand";
const LOGS_DIR: &str = "project-logs";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_BUILD_TIMEOUT_SECS: u64 = 300;
const DEFAULT_STOP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MEMORY_MB: u64 = 512;
const DEFAULT_CPUS: f64 = 1.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

#[derive(Debug, Clone)]
pub struct DockhandConfig {
    /// Root for persisted projects and run logs
    pub home: PathBuf,

    pub build_timeout_secs: u64,

    pub stop_timeout_secs: u64,

    /// Program and leading arguments of the compose tool
    pub compose_command: String,

    pub default_memory_mb: u64,

    pub default_cpus: f64,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

impl Default for DockhandConfig {
    /// Loads from `DOCKHAND_*` environment variables, falling back to defaults
    fn default() -> Self {
        let home = env::var("DOCKHAND_HOME")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(env::temp_dir)
                    .join(DEFAULT_HOME_DIR)
            });

        let compose_command = env::var("DOCKHAND_COMPOSE_COMMAND")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_COMPOSE_COMMAND.to_string());

        let log_level = env::var("DOCKHAND_LOG_LEVEL")
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
            .to_lowercase();

        Self {
            home,
            build_timeout_secs: env_parsed("DOCKHAND_BUILD_TIMEOUT", DEFAULT_BUILD_TIMEOUT_SECS),
            stop_timeout_secs: env_parsed("DOCKHAND_STOP_TIMEOUT", DEFAULT_STOP_TIMEOUT_SECS),
            compose_command,
            default_memory_mb: env_parsed("DOCKHAND_DEFAULT_MEMORY_MB", DEFAULT_MEMORY_MB),
            default_cpus: env_parsed("DOCKHAND_DEFAULT_CPUS", DEFAULT_CPUS),
            log_level,
        }
    }
}

impl DockhandConfig {
    /// Checks that numeric values are in range and the log level is known
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.build_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Build timeout must be at least 1 second".to_string(),
            ));
        }
        if self.build_timeout_secs > 3600 {
            return Err(ConfigError::ValidationFailed(
                "Build timeout cannot exceed 1 hour".to_string(),
            ));
        }
        if self.stop_timeout_secs > 300 {
            return Err(ConfigError::ValidationFailed(
                "Stop timeout cannot exceed 5 minutes".to_string(),
            ));
        }
        if self.default_memory_mb < 6 {
            // The engine refuses limits below 6MB
            return Err(ConfigError::ValidationFailed(
                "Default memory limit must be at least 6MB".to_string(),
            ));
        }
        if !(self.default_cpus > 0.0 && self.default_cpus.is_finite()) {
            return Err(ConfigError::ValidationFailed(format!(
                "Default CPU limit must be positive, got {}",
                self.default_cpus
            )));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }

    pub fn projects_file(&self) -> PathBuf {
        self.home.join(PROJECTS_FILE)
    }

    pub fn logs_root(&self) -> PathBuf {
        self.home.join(LOGS_DIR)
    }

    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    /// Resource limits applied to newly registered projects
    pub fn default_resources(&self) -> ResourceOptions {
        ResourceOptions {
            memory_mb: self.default_memory_mb,
            cpus: self.default_cpus,
            ..Default::default()
        }
    }

    pub fn to_display_map(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("home".to_string(), self.home.display().to_string()),
            (
                "build_timeout_secs".to_string(),
                self.build_timeout_secs.to_string(),
            ),
            (
                "stop_timeout_secs".to_string(),
                self.stop_timeout_secs.to_string(),
            ),
            ("compose_command".to_string(), self.compose_command.clone()),
            (
                "default_memory_mb".to_string(),
                self.default_memory_mb.to_string(),
            ),
            ("default_cpus".to_string(), self.default_cpus.to_string()),
            ("log_level".to_string(), self.log_level.clone()),
        ])
    }
}

impl fmt::Display for DockhandConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dockhand Configuration:")?;
        writeln!(f, "  Home: {}", self.home.display())?;
        writeln!(f, "  Build Timeout: {}s", self.build_timeout_secs)?;
        writeln!(f, "  Stop Timeout: {}s", self.stop_timeout_secs)?;
        writeln!(f, "  Compose Command: {}", self.compose_command)?;
        writeln!(f, "  Default Memory: {} MB", self.default_memory_mb)?;
        writeln!(f, "  Default CPUs: {}", self.default_cpus)?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        Ok(())
    }
}
