//! Configuration management from the process environment
//!
//! Handles:
//! - Optional `.env` file loaded at startup
//! - Required notification endpoint and polling interval
//! - Monitored scripts with their arguments
//! - Interpreter and execution timeout for scripts

use crate::discovery;
use crate::execution::{ShellRunner, DEFAULT_INTERPRETER, DEFAULT_SCRIPT_TIMEOUT};
use crate::metrics::ScriptKind;
use crate::scheduler::ScriptTask;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info};

pub const ENV_NOTIFY_BASE_URL: &str = "TELEGNOTIFY_BASEURL";
pub const ENV_CHECK_INTERVAL: &str = "CHECK_INTERVAL";
pub const ENV_DEVICE_LABEL: &str = "DEVICE_LABEL";
pub const ENV_IDENTITY_SCRIPT: &str = "IDENTITY_SCRIPT";
pub const ENV_VITALS_SCRIPTS: &str = "VITALS_SCRIPTS";
pub const ENV_SCRIPT_INTERPRETER: &str = "SCRIPT_INTERPRETER";
pub const ENV_SCRIPT_TIMEOUT: &str = "SCRIPT_TIMEOUT";

const DEFAULT_IDENTITY_SCRIPT: &str = "./scripts/mac_id.sh";
const DEFAULT_VITALS_SCRIPT: &str = "./scripts/vital_stats.sh";

/// Invalid startup configuration
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable(s): {}", .0.join(", "))]
    Missing(Vec<String>),
    #[error("invalid {name}={value:?}: {reason}")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },
}

/// A monitored script as configured: executable plus its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptEntry {
    pub path: PathBuf,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub notify_base_url: String,
    pub check_interval: Duration,
    pub device_label: String,
    pub identity_script: PathBuf,
    pub vitals_scripts: Vec<ScriptEntry>,
    /// `None` runs scripts directly
    pub interpreter: Option<PathBuf>,
    pub script_timeout: Duration,
}

impl AgentConfig {
    /// Load `.env` if present, then read the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => debug!("No .env file, using process environment"),
            Err(e) => error!("Ignoring unreadable .env file: {}", e),
        }

        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from any variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // blank counts as unset
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let notify_base_url = get(ENV_NOTIFY_BASE_URL);
        let check_interval = get(ENV_CHECK_INTERVAL);

        let mut missing = Vec::new();
        for (name, value) in [
            (ENV_NOTIFY_BASE_URL, &notify_base_url),
            (ENV_CHECK_INTERVAL, &check_interval),
        ] {
            if value.is_none() {
                error!("{} is not set in the environment", name);
                missing.push(name.to_string());
            }
        }

        let (Some(notify_base_url), Some(check_interval)) = (notify_base_url, check_interval) else {
            return Err(ConfigError::Missing(missing));
        };

        let check_interval = parse_duration(ENV_CHECK_INTERVAL, &check_interval)?;
        let script_timeout = match get(ENV_SCRIPT_TIMEOUT) {
            Some(value) => parse_duration(ENV_SCRIPT_TIMEOUT, &value)?,
            None => DEFAULT_SCRIPT_TIMEOUT,
        };

        let vitals_scripts = parse_scripts(
            &get(ENV_VITALS_SCRIPTS).unwrap_or_else(|| DEFAULT_VITALS_SCRIPT.to_string()),
        )?;

        // set but empty means "no interpreter", so read the raw value here
        let interpreter = match lookup(ENV_SCRIPT_INTERPRETER) {
            Some(value) if value.trim().is_empty() => None,
            Some(value) => Some(PathBuf::from(value.trim())),
            None => Some(PathBuf::from(DEFAULT_INTERPRETER)),
        };

        info!("All environment variables in place");
        Ok(Self {
            notify_base_url: notify_base_url.trim().to_string(),
            check_interval,
            device_label: get(ENV_DEVICE_LABEL).unwrap_or_else(discovery::default_label),
            identity_script: get(ENV_IDENTITY_SCRIPT)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_IDENTITY_SCRIPT)),
            vitals_scripts,
            interpreter,
            script_timeout,
        })
    }

    /// One periodic task per configured vitals script
    pub fn script_tasks(&self) -> Vec<ScriptTask> {
        self.vitals_scripts
            .iter()
            .map(|entry| {
                ScriptTask::new(
                    entry.path.clone(),
                    entry.args.clone(),
                    ScriptKind::VitalStats,
                    self.check_interval,
                )
            })
            .collect()
    }

    /// Script runner matching the configured interpreter and timeout
    pub fn runner(&self) -> ShellRunner {
        ShellRunner::new(self.interpreter.clone(), self.script_timeout)
    }
}

/// Bare integers are seconds, anything else goes through humantime
fn parse_duration(name: &str, value: &str) -> Result<Duration, ConfigError> {
    let value = value.trim();
    let invalid = |reason: String| ConfigError::Invalid {
        name: name.to_string(),
        value: value.to_string(),
        reason,
    };

    let duration = match value.parse::<u64>() {
        Ok(secs) => Duration::from_secs(secs),
        Err(_) => humantime::parse_duration(value).map_err(|e| invalid(e.to_string()))?,
    };

    if duration.is_zero() {
        return Err(invalid("must be greater than zero".to_string()));
    }
    Ok(duration)
}

fn parse_scripts(value: &str) -> Result<Vec<ScriptEntry>, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        name: ENV_VITALS_SCRIPTS.to_string(),
        value: value.to_string(),
        reason,
    };

    let mut entries = Vec::new();
    for line in value.split(';').filter(|line| !line.trim().is_empty()) {
        let mut words = shell_words::split(line)
            .map_err(|e| invalid(e.to_string()))?
            .into_iter();

        let Some(path) = words.next() else {
            continue;
        };
        entries.push(ScriptEntry {
            path: PathBuf::from(path),
            args: words.collect(),
        });
    }

    if entries.is_empty() {
        return Err(invalid("no script configured".to_string()));
    }
    Ok(entries)
}
