//! Device identification for the vitals agent
//!
//! This module handles:
//! - Resolving the device identifier (primary MAC) once at startup through the
//!   identity-lookup script
//! - The human-readable device label attached to every record
//!
//! The resulting [`DeviceIdentity`] is immutable and shared by reference with
//! every component that labels or addresses notifications.

use crate::execution::{ExecutionError, ScriptRunner};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Failure to establish who this device is
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity script failed: {0}")]
    Script(#[from] ExecutionError),
    #[error("identity script {} printed no identifier", .0.display())]
    Empty(PathBuf),
}

/// Identity of the device, resolved once per process
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceIdentity {
    identifier: String,
    label: String,
}

impl DeviceIdentity {
    pub fn new(identifier: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            label: label.into(),
        }
    }

    /// Run the identity-lookup script and keep the first non-blank line it prints
    pub async fn resolve(
        runner: &dyn ScriptRunner,
        script: &Path,
        label: impl Into<String>,
    ) -> Result<Self, IdentityError> {
        info!("Resolving device identity via {}", script.display());

        let output = runner.run(script, &[]).await?;
        let identifier = output
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or_else(|| IdentityError::Empty(script.to_path_buf()))?;

        debug!("Device identifier read: {}", identifier);

        let identity = Self::new(identifier, label);
        info!(
            "Device identity resolved - ID: {}, Label: {}",
            identity.identifier, identity.label
        );
        Ok(identity)
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Label used when `DEVICE_LABEL` is not set
pub fn default_label() -> String {
    let hostname = hostname::get()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();

    if hostname.is_empty() {
        "vitals agent".to_string()
    } else {
        format!("{} vitals agent", hostname)
    }
}
