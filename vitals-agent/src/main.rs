//! Vitals Agent - systemd service entry point
//!
//! Resolves the device identity, starts one task per vitals script and
//! forwards every record until Ctrl-C or SIGTERM.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vitals_agent::lifecycle::{self, Coordinator};
use vitals_agent::{AgentConfig, DeviceIdentity, HttpNotifier};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vitals_agent=info")),
        )
        .init();

    info!("🩺 Vitals Agent v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = AgentConfig::from_env().context("Invalid agent configuration")?;
    let runner = Arc::new(config.runner());

    let device = DeviceIdentity::resolve(runner.as_ref(), &config.identity_script, config.device_label.clone())
        .await
        .context("Failed to resolve device identity")?;

    let notifier = HttpNotifier::new(config.notify_base_url.clone())
        .context("Failed to create notification client")?;

    info!(
        "Reporting {} script(s) every {:?} to {}",
        config.vitals_scripts.len(),
        config.check_interval,
        notifier.endpoint(device.identifier())
    );

    let summary = Coordinator::new(Arc::new(device), runner, Arc::new(notifier), config.script_tasks())
        .run(lifecycle::interrupt_signal())
        .await;

    info!(
        "Now exiting the service ({} delivered, {} failed, {} dropped)",
        summary.dispatch.delivered, summary.dispatch.failed, summary.dispatch.dropped
    );

    if !summary.interrupted {
        warn!("Every script task ended on its own");
        anyhow::bail!("all {} script task(s) stopped", summary.tasks.len());
    }

    Ok(())
}
