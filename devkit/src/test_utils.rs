/*!
Test Harness pour l'agent vitals

Facilite l'écriture de tests d'intégration avec:
- Setup automatique du stub de notifications et des scripts
- Variables d'environnement pointant vers ces ressources
- Assertions sur les notifications reçues
*/

use crate::http_stub::{ReceivedNotification, StubEndpoint};
use crate::script_fixtures::ScriptFixtures;
use anyhow::Result;
use std::collections::HashMap;

/// Harness de test complet pour l'agent
pub struct TestHarness {
    pub endpoint: StubEndpoint,
    pub scripts: ScriptFixtures,
}

impl TestHarness {
    /// Démarre le stub et prépare le répertoire de scripts
    pub async fn start() -> Result<Self> {
        env_logger::try_init().ok(); // Init logging pour tests

        Ok(Self {
            endpoint: StubEndpoint::start().await?,
            scripts: ScriptFixtures::new()?,
        })
    }

    /// Variables d'environnement minimales de l'agent, pointant vers le stub
    pub fn env(&self, check_interval: &str) -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert("TELEGNOTIFY_BASEURL".to_string(), self.endpoint.base_url());
        env.insert("CHECK_INTERVAL".to_string(), check_interval.to_string());
        env.insert("SCRIPT_INTERPRETER".to_string(), "sh".to_string());
        env
    }

    /// Attend `count` notifications, échoue si elles n'arrivent pas à temps
    pub async fn expect_notifications(&self, count: usize, timeout_ms: u64) -> Result<Vec<ReceivedNotification>> {
        let received = self.endpoint.wait_for(count, timeout_ms).await;
        if received.len() < count {
            anyhow::bail!("expected {} notifications, got {}", count, received.len());
        }
        log::info!("✅ Received {} notifications", received.len());
        Ok(received)
    }

    /// Assert que toutes les notifications visent le device donné
    pub fn assert_all_for_device(&self, device: &str) -> Result<()> {
        for notification in self.endpoint.received() {
            if notification.device != device {
                anyhow::bail!("notification addressed to '{}', expected '{}'", notification.device, device);
            }
            if notification.body["deviceIdentifier"] != device {
                anyhow::bail!("body deviceIdentifier mismatch: {}", notification.body["deviceIdentifier"]);
            }
        }
        Ok(())
    }
}
