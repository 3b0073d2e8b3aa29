/*!
Endpoint HTTP stub pour développer sans l'API de notifications

Démarre un serveur Axum sur un port éphémère qui accepte
`POST /{device}/notifications` et enregistre chaque requête reçue.
Le statut de réponse est configurable pour simuler les pannes serveur.
*/

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Notification reçue par le stub
#[derive(Debug, Clone)]
pub struct ReceivedNotification {
    /// Segment `{device}` de l'URL
    pub device: String,
    pub query: HashMap<String, String>,
    pub content_type: Option<String>,
    /// Body JSON (`Value::Null` si illisible)
    pub body: Value,
}

impl ReceivedNotification {
    /// Valeurs des métriques dans l'ordre du body
    pub fn metric_values(&self) -> Vec<String> {
        self.body["metrics"]
            .as_array()
            .map(|metrics| {
                metrics
                    .iter()
                    .filter_map(|m| m["value"].as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Clone)]
struct StubState {
    received: Arc<Mutex<Vec<ReceivedNotification>>>,
    status: Arc<AtomicU16>,
}

/// Serveur de notifications en mémoire
pub struct StubEndpoint {
    addr: SocketAddr,
    state: StubState,
    server: JoinHandle<()>,
}

impl StubEndpoint {
    /// Démarre le stub (répond 200 par défaut)
    pub async fn start() -> Result<Self> {
        let state = StubState {
            received: Arc::new(Mutex::new(Vec::new())),
            status: Arc::new(AtomicU16::new(200)),
        };

        let app = Router::new()
            .route("/{device}/notifications", post(receive_notification))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                log::error!("[stub] server stopped: {}", e);
            }
        });

        log::info!("[stub] notifications endpoint on http://{}", addr);
        Ok(Self { addr, state, server })
    }

    /// URL de base à passer dans TELEGNOTIFY_BASEURL
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Change le statut renvoyé aux prochaines requêtes
    pub fn respond_with(&self, status: u16) {
        self.state.status.store(status, Ordering::SeqCst);
    }

    /// Toutes les notifications reçues (pour assertions de tests)
    pub fn received(&self) -> Vec<ReceivedNotification> {
        self.state.received.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.state.received.lock().unwrap().len()
    }

    /// Attend au moins `count` notifications ou l'expiration du délai
    pub async fn wait_for(&self, count: usize, timeout_ms: u64) -> Vec<ReceivedNotification> {
        let start = std::time::Instant::now();

        while start.elapsed() < Duration::from_millis(timeout_ms) {
            if self.count() >= count {
                return self.received();
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        log::warn!("[stub] timeout waiting for {} notifications (got {})", count, self.count());
        self.received()
    }

    pub fn clear(&self) {
        self.state.received.lock().unwrap().clear();
    }
}

impl Drop for StubEndpoint {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn receive_notification(
    State(state): State<StubState>,
    Path(device): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let notification = ReceivedNotification {
        device,
        query,
        content_type: headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    };

    log::info!("[stub] notification for {}", notification.device);
    state.received.lock().unwrap().push(notification);

    StatusCode::from_u16(state.status.load(Ordering::SeqCst))
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_records_post() {
        let stub = StubEndpoint::start().await.unwrap();
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{}/aa:bb:cc:dd:ee:ff/notifications?type=vitals", stub.base_url()))
            .json(&serde_json::json!({"metrics": [{"name": "temperature", "value": "36.5"}]}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);

        let received = stub.received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].device, "aa:bb:cc:dd:ee:ff");
        assert_eq!(received[0].query.get("type").map(String::as_str), Some("vitals"));
        assert_eq!(received[0].content_type.as_deref(), Some("application/json"));
        assert_eq!(received[0].metric_values(), vec!["36.5"]);
    }

    #[tokio::test]
    async fn test_configurable_status() {
        let stub = StubEndpoint::start().await.unwrap();
        stub.respond_with(503);

        let response = reqwest::Client::new()
            .post(format!("{}/dev/notifications", stub.base_url()))
            .body("not json")
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 503);
        assert_eq!(stub.received()[0].body, Value::Null);
    }
}
