//! In-memory sink for tests: keeps every delivered record and can fail on demand.

use super::{NotificationSink, NotifyError};
use crate::metrics::HealthRecord;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;

/// Test double for [`NotificationSink`]
#[derive(Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<HealthRecord>>,
    failures_left: Mutex<usize>,
    attempts: Mutex<usize>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first `count` sends fail with a 503
    pub fn failing_first(count: usize) -> Self {
        Self {
            failures_left: Mutex::new(count),
            ..Self::default()
        }
    }

    pub fn delivered(&self) -> Vec<HealthRecord> {
        self.delivered.lock().clone()
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock()
    }

    /// Poll until `count` records were delivered or `timeout` elapsed
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<HealthRecord> {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.delivered.lock().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.delivered()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(&self, record: &HealthRecord) -> Result<(), NotifyError> {
        *self.attempts.lock() += 1;

        {
            let mut failures_left = self.failures_left.lock();
            if *failures_left > 0 {
                *failures_left -= 1;
                return Err(NotifyError::UnexpectedStatus {
                    status: 503,
                    body: "service unavailable".to_string(),
                });
            }
        }

        self.delivered.lock().push(record.clone());
        Ok(())
    }
}
