//! Single consumer of the record queue
//!
//! Records go out one at a time, in queue order. A failed delivery is logged
//! and the record discarded; the next one is sent as usual.

use crate::lifecycle::Shutdown;
use crate::metrics::HealthRecord;
use crate::notify::NotificationSink;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Delivery counters reported when the dispatcher stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub delivered: usize,
    pub failed: usize,
    /// Still queued when shutdown arrived
    pub dropped: usize,
}

pub struct Dispatcher {
    queue: mpsc::Receiver<HealthRecord>,
    sink: Arc<dyn NotificationSink>,
    shutdown: Shutdown,
    stats: DispatchStats,
}

impl Dispatcher {
    pub fn new(queue: mpsc::Receiver<HealthRecord>, sink: Arc<dyn NotificationSink>, shutdown: Shutdown) -> Self {
        Self {
            queue,
            sink,
            shutdown,
            stats: DispatchStats::default(),
        }
    }

    /// Forward records until shutdown or until every producer is gone
    pub async fn run(mut self) -> DispatchStats {
        loop {
            let record = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    self.drop_pending();
                    break;
                }
                next = self.queue.recv() => match next {
                    Some(record) => record,
                    None => {
                        debug!("Record queue closed");
                        break;
                    }
                },
            };

            self.deliver(&record).await;
        }

        info!(
            "Dispatcher stopped: {} delivered, {} failed, {} dropped",
            self.stats.delivered, self.stats.failed, self.stats.dropped
        );
        self.stats
    }

    async fn deliver(&mut self, record: &HealthRecord) {
        info!("{}", record);

        match self.sink.send(record).await {
            Ok(()) => self.stats.delivered += 1,
            Err(e) => {
                self.stats.failed += 1;
                error!("Failed to send vitals of {}: {}", record.device_identifier(), e);
            }
        }
    }

    fn drop_pending(&mut self) {
        self.queue.close();
        while self.queue.try_recv().is_ok() {
            self.stats.dropped += 1;
        }
        if self.stats.dropped > 0 {
            warn!("Shutdown: {} queued record(s) not sent", self.stats.dropped);
        }
    }
}
