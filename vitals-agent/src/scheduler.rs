//! Periodic script tasks
//!
//! One tokio task per monitored script. Each tick waits for the interval, runs
//! the script, parses its output and pushes the record onto the shared queue:
//!
//! ```text
//! Waiting(interval) -> Running -> Emitting -> Waiting
//!        \__________________________/
//!              shutdown -> Terminated
//! ```
//!
//! A script that fails to run ends its task; output that fails to parse only
//! costs that tick.

use crate::discovery::DeviceIdentity;
use crate::execution::{ExecutionError, ScriptRunner};
use crate::lifecycle::Shutdown;
use crate::metrics::{HealthRecord, ScriptKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Capacity of the queue between script tasks and the dispatcher
pub const QUEUE_CAPACITY: usize = 10;

/// A monitored script, fixed at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptTask {
    path: PathBuf,
    args: Vec<String>,
    kind: ScriptKind,
    interval: Duration,
}

impl ScriptTask {
    pub fn new(path: impl Into<PathBuf>, args: Vec<String>, kind: ScriptKind, interval: Duration) -> Self {
        Self {
            path: path.into(),
            args,
            kind,
            interval,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn kind(&self) -> ScriptKind {
        self.kind
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// Why a script task ended
#[derive(Debug)]
pub enum TaskExit {
    Cancelled,
    ScriptFailed(ExecutionError),
    /// The dispatcher is gone, nobody reads the queue anymore
    QueueClosed,
}

/// Drive one script until shutdown or a fatal script failure
pub async fn run_task(
    task: ScriptTask,
    runner: Arc<dyn ScriptRunner>,
    device: Arc<DeviceIdentity>,
    queue: mpsc::Sender<HealthRecord>,
    shutdown: Shutdown,
) -> TaskExit {
    info!(
        "Task started: {} ({}) every {:?}",
        task.path.display(),
        task.kind,
        task.interval
    );

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                debug!("Task {}: shutdown while waiting", task.path.display());
                return TaskExit::Cancelled;
            }
            _ = tokio::time::sleep(task.interval) => {}
        }

        // not interruptible: the script's own timeout bounds this call
        let output = match runner.run(&task.path, &task.args).await {
            Ok(output) => output,
            Err(e) => {
                error!("failed to run script {} {:?}: {}", task.path.display(), task.args, e);
                return TaskExit::ScriptFailed(e);
            }
        };

        let record = match task.kind.parse(&output, &device) {
            Ok(record) => record,
            Err(e) => {
                warn!("Dropping output of {}: {}", task.path.display(), e);
                continue;
            }
        };

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                debug!("Task {}: shutdown while queue full", task.path.display());
                return TaskExit::Cancelled;
            }
            sent = queue.send(record) => {
                if sent.is_err() {
                    warn!("Task {}: queue closed, stopping", task.path.display());
                    return TaskExit::QueueClosed;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::mock::ScriptedRunner;
    use tokio::time::Instant;

    const INTERVAL: Duration = Duration::from_secs(10);
    const VITALS: &str = "36.5,61,5.1,120,300\n";

    fn device() -> Arc<DeviceIdentity> {
        Arc::new(DeviceIdentity::new("b8:27:eb:43:59:f8", "test device"))
    }

    fn task(interval: Duration) -> ScriptTask {
        ScriptTask::new("./scripts/vital_stats.sh", vec![], ScriptKind::VitalStats, interval)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_run_waits_one_interval() {
        let runner = Arc::new(ScriptedRunner::repeating(VITALS));
        let (tx, mut rx) = mpsc::channel(QUEUE_CAPACITY);
        let shutdown = Shutdown::new();

        let start = Instant::now();
        let handle = tokio::spawn(run_task(task(INTERVAL), runner.clone(), device(), tx, shutdown.clone()));

        let record = rx.recv().await.unwrap();
        assert!(start.elapsed() >= INTERVAL);
        assert_eq!(record.metric("temperature"), Some("36.5"));

        shutdown.cancel();
        assert!(matches!(handle.await.unwrap(), TaskExit::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_records_keep_production_order() {
        let runner = Arc::new(ScriptedRunner::with_responses(
            (1..=4).map(|n| Ok(format!("{n},61,5.1,120,300"))).collect(),
        ));
        let (tx, mut rx) = mpsc::channel(QUEUE_CAPACITY);
        let shutdown = Shutdown::new();
        let handle = tokio::spawn(run_task(task(INTERVAL), runner, device(), tx, shutdown.clone()));

        for expected in ["1", "2", "3", "4"] {
            let record = rx.recv().await.unwrap();
            assert_eq!(record.metric("temperature"), Some(expected));
        }

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_script_failure_ends_task() {
        let runner = Arc::new(ScriptedRunner::failing("./scripts/vital_stats.sh", "vcgencmd: not found"));
        let (tx, mut rx) = mpsc::channel(QUEUE_CAPACITY);
        let shutdown = Shutdown::new();

        let exit = run_task(task(INTERVAL), runner.clone(), device(), tx, shutdown).await;

        match exit {
            TaskExit::ScriptFailed(e) => assert!(e.to_string().contains("vcgencmd: not found")),
            other => panic!("unexpected exit: {other:?}"),
        }
        assert_eq!(runner.run_count(), 1);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_parse_failure_skips_tick() {
        let runner = Arc::new(ScriptedRunner::with_responses(vec![
            Ok("36.5,61".to_string()),
            Ok("\n".to_string()),
            Ok("1,2,3,4,5".to_string()),
        ]));
        let (tx, mut rx) = mpsc::channel(QUEUE_CAPACITY);
        let shutdown = Shutdown::new();
        let handle = tokio::spawn(run_task(task(INTERVAL), runner.clone(), device(), tx, shutdown.clone()));

        let record = rx.recv().await.unwrap();
        assert_eq!(record.values(), vec!["1", "2", "3", "4", "5"]);
        assert!(runner.run_count() >= 3);

        shutdown.cancel();
        assert!(matches!(handle.await.unwrap(), TaskExit::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_queue_blocks_producer() {
        let runner = Arc::new(ScriptedRunner::repeating(VITALS));
        let (tx, mut rx) = mpsc::channel(QUEUE_CAPACITY);
        let shutdown = Shutdown::new();
        let interval = Duration::from_secs(1);
        let handle = tokio::spawn(run_task(task(interval), runner.clone(), device(), tx, shutdown.clone()));

        // 10 records queued, the 11th waits for room
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(runner.run_count(), QUEUE_CAPACITY + 1);

        // one slot freed: the 11th goes in, the 12th run blocks again
        rx.recv().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(runner.run_count(), QUEUE_CAPACITY + 2);

        // a producer stuck on a full queue still honours shutdown
        shutdown.cancel();
        assert!(matches!(handle.await.unwrap(), TaskExit::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_queue_ends_task() {
        let runner = Arc::new(ScriptedRunner::repeating(VITALS));
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        drop(rx);

        let exit = run_task(task(INTERVAL), runner, device(), tx, Shutdown::new()).await;
        assert!(matches!(exit, TaskExit::QueueClosed));
    }
}
