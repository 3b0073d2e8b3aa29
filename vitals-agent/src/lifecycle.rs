//! Agent lifecycle: shutdown propagation and the join barrier
//!
//! The [`Coordinator`] starts, in this order:
//! 1. the interrupt listener (shutdown has priority even during startup)
//! 2. the dispatcher
//! 3. one task per monitored script
//!
//! then waits for every one of them before returning. All units share one
//! [`Shutdown`]; nothing is spawned detached.

use crate::discovery::DeviceIdentity;
use crate::dispatcher::{DispatchStats, Dispatcher};
use crate::execution::ScriptRunner;
use crate::notify::NotificationSink;
use crate::scheduler::{self, ScriptTask, TaskExit, QUEUE_CAPACITY};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Cooperative shutdown shared by every unit of the agent
#[derive(Debug, Clone)]
pub struct Shutdown {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    /// Request shutdown; idempotent
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once shutdown has been requested
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        // the sender lives as long as any clone of self, so this cannot fail early
        let _ = receiver.wait_for(|stopped| *stopped).await;
    }
}

/// Outcome of a full agent run
#[derive(Debug)]
pub struct RunSummary {
    pub tasks: Vec<(PathBuf, TaskExit)>,
    pub dispatch: DispatchStats,
    /// False when the agent stopped because every unit ended on its own
    pub interrupted: bool,
}

/// Supervisor owning every unit of the agent
pub struct Coordinator {
    device: Arc<DeviceIdentity>,
    runner: Arc<dyn ScriptRunner>,
    sink: Arc<dyn NotificationSink>,
    tasks: Vec<ScriptTask>,
    queue_capacity: usize,
    shutdown: Shutdown,
}

impl Coordinator {
    pub fn new(
        device: Arc<DeviceIdentity>,
        runner: Arc<dyn ScriptRunner>,
        sink: Arc<dyn NotificationSink>,
        tasks: Vec<ScriptTask>,
    ) -> Self {
        Self {
            device,
            runner,
            sink,
            tasks,
            queue_capacity: QUEUE_CAPACITY,
            shutdown: Shutdown::new(),
        }
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Handle to stop the agent from outside
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Run until `interrupt` resolves (or everything ended), then join all units
    pub async fn run<F>(self, interrupt: F) -> RunSummary
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let shutdown = self.shutdown;

        let listener = tokio::spawn(listen(interrupt, shutdown.clone()));

        let (queue, records) = mpsc::channel(self.queue_capacity);
        let dispatcher = tokio::spawn(Dispatcher::new(records, self.sink, shutdown.clone()).run());

        let mut workers = JoinSet::new();
        for task in self.tasks {
            let path = task.path().to_path_buf();
            let run = scheduler::run_task(
                task,
                self.runner.clone(),
                self.device.clone(),
                queue.clone(),
                shutdown.clone(),
            );
            workers.spawn(async move { (path, run.await) });
        }
        // only the tasks may keep the queue open
        drop(queue);

        info!("Agent running: {} script task(s)", workers.len());

        let mut exits = Vec::new();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((path, exit)) => {
                    info!("Task {} ended: {:?}", path.display(), exit);
                    exits.push((path, exit));
                }
                Err(e) => error!("Script task aborted: {}", e),
            }
        }

        let dispatch = match dispatcher.await {
            Ok(stats) => stats,
            Err(e) => {
                error!("Dispatcher aborted: {}", e);
                DispatchStats::default()
            }
        };

        // nothing left to supervise: release the listener
        shutdown.cancel();
        let interrupted = listener.await.unwrap_or(false);

        RunSummary {
            tasks: exits,
            dispatch,
            interrupted,
        }
    }
}

async fn listen<F>(interrupt: F, shutdown: Shutdown) -> bool
where
    F: Future<Output = ()>,
{
    tokio::select! {
        _ = interrupt => {
            warn!("Interrupted at {}, shutting down", chrono::Local::now().format("%d %b %y %H:%M %Z"));
            shutdown.cancel();
            true
        }
        _ = shutdown.cancelled() => false,
    }
}

/// Resolves on Ctrl-C, or SIGTERM on Unix (systemd stop)
pub async fn interrupt_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        if let Err(e) = result {
                            error!("Ctrl-C handler failed: {}", e);
                            terminate.recv().await;
                        }
                    }
                    _ = terminate.recv() => {}
                }
                return;
            }
            Err(e) => warn!("SIGTERM handler unavailable: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Ctrl-C handler failed, agent can only be stopped by killing it: {}", e);
        std::future::pending::<()>().await;
    }
}
