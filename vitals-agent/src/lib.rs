//! Vitals Agent - device health reporting
//!
//! Runs on a small device (Raspberry Pi class) and periodically:
//! - Executes diagnostic shell scripts
//! - Parses their comma-separated output into health records
//! - Forwards each record to the notifications API over HTTP
//!
//! Script tasks feed a bounded queue drained by a single dispatcher; the
//! [`lifecycle::Coordinator`] owns both and stops them on interrupt.

pub mod config;
pub mod discovery;
pub mod dispatcher;
pub mod execution;
pub mod lifecycle;
pub mod metrics;
pub mod notify;
pub mod scheduler;

pub use config::{AgentConfig, ConfigError};
pub use discovery::{DeviceIdentity, IdentityError};
pub use dispatcher::{DispatchStats, Dispatcher};
pub use execution::{ExecutionError, ScriptRunner, ShellRunner};
pub use lifecycle::{Coordinator, RunSummary, Shutdown};
pub use metrics::{HealthRecord, Metric, ParseError, ScriptKind};
pub use notify::{HttpNotifier, NotificationSink, NotifyError};
pub use scheduler::{ScriptTask, TaskExit};
