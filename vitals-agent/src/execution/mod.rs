//! Script execution module for the vitals agent
//!
//! Handles execution of the device's diagnostic scripts:
//! - Spawning through an interpreter (`/bin/bash <script> <args>`) or directly
//! - Separate capture of stdout and stderr
//! - Bounded execution: a script that outlives its timeout is killed
//! - Failure reports that carry path, arguments and stderr

#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command as AsyncCommand;
use tracing::debug;

/// Interpreter used when none is configured
pub const DEFAULT_INTERPRETER: &str = "/bin/bash";

/// Upper bound for a single script run
pub const DEFAULT_SCRIPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Failure of a single script run
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("failed to spawn {}: {source}", .path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} {args:?} exited with {}: {stderr}", .path.display(), describe_exit(.code))]
    NonZeroExit {
        path: PathBuf,
        args: Vec<String>,
        /// `None` when the process was terminated by a signal
        code: Option<i32>,
        stderr: String,
    },
    #[error("{} timed out after {after:?}", .path.display())]
    TimedOut { path: PathBuf, after: Duration },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "a signal".to_string(),
    }
}

/// Runs an executable and hands back its stdout
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    async fn run(&self, path: &Path, args: &[String]) -> Result<String, ExecutionError>;
}

/// Production runner backed by `tokio::process`
#[derive(Debug, Clone)]
pub struct ShellRunner {
    interpreter: Option<PathBuf>,
    timeout: Duration,
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self {
            interpreter: Some(PathBuf::from(DEFAULT_INTERPRETER)),
            timeout: DEFAULT_SCRIPT_TIMEOUT,
        }
    }
}

impl ShellRunner {
    pub fn new(interpreter: Option<PathBuf>, timeout: Duration) -> Self {
        Self { interpreter, timeout }
    }

    /// Runner that executes the target itself, without an interpreter
    pub fn direct() -> Self {
        Self {
            interpreter: None,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self, path: &Path, args: &[String]) -> AsyncCommand {
        let mut cmd = match &self.interpreter {
            Some(interpreter) => {
                let mut cmd = AsyncCommand::new(interpreter);
                cmd.arg(path);
                cmd
            }
            None => AsyncCommand::new(path),
        };

        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // dropping the output future on timeout must take the child down with it
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl ScriptRunner for ShellRunner {
    async fn run(&self, path: &Path, args: &[String]) -> Result<String, ExecutionError> {
        let start_time = Instant::now();
        debug!("Running script: {} {:?} (timeout: {:?})", path.display(), args, self.timeout);

        let mut cmd = self.command(path, args);
        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => result.map_err(|source| ExecutionError::Spawn {
                path: path.to_path_buf(),
                source,
            })?,
            Err(_) => {
                return Err(ExecutionError::TimedOut {
                    path: path.to_path_buf(),
                    after: self.timeout,
                })
            }
        };

        debug!(
            "Script {} finished in {}ms with {}",
            path.display(),
            start_time.elapsed().as_millis(),
            output.status
        );

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(ExecutionError::NonZeroExit {
                path: path.to_path_buf(),
                args: args.to_vec(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}
