//! Scripted runner for tests: returns pre-seeded outputs and records every call.

use super::{ExecutionError, ScriptRunner};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// Test double for [`ScriptRunner`]
pub struct ScriptedRunner {
    responses: Mutex<VecDeque<Result<String, ExecutionError>>>,
    fallback: Option<String>,
    invocations: Mutex<Vec<(PathBuf, Vec<String>)>>,
}

impl ScriptedRunner {
    /// Responses are returned in order; once exhausted every run yields empty stdout
    pub fn with_responses(responses: Vec<Result<String, ExecutionError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            fallback: None,
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Every run yields the same stdout
    pub fn repeating(stdout: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fallback: Some(stdout.into()),
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Fails with a non-zero exit carrying `stderr`
    pub fn failing(path: impl Into<PathBuf>, stderr: impl Into<String>) -> Self {
        Self::with_responses(vec![Err(ExecutionError::NonZeroExit {
            path: path.into(),
            args: Vec::new(),
            code: Some(1),
            stderr: stderr.into(),
        })])
    }

    pub fn invocations(&self) -> Vec<(PathBuf, Vec<String>)> {
        self.invocations.lock().clone()
    }

    pub fn run_count(&self) -> usize {
        self.invocations.lock().len()
    }
}

#[async_trait]
impl ScriptRunner for ScriptedRunner {
    async fn run(&self, path: &Path, args: &[String]) -> Result<String, ExecutionError> {
        self.invocations.lock().push((path.to_path_buf(), args.to_vec()));

        if let Some(response) = self.responses.lock().pop_front() {
            return response;
        }
        Ok(self.fallback.clone().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_responses_in_order_then_empty() {
        let runner = ScriptedRunner::with_responses(vec![
            Ok("first".into()),
            Err(ExecutionError::TimedOut {
                path: "slow.sh".into(),
                after: std::time::Duration::from_secs(1),
            }),
        ]);

        assert_eq!(runner.run(Path::new("a.sh"), &[]).await.unwrap(), "first");
        assert!(runner.run(Path::new("a.sh"), &[]).await.is_err());
        assert_eq!(runner.run(Path::new("a.sh"), &[]).await.unwrap(), "");
        assert_eq!(runner.run_count(), 3);
    }

    #[tokio::test]
    async fn test_records_arguments() {
        let runner = ScriptedRunner::repeating("b8:27:eb:43:59:f8");
        runner
            .run(Path::new("mac_id.sh"), &["wlan0".to_string()])
            .await
            .unwrap();

        let calls = runner.invocations();
        assert_eq!(calls[0].0, PathBuf::from("mac_id.sh"));
        assert_eq!(calls[0].1, vec!["wlan0".to_string()]);
    }
}
