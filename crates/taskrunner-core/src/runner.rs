use crate::api::TaskApi;
use crate::error::RunnerError;
use crate::launcher::Launcher;
use crate::task::{RunRequest, TaskHandle};
use crate::verdict::Outcome;
use crate::waiter::{WaitPolicy, Waiter};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Record of an accepted run: the request echoed back, the launched tasks
/// and, when the run waited, its outcome.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub request: RunRequest,
    pub handles: Vec<TaskHandle>,
    pub outcome: Option<Outcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "task_definition": self.request.task_definition,
            "cluster": self.request.ecs_cluster_arn,
            "container": self.request.container,
            "command": self.request.command,
            "tasks": self.handles,
            "outcome": self.outcome,
            "started_at": self.started_at.to_rfc3339(),
            "finished_at": self.finished_at.to_rfc3339(),
            "duration_secs": (self.finished_at - self.started_at).num_seconds(),
        })
    }
}

/// Launch-then-wait for one request.
pub struct TaskRunner {
    launcher: Launcher,
    waiter: Waiter,
}

impl TaskRunner {
    pub fn new(client: Arc<dyn TaskApi>, policy: WaitPolicy) -> Self {
        Self {
            launcher: Launcher::new(Arc::clone(&client)),
            waiter: Waiter::new(client, policy),
        }
    }

    /// Run the request. Succeeds only if the named container exited 0 (or
    /// the request asked not to wait); every other ending is an error.
    pub async fn run(
        &self,
        request: &RunRequest,
        cancel: &CancellationToken,
    ) -> Result<RunReport, RunnerError> {
        let spec = request.into_spec()?;
        let started_at = Utc::now();
        let handles = self.launcher.launch(&spec).await?;

        let outcome = if request.wait_until_completed {
            let verdict = self
                .waiter
                .wait(
                    &handles,
                    &spec.cluster_id,
                    &spec.container_name,
                    spec.max_wait,
                    cancel,
                )
                .await?;
            let outcome = verdict.outcome();
            verdict.into_result()?;
            Some(outcome)
        } else {
            None
        };

        Ok(RunReport {
            request: request.clone(),
            handles,
            outcome,
            started_at,
            finished_at: Utc::now(),
        })
    }
}
