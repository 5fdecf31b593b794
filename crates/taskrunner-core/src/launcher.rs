use crate::api::{join_failures, ApiError, ContainerOverride, RunTaskRequest, TaskApi, STARTED_BY};
use crate::error::RunnerError;
use crate::task::{TaskHandle, TaskSpec};
use std::sync::Arc;
use tracing::{debug, info};

/// Starts a single task instance from a [`TaskSpec`].
pub struct Launcher {
    client: Arc<dyn TaskApi>,
}

impl Launcher {
    pub fn new(client: Arc<dyn TaskApi>) -> Self {
        Self { client }
    }

    /// Submit the run request. Returns the handles of the started tasks,
    /// never an empty list. Launch failures are not retried.
    pub async fn launch(&self, spec: &TaskSpec) -> Result<Vec<TaskHandle>, RunnerError> {
        spec.validate()?;
        let request = build_request(spec);
        debug!(
            "RunTask {} on {} (override: {:?})",
            request.task_definition, request.cluster, request.overrides
        );

        let response = self
            .client
            .run_task(request)
            .await
            .map_err(RunnerError::LaunchFailed)?;

        if response.tasks.is_empty() {
            let reason = if response.failures.is_empty() {
                "no tasks were started".to_string()
            } else {
                format!("no tasks were started: {}", join_failures(&response.failures))
            };
            return Err(RunnerError::LaunchFailed(ApiError::fatal(reason)));
        }

        info!(
            "Started {} task(s) from {}: {:?}",
            response.tasks.len(),
            spec.definition_id,
            response.tasks
        );
        Ok(response.tasks)
    }
}

/// One instance, tagged with [`STARTED_BY`]; the command override (if any)
/// targets the named container.
pub fn build_request(spec: &TaskSpec) -> RunTaskRequest {
    RunTaskRequest {
        task_definition: spec.definition_id.clone(),
        cluster: spec.cluster_id.clone(),
        count: 1,
        started_by: STARTED_BY.to_string(),
        overrides: spec.command.as_ref().map(|command| ContainerOverride {
            name: spec.container_name.clone(),
            command: command.clone(),
        }),
        client_token: uuid::Uuid::new_v4().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> TaskSpec {
        TaskSpec::new(
            "app:3",
            "arn:aws:ecs:eu-west-1:123456789012:cluster/prod",
            "worker",
        )
    }

    #[test]
    fn command_is_scoped_to_the_named_container() {
        let request = build_request(&spec().with_command_line("echo hello world"));
        assert_eq!(request.count, 1);
        assert_eq!(request.started_by, "taskrunner-aws-ecs");
        assert_eq!(
            request.overrides,
            Some(ContainerOverride {
                name: "worker".into(),
                command: vec!["echo".into(), "hello".into(), "world".into()],
            })
        );
    }

    #[test]
    fn no_command_sends_no_override() {
        let request = build_request(&spec().with_command_line(""));
        assert_eq!(request.overrides, None);
        assert_eq!(request.task_definition, "app:3");
    }

    #[test]
    fn every_request_gets_its_own_token() {
        let a = build_request(&spec());
        let b = build_request(&spec());
        assert_ne!(a.client_token, b.client_token);
    }
}
