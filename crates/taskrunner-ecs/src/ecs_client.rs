use aws_config::timeout::TimeoutConfig;
use aws_config::BehaviorVersion;
use aws_sdk_ecs::config::Region;
use aws_sdk_ecs::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_ecs::types::{
    Container, ContainerOverride as EcsContainerOverride, Failure, Task, TaskOverride,
};
use aws_sdk_ecs::Client;
use taskrunner_core::api::{
    ApiFailure, ContainerOverride, DescribeTasksResponse, RunTaskRequest, RunTaskResponse,
};
use taskrunner_core::task::{ContainerState, StopCode, TaskStatus};
use taskrunner_core::{ApiError, TaskApi, TaskHandle, TaskSnapshot};
use std::time::Duration;
use tracing::{debug, info};

/// Error codes ECS returns for conditions worth retrying.
const TRANSIENT_CODES: &[&str] = &[
    "ThrottlingException",
    "ServerException",
    "ServiceUnavailableException",
    "RequestLimitExceeded",
    "TooManyRequestsException",
];

/// Upper bounds for one SDK call, retries included, and for each attempt.
const OPERATION_TIMEOUT: Duration = Duration::from_secs(30);
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// [`TaskApi`] backed by the ECS `RunTask` and `DescribeTasks` operations.
/// The SDK client is cheap to clone and safe to share across runs.
#[derive(Clone, Debug)]
pub struct EcsTaskApi {
    client: Client,
}

impl EcsTaskApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the ambient AWS configuration (environment,
    /// shared config/credential files, instance or task role). `region`
    /// overrides the resolved region.
    pub async fn from_env(region: Option<String>) -> Self {
        let timeouts = TimeoutConfig::builder()
            .operation_timeout(OPERATION_TIMEOUT)
            .operation_attempt_timeout(ATTEMPT_TIMEOUT)
            .build();
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).timeout_config(timeouts);
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        let sdk_config = loader.load().await;
        let api = Self::new(Client::new(&sdk_config));
        info!(
            "Configured ECS client (region: {})",
            api.region().unwrap_or_else(|| "unset".to_string())
        );
        api
    }

    pub fn region(&self) -> Option<String> {
        self.client.config().region().map(|r| r.to_string())
    }
}

#[async_trait::async_trait]
impl TaskApi for EcsTaskApi {
    async fn run_task(&self, request: RunTaskRequest) -> Result<RunTaskResponse, ApiError> {
        debug!(
            "RunTask {} on {} (count {}, started by {})",
            request.task_definition, request.cluster, request.count, request.started_by
        );

        let mut call = self
            .client
            .run_task()
            .cluster(request.cluster)
            .task_definition(request.task_definition)
            .count(request.count)
            .started_by(request.started_by)
            .client_token(request.client_token);
        if let Some(overrides) = request.overrides {
            call = call.overrides(task_override(overrides));
        }

        let output = call.send().await.map_err(api_error)?;
        Ok(RunTaskResponse {
            tasks: output
                .tasks()
                .iter()
                .filter_map(Task::task_arn)
                .map(TaskHandle::new)
                .collect(),
            failures: output.failures().iter().map(api_failure).collect(),
        })
    }

    async fn describe_tasks(
        &self,
        cluster: &str,
        handles: &[TaskHandle],
    ) -> Result<DescribeTasksResponse, ApiError> {
        debug!("DescribeTasks on {}: {:?}", cluster, handles);

        let output = self
            .client
            .describe_tasks()
            .cluster(cluster)
            .set_tasks(Some(handles.iter().map(|h| h.0.clone()).collect()))
            .send()
            .await
            .map_err(api_error)?;

        Ok(DescribeTasksResponse {
            tasks: output.tasks().iter().map(task_snapshot).collect(),
            failures: output.failures().iter().map(api_failure).collect(),
        })
    }
}

fn task_override(overrides: ContainerOverride) -> TaskOverride {
    TaskOverride::builder()
        .container_overrides(
            EcsContainerOverride::builder()
                .name(overrides.name)
                .set_command(Some(overrides.command))
                .build(),
        )
        .build()
}

pub(crate) fn task_snapshot(task: &Task) -> TaskSnapshot {
    TaskSnapshot {
        handle: TaskHandle::new(task.task_arn().unwrap_or_default()),
        status: TaskStatus::parse(task.last_status().unwrap_or("UNKNOWN")),
        stop_code: task.stop_code().map(|code| StopCode::parse(code.as_str())),
        stopped_reason: task.stopped_reason().map(str::to_string),
        containers: task.containers().iter().map(container_state).collect(),
    }
}

fn container_state(container: &Container) -> ContainerState {
    ContainerState {
        name: container.name().unwrap_or_default().to_string(),
        exit_code: container.exit_code(),
        reason: container.reason().map(str::to_string),
    }
}

pub(crate) fn api_failure(failure: &Failure) -> ApiFailure {
    let reason = match (failure.reason(), failure.detail()) {
        (Some(reason), Some(detail)) => format!("{} ({})", reason, detail),
        (Some(reason), None) => reason.to_string(),
        (None, Some(detail)) => detail.to_string(),
        (None, None) => "unknown failure".to_string(),
    };
    ApiFailure {
        arn: failure.arn().map(str::to_string),
        reason,
    }
}

fn api_error<E, R>(err: SdkError<E, R>) -> ApiError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let transient = match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            true
        }
        SdkError::ServiceError(context) => is_transient_code(context.err().code()),
        _ => false,
    };
    ApiError {
        message: DisplayErrorContext(&err).to_string(),
        transient,
    }
}

pub(crate) fn is_transient_code(code: Option<&str>) -> bool {
    code.is_some_and(|code| TRANSIENT_CODES.contains(&code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_ecs::types::TaskStopCode;

    const ARN: &str = "arn:aws:ecs:eu-west-1:123456789012:task/prod/0f9a2c";

    #[test]
    fn stopped_task_maps_to_snapshot() {
        let task = Task::builder()
            .task_arn(ARN)
            .last_status("STOPPED")
            .stop_code(TaskStopCode::EssentialContainerExited)
            .stopped_reason("Essential container in task exited")
            .containers(Container::builder().name("sidecar").exit_code(0).build())
            .containers(Container::builder().name("worker").exit_code(137).build())
            .build();

        let snapshot = task_snapshot(&task);
        assert_eq!(snapshot.handle, TaskHandle::new(ARN));
        assert_eq!(snapshot.status, TaskStatus::Stopped);
        assert_eq!(snapshot.stop_code, Some(StopCode::EssentialContainerExited));
        assert_eq!(snapshot.containers.len(), 2);
        assert_eq!(snapshot.container("worker").unwrap().exit_code, Some(137));
    }

    #[test]
    fn running_task_has_no_stop_details() {
        let task = Task::builder()
            .task_arn(ARN)
            .last_status("RUNNING")
            .containers(
                Container::builder()
                    .name("worker")
                    .last_status("RUNNING")
                    .build(),
            )
            .build();

        let snapshot = task_snapshot(&task);
        assert_eq!(snapshot.status, TaskStatus::Running);
        assert_eq!(snapshot.stop_code, None);
        assert_eq!(snapshot.container("worker").unwrap().exit_code, None);
    }

    #[test]
    fn unrecognised_stop_code_is_kept() {
        let task = Task::builder()
            .task_arn(ARN)
            .last_status("STOPPED")
            .stop_code(TaskStopCode::from("CapacityRebalance"))
            .build();
        assert_eq!(
            task_snapshot(&task).stop_code,
            Some(StopCode::Other("CapacityRebalance".into()))
        );
    }

    #[test]
    fn failures_combine_reason_and_detail() {
        let failure = Failure::builder()
            .arn(ARN)
            .reason("MISSING")
            .detail("task not found")
            .build();
        let mapped = api_failure(&failure);
        assert_eq!(mapped.arn.as_deref(), Some(ARN));
        assert_eq!(mapped.reason, "MISSING (task not found)");
    }

    #[test]
    fn throttling_is_transient() {
        assert!(is_transient_code(Some("ThrottlingException")));
        assert!(is_transient_code(Some("ServerException")));
        assert!(!is_transient_code(Some("AccessDeniedException")));
        assert!(!is_transient_code(Some("ClusterNotFoundException")));
        assert!(!is_transient_code(None));
    }

    #[test]
    fn override_targets_named_container() {
        let overrides = task_override(ContainerOverride {
            name: "worker".into(),
            command: vec!["echo".into(), "hello".into()],
        });
        let container = &overrides.container_overrides()[0];
        assert_eq!(container.name(), Some("worker"));
        assert_eq!(container.command(), &["echo".to_string(), "hello".to_string()]);
    }
}
