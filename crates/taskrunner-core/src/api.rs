use crate::task::{TaskHandle, TaskSnapshot};
use thiserror::Error;

/// Marker recorded as `startedBy` on every task this tool launches.
pub const STARTED_BY: &str = "taskrunner-aws-ecs";

/// An error returned by the orchestration API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ApiError {
    pub message: String,
    /// Throttling, server-side or connection errors that may succeed on retry.
    pub transient: bool,
}

impl ApiError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: true,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerOverride {
    pub name: String,
    pub command: Vec<String>,
}

/// A "run task" call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTaskRequest {
    pub task_definition: String,
    pub cluster: String,
    pub count: i32,
    pub started_by: String,
    pub overrides: Option<ContainerOverride>,
    /// Idempotency token; repeating a call with the same token starts nothing new.
    pub client_token: String,
}

/// A per-resource failure the API reports alongside (or instead of) results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFailure {
    pub arn: Option<String>,
    pub reason: String,
}

impl std::fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.arn {
            Some(arn) => write!(f, "{}: {}", arn, self.reason),
            None => write!(f, "{}", self.reason),
        }
    }
}

pub fn join_failures(failures: &[ApiFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunTaskResponse {
    pub tasks: Vec<TaskHandle>,
    pub failures: Vec<ApiFailure>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescribeTasksResponse {
    pub tasks: Vec<TaskSnapshot>,
    pub failures: Vec<ApiFailure>,
}

/// The two orchestration calls a run needs. Implementations must be safe to
/// share between concurrent runs.
#[async_trait::async_trait]
pub trait TaskApi: Send + Sync {
    /// Start task instance(s) from a task definition.
    async fn run_task(&self, request: RunTaskRequest) -> Result<RunTaskResponse, ApiError>;

    /// Fetch the current state of the given tasks.
    async fn describe_tasks(
        &self,
        cluster: &str,
        handles: &[TaskHandle],
    ) -> Result<DescribeTasksResponse, ApiError>;
}
