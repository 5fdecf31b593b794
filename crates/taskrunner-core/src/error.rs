use crate::api::ApiError;
use crate::task::{join_handles, TaskHandle};
use crate::verdict::FailureCause;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Invalid task spec: {0}")]
    InvalidSpec(String),

    #[error("Run task request failed: {0}")]
    LaunchFailed(#[source] ApiError),

    #[error("Task status query failed: {message}")]
    QueryFailed {
        handles: Vec<TaskHandle>,
        message: String,
    },

    #[error("Named container not found in task result: {container} (task {handle})")]
    NamedContainerMissing {
        handle: TaskHandle,
        container: String,
    },

    #[error("Task {handle} failed: {cause}")]
    TaskFailed {
        handle: TaskHandle,
        cause: FailureCause,
    },

    #[error("Timed out after {}s waiting for task(s): {}", .waited.as_secs(), join_handles(.handles))]
    WaitTimeout {
        handles: Vec<TaskHandle>,
        waited: Duration,
    },

    #[error("Wait cancelled")]
    Cancelled { handles: Vec<TaskHandle> },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Short title plus detail, as reported to whoever invoked the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub summary: String,
    pub detail: String,
}

impl RunnerError {
    /// Tasks the run was waiting on when the error happened, if it got that far.
    pub fn handles(&self) -> &[TaskHandle] {
        match self {
            RunnerError::QueryFailed { handles, .. }
            | RunnerError::WaitTimeout { handles, .. }
            | RunnerError::Cancelled { handles } => handles.as_slice(),
            RunnerError::NamedContainerMissing { handle, .. }
            | RunnerError::TaskFailed { handle, .. } => std::slice::from_ref(handle),
            RunnerError::InvalidSpec(_)
            | RunnerError::LaunchFailed(_)
            | RunnerError::Config(_) => &[],
        }
    }

    pub fn diagnostic(&self) -> Diagnostic {
        let summary = match (self, self.handles().first()) {
            (RunnerError::InvalidSpec(_) | RunnerError::Config(_), _) => {
                "invalid run configuration".to_string()
            }
            (RunnerError::Cancelled { .. }, Some(handle)) => {
                format!("cancelled while waiting for task {}", handle)
            }
            (_, Some(handle)) => format!("failed to wait for task {}", handle),
            (_, None) => "failed to run task".to_string(),
        };
        Diagnostic {
            summary,
            detail: self.to_string(),
        }
    }

    /// Process exit status for a CLI reporting this error. A container that
    /// exited non-zero passes its own code through.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunnerError::TaskFailed {
                cause: FailureCause::ExitCode { code, .. },
                ..
            } => (*code).clamp(1, 255),
            RunnerError::Cancelled { .. } => 130,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_errors_use_run_summary() {
        let err = RunnerError::LaunchFailed(ApiError::fatal("AccessDenied"));
        let diag = err.diagnostic();
        assert_eq!(diag.summary, "failed to run task");
        assert!(diag.detail.contains("AccessDenied"));
    }

    #[test]
    fn wait_errors_name_the_first_handle() {
        let handles = vec![TaskHandle::new("task-123")];
        let err = RunnerError::WaitTimeout {
            handles,
            waited: Duration::from_secs(60),
        };
        let diag = err.diagnostic();
        assert_eq!(diag.summary, "failed to wait for task task-123");
        assert!(diag.detail.contains("60s"));
        assert!(diag.detail.contains("task-123"));
    }

    #[test]
    fn task_failures_name_their_task() {
        let err = RunnerError::NamedContainerMissing {
            handle: TaskHandle::new("task-9"),
            container: "worker".into(),
        };
        assert_eq!(err.handles(), &[TaskHandle::new("task-9")]);
        assert_eq!(err.diagnostic().summary, "failed to wait for task task-9");
    }

    #[test]
    fn exit_code_passes_container_status_through() {
        let err = RunnerError::TaskFailed {
            handle: TaskHandle::new("task-123"),
            cause: FailureCause::ExitCode {
                container: "worker".into(),
                code: 137,
            },
        };
        assert_eq!(err.exit_code(), 137);

        let err = RunnerError::TaskFailed {
            handle: TaskHandle::new("task-123"),
            cause: FailureCause::ExitCode {
                container: "worker".into(),
                code: -1,
            },
        };
        assert_eq!(err.exit_code(), 1);
        assert_eq!(RunnerError::Cancelled { handles: Vec::new() }.exit_code(), 130);
        let err = RunnerError::QueryFailed {
            handles: Vec::new(),
            message: "boom".into(),
        };
        assert_eq!(err.exit_code(), 1);
        assert_eq!(err.diagnostic().summary, "failed to run task");
    }
}
