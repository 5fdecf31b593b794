//! Terminal-state classification.
//!
//! [`classify`] maps one task snapshot to retry, success or failure. It is a
//! pure function of the snapshot and the container whose exit code decides
//! the outcome, so it can be exercised against synthetic status sequences.

use crate::error::RunnerError;
use crate::task::{StopCode, TaskHandle, TaskSnapshot};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a stopped task counts as failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    /// Stopped for a reason other than its essential container exiting.
    StopCode {
        code: Option<StopCode>,
        reason: Option<String>,
    },
    /// The named container exited non-zero.
    ExitCode { container: String, code: i32 },
    /// The named container is present but never reported an exit code.
    MissingExitCode {
        container: String,
        reason: Option<String>,
    },
    /// No container with the expected name in the stopped task.
    ContainerMissing { container: String },
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::StopCode { code, reason } => {
                match code {
                    Some(code) => write!(f, "task stopped with {}", code)?,
                    None => write!(f, "task stopped without a stop code")?,
                }
                if let Some(reason) = reason {
                    write!(f, " ({})", reason)?;
                }
                Ok(())
            }
            FailureCause::ExitCode { container, code } => {
                write!(f, "command in container {} returned exit code {}", container, code)
            }
            FailureCause::MissingExitCode { container, reason } => {
                write!(f, "container {} reported no exit code", container)?;
                if let Some(reason) = reason {
                    write!(f, " ({})", reason)?;
                }
                Ok(())
            }
            FailureCause::ContainerMissing { container } => {
                write!(f, "named container not found in task result: {}", container)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => write!(f, "success"),
            Outcome::Failure => write!(f, "failure"),
        }
    }
}

/// Final result of waiting on a set of tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Success,
    Failure {
        handle: TaskHandle,
        cause: FailureCause,
    },
}

impl Verdict {
    pub fn outcome(&self) -> Outcome {
        match self {
            Verdict::Success => Outcome::Success,
            Verdict::Failure { .. } => Outcome::Failure,
        }
    }

    pub fn cause(&self) -> Option<String> {
        match self {
            Verdict::Success => None,
            Verdict::Failure { cause, .. } => Some(cause.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Verdict::Success)
    }

    /// Turn a failure verdict into the error the caller reports.
    pub fn into_result(self) -> Result<(), RunnerError> {
        match self {
            Verdict::Success => Ok(()),
            Verdict::Failure {
                handle,
                cause: FailureCause::ContainerMissing { container },
            } => Err(RunnerError::NamedContainerMissing { handle, container }),
            Verdict::Failure { handle, cause } => Err(RunnerError::TaskFailed { handle, cause }),
        }
    }
}

/// What one snapshot says about its task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Retry,
    Success,
    Failure(FailureCause),
}

pub fn classify(snapshot: &TaskSnapshot, container: &str) -> Classification {
    if !snapshot.status.is_terminal() {
        return Classification::Retry;
    }

    match &snapshot.stop_code {
        Some(code) if code.is_normal_exit() => {}
        code => {
            return Classification::Failure(FailureCause::StopCode {
                code: code.clone(),
                reason: snapshot.stopped_reason.clone(),
            })
        }
    }

    let Some(state) = snapshot.container(container) else {
        return Classification::Failure(FailureCause::ContainerMissing {
            container: container.to_string(),
        });
    };

    match state.exit_code {
        Some(0) => Classification::Success,
        Some(code) => Classification::Failure(FailureCause::ExitCode {
            container: container.to_string(),
            code,
        }),
        None => Classification::Failure(FailureCause::MissingExitCode {
            container: container.to_string(),
            reason: state.reason.clone(),
        }),
    }
}
