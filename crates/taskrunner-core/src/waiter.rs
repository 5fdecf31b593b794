//! Bounded polling until launched tasks stop.

use crate::api::{join_failures, ApiError, DescribeTasksResponse, TaskApi};
use crate::error::RunnerError;
use crate::task::{join_handles, TaskHandle, TaskSnapshot};
use crate::verdict::{classify, Classification, Verdict};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Exponential poll delay: `min_delay` doubling per attempt, capped at
/// `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Backoff {
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay: max_delay.max(min_delay),
        }
    }

    /// Delay after poll number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.min_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(6), Duration::from_secs(15))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub backoff: Backoff,
    /// Keep polling through transient query errors until the deadline.
    pub retry_transient_errors: bool,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            backoff: Backoff::default(),
            retry_transient_errors: true,
        }
    }
}

/// What to do after one status query.
#[derive(Debug)]
pub enum Step {
    /// Poll again; `pending` are the tasks not yet stopped.
    Continue { pending: Vec<TaskHandle> },
    Stop(Verdict),
    Abort(RunnerError),
}

impl WaitPolicy {
    /// Decide the next step from one status query. Every handle must be
    /// answered by exactly one task record. The verdict succeeds only when
    /// every task succeeded; the first failed task (in handle order) decides
    /// a failure.
    pub fn assess(
        &self,
        handles: &[TaskHandle],
        container: &str,
        result: Result<DescribeTasksResponse, ApiError>,
    ) -> Step {
        let response = match result {
            Ok(response) => response,
            Err(err) if err.transient && self.retry_transient_errors => {
                return Step::Continue {
                    pending: handles.to_vec(),
                }
            }
            Err(err) => {
                return Step::Abort(RunnerError::QueryFailed {
                    handles: handles.to_vec(),
                    message: err.message,
                })
            }
        };

        let snapshots = match resolve(handles, &response) {
            Ok(snapshots) => snapshots,
            Err(message) => {
                return Step::Abort(RunnerError::QueryFailed {
                    handles: handles.to_vec(),
                    message,
                })
            }
        };

        let mut pending = Vec::new();
        for snapshot in snapshots {
            match classify(snapshot, container) {
                Classification::Failure(cause) => {
                    return Step::Stop(Verdict::Failure {
                        handle: snapshot.handle.clone(),
                        cause,
                    })
                }
                Classification::Retry => pending.push(snapshot.handle.clone()),
                Classification::Success => {}
            }
        }

        if pending.is_empty() {
            Step::Stop(Verdict::Success)
        } else {
            Step::Continue { pending }
        }
    }
}

/// Pair each handle with its one task record, in handle order.
fn resolve<'a>(
    handles: &[TaskHandle],
    response: &'a DescribeTasksResponse,
) -> Result<Vec<&'a TaskSnapshot>, String> {
    let mut unresolved = Vec::new();
    let mut snapshots = Vec::with_capacity(handles.len());
    for handle in handles {
        let mut matching = response.tasks.iter().filter(|t| t.handle.refers_to(handle));
        match (matching.next(), matching.next()) {
            (Some(snapshot), None) => snapshots.push(snapshot),
            _ => unresolved.push(handle.clone()),
        }
    }

    if unresolved.is_empty() && response.tasks.len() == handles.len() {
        return Ok(snapshots);
    }

    let mut message = if unresolved.is_empty() {
        format!(
            "cannot resolve task state: expected {} task(s), got {}",
            handles.len(),
            response.tasks.len()
        )
    } else {
        format!("cannot resolve task state for {}", join_handles(&unresolved))
    };
    if !response.failures.is_empty() {
        message.push_str(&format!(" ({})", join_failures(&response.failures)));
    }
    Err(message)
}

/// Polls task status until every task stops, the deadline passes, or the
/// caller cancels.
pub struct Waiter {
    client: Arc<dyn TaskApi>,
    policy: WaitPolicy,
}

impl Waiter {
    pub fn new(client: Arc<dyn TaskApi>, policy: WaitPolicy) -> Self {
        Self { client, policy }
    }

    /// Wait for `handles` to stop and return the verdict. The last poll
    /// starts no later than `max_wait` after the first. A query still in
    /// flight one poll interval past the deadline is abandoned. Either way,
    /// tasks still running at that point give [`RunnerError::WaitTimeout`];
    /// they are not stopped.
    pub async fn wait(
        &self,
        handles: &[TaskHandle],
        cluster: &str,
        container: &str,
        max_wait: Duration,
        cancel: &CancellationToken,
    ) -> Result<Verdict, RunnerError> {
        if handles.is_empty() {
            return Err(RunnerError::InvalidSpec(
                "no task handles to wait for".into(),
            ));
        }

        info!(
            "Waiting up to {}s for task(s): {}",
            max_wait.as_secs(),
            join_handles(handles)
        );
        let started = Instant::now();
        let deadline = started + max_wait;
        let hard_deadline = deadline + self.policy.backoff.max_delay;
        let mut pending = handles.to_vec();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(RunnerError::Cancelled { handles: handles.to_vec() })
                }
                result = self.client.describe_tasks(cluster, handles) => result,
                _ = tokio::time::sleep_until(hard_deadline) => {
                    let waited = started.elapsed();
                    warn!(
                        "Poll {} still unanswered after {}s; giving up on {}",
                        attempt,
                        waited.as_secs(),
                        join_handles(&pending)
                    );
                    return Err(RunnerError::WaitTimeout { handles: pending, waited });
                }
            };

            match &result {
                Ok(response) => {
                    for task in &response.tasks {
                        debug!("Poll {}: task {} is {}", attempt, task.handle, task.status);
                    }
                }
                Err(err) if err.transient && self.policy.retry_transient_errors => {
                    warn!("Poll {}: transient query error, retrying: {}", attempt, err);
                }
                Err(_) => {}
            }

            pending = match self.policy.assess(handles, container, result) {
                Step::Stop(verdict) => {
                    match verdict.cause() {
                        None => info!("Task(s) completed successfully after {} poll(s)", attempt),
                        Some(cause) => warn!("Task failed: {}", cause),
                    }
                    return Ok(verdict);
                }
                Step::Abort(err) => return Err(err),
                Step::Continue { pending } => pending,
            };

            let now = Instant::now();
            if now >= deadline {
                let waited = now - started;
                warn!(
                    "Gave up after {}s; still waiting on {}",
                    waited.as_secs(),
                    join_handles(&pending)
                );
                return Err(RunnerError::WaitTimeout {
                    handles: pending,
                    waited,
                });
            }

            let delay = self.policy.backoff.delay(attempt).min(deadline - now);
            debug!("Next poll in {:?}", delay);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(RunnerError::Cancelled { handles: handles.to_vec() })
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
