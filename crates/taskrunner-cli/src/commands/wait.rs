use std::time::Duration;

use taskrunner_core::{Config, Outcome, TaskHandle, Verdict, Waiter};
use tokio_util::sync::CancellationToken;

use crate::dispatch;

/// Handles in the order given, repeats dropped.
fn task_handles(tasks: Vec<String>) -> Vec<TaskHandle> {
    let mut handles: Vec<TaskHandle> = Vec::with_capacity(tasks.len());
    for task in tasks {
        let handle = TaskHandle::new(task);
        if !handles.contains(&handle) {
            handles.push(handle);
        }
    }
    handles
}

pub async fn run(
    config: &Config,
    tasks: Vec<String>,
    cluster: &str,
    container: &str,
    max_wait: Option<u64>,
    json: bool,
    cancel: CancellationToken,
) -> anyhow::Result<i32> {
    let handles = task_handles(tasks);
    let max_wait = max_wait
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.default_max_wait());
    if max_wait.is_zero() {
        anyhow::bail!("--max-wait must be greater than zero");
    }

    let waiter = Waiter::new(dispatch::create_client(config).await, config.wait_policy());
    let result = waiter
        .wait(&handles, cluster, container, max_wait, &cancel)
        .await
        .and_then(Verdict::into_result);

    match result {
        Ok(()) => {
            if json {
                let output = serde_json::json!({
                    "outcome": Outcome::Success,
                    "tasks": handles,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                for handle in &handles {
                    println!("Task {} completed successfully.", handle);
                }
            }
            Ok(0)
        }
        Err(err) => {
            super::print_diagnostic(&err.diagnostic(), json)?;
            Ok(err.exit_code())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_tasks_are_waited_on_once() {
        let handles = task_handles(vec![
            "task-b".to_string(),
            "task-a".to_string(),
            "task-b".to_string(),
        ]);
        assert_eq!(handles, vec![TaskHandle::new("task-b"), TaskHandle::new("task-a")]);
    }
}
