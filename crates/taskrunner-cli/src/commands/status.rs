use taskrunner_core::api::join_failures;
use taskrunner_core::{classify, Classification, Config, TaskHandle, TaskSnapshot};

use crate::dispatch;

pub async fn run(
    config: &Config,
    task: &str,
    cluster: &str,
    container: Option<&str>,
    json: bool,
) -> anyhow::Result<i32> {
    let handle = TaskHandle::new(task);
    let client = dispatch::create_client(config).await;
    let response = client
        .describe_tasks(cluster, std::slice::from_ref(&handle))
        .await?;

    let Some(snapshot) = response.tasks.iter().find(|t| t.handle.refers_to(&handle)) else {
        if response.failures.is_empty() {
            anyhow::bail!("task {} not found on {}", handle, cluster);
        }
        anyhow::bail!("task {} not found: {}", handle, join_failures(&response.failures));
    };
    let classification = container.map(|name| classify(snapshot, name));

    if json {
        let output = serde_json::json!({
            "task": snapshot,
            "classification": classification.as_ref().map(describe),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_snapshot(snapshot);
        if let Some(ref classification) = classification {
            println!("   Verdict:  {}", describe(classification));
        }
    }

    Ok(0)
}

fn describe(classification: &Classification) -> String {
    match classification {
        Classification::Retry => "in progress".to_string(),
        Classification::Success => "success".to_string(),
        Classification::Failure(cause) => format!("failure: {}", cause),
    }
}

fn print_snapshot(snapshot: &TaskSnapshot) {
    println!("Task:        {}", snapshot.handle);
    println!("   Status:   {}", snapshot.status);
    if let Some(ref code) = snapshot.stop_code {
        println!("   Stopped:  {}", code);
    }
    if let Some(ref reason) = snapshot.stopped_reason {
        println!("   Reason:   {}", reason);
    }
    for container in &snapshot.containers {
        let exit = container
            .exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".into());
        match container.reason {
            Some(ref reason) => println!("   {:<10}exit {} ({})", container.name, exit, reason),
            None => println!("   {:<10}exit {}", container.name, exit),
        }
    }
}
