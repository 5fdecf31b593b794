use std::path::PathBuf;

use clap::Args;
use taskrunner_core::{Config, RunReport, RunRequest, TaskRunner};
use tokio_util::sync::CancellationToken;

use crate::dispatch;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Request file (YAML or JSON); flags override its fields
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Task definition (family:revision or ARN)
    #[arg(long)]
    task_definition: Option<String>,

    /// Cluster to run on
    #[arg(long)]
    cluster: Option<String>,

    /// Container whose exit code decides the result
    #[arg(long)]
    container: Option<String>,

    /// Command to run instead of the image default (whitespace-separated)
    #[arg(long)]
    command: Option<String>,

    /// Maximum time to wait, in seconds
    #[arg(long)]
    max_wait: Option<u64>,

    /// Launch and return immediately
    #[arg(short, long)]
    detach: bool,

    /// Output as JSON
    #[arg(short, long)]
    json: bool,
}

impl RunArgs {
    fn into_request(self, config: &Config) -> anyhow::Result<RunRequest> {
        let base = match &self.file {
            Some(path) => Some(RunRequest::load_from(path)?),
            None => None,
        };

        let task_definition = self
            .task_definition
            .or_else(|| base.as_ref().map(|r| r.task_definition.clone()))
            .ok_or_else(|| anyhow::anyhow!("--task-definition is required"))?;
        let cluster = match self.cluster {
            Some(cluster) => cluster,
            None => match &base {
                Some(r) => r.ecs_cluster_arn.clone(),
                None => dispatch::resolve_cluster(config, None)?,
            },
        };
        let container = self
            .container
            .or_else(|| base.as_ref().map(|r| r.container.clone()))
            .ok_or_else(|| anyhow::anyhow!("--container is required"))?;

        Ok(RunRequest {
            task_definition,
            ecs_cluster_arn: cluster,
            container,
            command: self
                .command
                .or_else(|| base.as_ref().and_then(|r| r.command.clone())),
            max_wait_time: self
                .max_wait
                .or_else(|| base.as_ref().and_then(|r| r.max_wait_time))
                .or(Some(config.defaults.max_wait_secs)),
            wait_until_completed: !self.detach
                && base.as_ref().map_or(true, |r| r.wait_until_completed),
        })
    }
}

pub async fn run(config: &Config, args: RunArgs, cancel: CancellationToken) -> anyhow::Result<i32> {
    let json = args.json;
    let request = args.into_request(config)?;

    let runner = TaskRunner::new(dispatch::create_client(config).await, config.wait_policy());
    match runner.run(&request, &cancel).await {
        Ok(report) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&report.to_json())?);
            } else {
                print_report(&report);
            }
            Ok(0)
        }
        Err(err) => {
            super::print_diagnostic(&err.diagnostic(), json)?;
            Ok(err.exit_code())
        }
    }
}

fn print_report(report: &RunReport) {
    match report.outcome {
        Some(_) => println!("Task completed:"),
        None => println!("Task started:"),
    }
    for handle in &report.handles {
        println!("  Task:       {}", handle);
    }
    println!("  Definition: {}", report.request.task_definition);
    println!("  Cluster:    {}", report.request.ecs_cluster_arn);
    println!("  Container:  {}", report.request.container);
    if let Some(ref command) = report.request.command {
        println!("  Command:    {}", command);
    }
    match report.outcome {
        Some(outcome) => {
            println!("  Outcome:    {}", outcome);
            println!(
                "  Duration:   {}s",
                (report.finished_at - report.started_at).num_seconds()
            );
        }
        None => println!("  Outcome:    not waited for"),
    }
}
