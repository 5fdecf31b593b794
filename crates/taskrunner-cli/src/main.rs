use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod dispatch;

#[derive(Parser)]
#[command(name = "ecs-taskrunner")]
#[command(about = "Run ECS tasks to completion and report the result", long_about = None)]
struct Cli {
    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch a task and wait for it to finish
    Run(commands::run::RunArgs),

    /// Wait for already-launched tasks to finish
    Wait {
        /// Task ARNs or IDs
        #[arg(required = true)]
        tasks: Vec<String>,

        /// Cluster the tasks run on
        #[arg(long)]
        cluster: Option<String>,

        /// Container whose exit code decides the result
        #[arg(long)]
        container: String,

        /// Maximum time to wait, in seconds
        #[arg(long)]
        max_wait: Option<u64>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the current state of a task
    Status {
        /// Task ARN or ID
        task: String,

        /// Cluster the task runs on
        #[arg(long)]
        cluster: Option<String>,

        /// Also classify the task by this container's exit code
        #[arg(long)]
        container: Option<String>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show or initialize the config file
    Config {
        /// Print the config file path
        #[arg(long)]
        path: bool,

        /// Write a sample config file
        #[arg(long)]
        init: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,taskrunner_core={0},taskrunner_ecs={0},ecs_taskrunner={0}",
            default_level
        ))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(true),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    use Commands::*;

    let code = match cli.command {
        Run(args) => {
            let config = dispatch::load_config()?;
            commands::run::run(&config, args, dispatch::cancel_on_ctrl_c()).await?
        }
        Wait {
            tasks,
            cluster,
            container,
            max_wait,
            json,
        } => {
            let config = dispatch::load_config()?;
            let cluster = dispatch::resolve_cluster(&config, cluster)?;
            commands::wait::run(
                &config,
                tasks,
                &cluster,
                &container,
                max_wait,
                json,
                dispatch::cancel_on_ctrl_c(),
            )
            .await?
        }
        Status {
            task,
            cluster,
            container,
            json,
        } => {
            let config = dispatch::load_config()?;
            let cluster = dispatch::resolve_cluster(&config, cluster)?;
            commands::status::run(&config, &task, &cluster, container.as_deref(), json).await?
        }
        Config { path, init } => {
            commands::config::run(path, init).await?;
            0
        }
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
