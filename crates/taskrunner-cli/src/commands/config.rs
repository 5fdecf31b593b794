use std::path::Path;

use taskrunner_core::Config;

const SAMPLE_CONFIG: &str = r#"# ecs-taskrunner configuration
# AWS credentials and region come from the usual AWS environment/config files.

# region: eu-west-1

defaults:
  max_wait_secs: 300
  # cluster: arn:aws:ecs:eu-west-1:123456789012:cluster/prod

waiter:
  min_delay_secs: 6
  max_delay_secs: 15
  retry_transient_errors: true
"#;

/// Write the sample config, refusing to replace an existing file.
fn write_sample(config_path: &Path) -> anyhow::Result<()> {
    anyhow::ensure!(
        !config_path.exists(),
        "{} already exists; edit it in place or delete it before --init",
        config_path.display()
    );
    if let Some(dir) = config_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(config_path, SAMPLE_CONFIG)?;
    Ok(())
}

pub async fn run(path: bool, init: bool) -> anyhow::Result<()> {
    let config_path = Config::default_path();
    if path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        write_sample(&config_path)?;
        println!("Wrote sample runner config to {}", config_path.display());
        println!("Set defaults.cluster there to omit --cluster on every run.");
        return Ok(());
    }

    println!("Config path: {}", config_path.display());
    if config_path.exists() {
        let config = Config::load_from(&config_path)?;
        println!("Region:      {}", config.region.as_deref().unwrap_or("(ambient)"));
        println!("Cluster:     {}", config.defaults.cluster.as_deref().unwrap_or("-"));
        println!("Max wait:    {}s", config.defaults.max_wait_secs);
        println!(
            "Poll delay:  {}s..{}s (retry transient errors: {})",
            config.waiter.min_delay_secs,
            config.waiter.max_delay_secs,
            config.waiter.retry_transient_errors
        );
    } else {
        println!("Status:      not found (using defaults)");
        println!("Run `ecs-taskrunner config --init` to create one.");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_config_parses() {
        let config: Config = serde_yaml::from_str(SAMPLE_CONFIG).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.defaults.max_wait_secs, 300);
    }

    #[test]
    fn init_writes_once_and_never_overwrites() {
        let dir = std::env::temp_dir().join(format!("ecs-taskrunner-init-{}", std::process::id()));
        let config_path = dir.join("taskrunner").join("ecs.yaml");
        let _ = std::fs::remove_dir_all(&dir);

        write_sample(&config_path).unwrap();
        assert!(Config::load_from(&config_path).is_ok());

        std::fs::write(&config_path, "region: us-east-1\n").unwrap();
        let err = write_sample(&config_path).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(
            std::fs::read_to_string(&config_path).unwrap(),
            "region: us-east-1\n"
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
