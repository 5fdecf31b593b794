use crate::error::RunnerError;
use crate::task::DEFAULT_MAX_WAIT_SECS;
use crate::waiter::{Backoff, WaitPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
/// Loaded from ~/.config/taskrunner/ecs.yaml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Overrides the region resolved from the ambient AWS configuration.
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub waiter: WaiterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,
    #[serde(default)]
    pub cluster: Option<String>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            max_wait_secs: default_max_wait_secs(),
            cluster: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaiterConfig {
    #[serde(default = "default_min_delay_secs")]
    pub min_delay_secs: u64,
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
    #[serde(default = "default_retry_transient_errors")]
    pub retry_transient_errors: bool,
}

impl Default for WaiterConfig {
    fn default() -> Self {
        Self {
            min_delay_secs: default_min_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
            retry_transient_errors: default_retry_transient_errors(),
        }
    }
}

fn default_max_wait_secs() -> u64 {
    DEFAULT_MAX_WAIT_SECS
}

fn default_min_delay_secs() -> u64 {
    6
}

fn default_max_delay_secs() -> u64 {
    15
}

fn default_retry_transient_errors() -> bool {
    true
}

impl Config {
    /// Load config from the default path, or defaults if there is no file.
    pub fn load_default() -> Result<Self, RunnerError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, RunnerError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RunnerError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config: Config = serde_yaml::from_str(&contents)
            .map_err(|e| RunnerError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Default config file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/etc"))
            .join("taskrunner")
            .join("ecs.yaml")
    }

    pub fn validate(&self) -> Result<(), RunnerError> {
        if self.defaults.max_wait_secs == 0 {
            return Err(RunnerError::Config(
                "defaults.max_wait_secs must be greater than zero".into(),
            ));
        }
        if self.waiter.min_delay_secs == 0 {
            return Err(RunnerError::Config(
                "waiter.min_delay_secs must be greater than zero".into(),
            ));
        }
        if self.waiter.max_delay_secs < self.waiter.min_delay_secs {
            return Err(RunnerError::Config(
                "waiter.max_delay_secs must not be below waiter.min_delay_secs".into(),
            ));
        }
        Ok(())
    }

    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy {
            backoff: Backoff::new(
                Duration::from_secs(self.waiter.min_delay_secs),
                Duration::from_secs(self.waiter.max_delay_secs),
            ),
            retry_transient_errors: self.waiter.retry_transient_errors,
        }
    }

    pub fn default_max_wait(&self) -> Duration {
        Duration::from_secs(self.defaults.max_wait_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.region, None);
        assert_eq!(config.defaults.max_wait_secs, 300);
        assert_eq!(config.waiter.min_delay_secs, 6);
        assert_eq!(config.waiter.max_delay_secs, 15);
        assert!(config.waiter.retry_transient_errors);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let yaml = r#"
region: eu-west-1
defaults:
  cluster: arn:aws:ecs:eu-west-1:123456789012:cluster/prod
waiter:
  max_delay_secs: 30
  retry_transient_errors: false
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.defaults.max_wait_secs, 300);
        assert_eq!(config.waiter.min_delay_secs, 6);

        let policy = config.wait_policy();
        assert_eq!(policy.backoff.max_delay, Duration::from_secs(30));
        assert!(!policy.retry_transient_errors);
    }

    #[test]
    fn inverted_delays_are_rejected() {
        let mut config = Config::default();
        config.waiter.min_delay_secs = 20;
        config.waiter.max_delay_secs = 10;
        assert!(matches!(config.validate(), Err(RunnerError::Config(_))));
    }
}
