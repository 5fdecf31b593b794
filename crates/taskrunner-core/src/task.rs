use crate::error::RunnerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Default upper bound on how long a run waits for its task to stop.
pub const DEFAULT_MAX_WAIT_SECS: u64 = 300;

/// Identifier (task ARN) of one launched task instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct TaskHandle(pub String);

impl TaskHandle {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if `other` names the same task. A bare task id matches the ARN
    /// ending in `/<id>`.
    pub fn refers_to(&self, other: &TaskHandle) -> bool {
        let (a, b) = (self.as_str(), other.as_str());
        a == b
            || a.strip_suffix(b).is_some_and(|rest| rest.ends_with('/'))
            || b.strip_suffix(a).is_some_and(|rest| rest.ends_with('/'))
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Join handles for error messages: "a, b, c".
pub fn join_handles(handles: &[TaskHandle]) -> String {
    handles
        .iter()
        .map(|h| h.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A validated request to run one task to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub definition_id: String,
    pub cluster_id: String,
    pub container_name: String,
    pub command: Option<Vec<String>>,
    pub max_wait: Duration,
}

impl TaskSpec {
    pub fn new(
        definition_id: impl Into<String>,
        cluster_id: impl Into<String>,
        container_name: impl Into<String>,
    ) -> Self {
        Self {
            definition_id: definition_id.into(),
            cluster_id: cluster_id.into(),
            container_name: container_name.into(),
            command: None,
            max_wait: Duration::from_secs(DEFAULT_MAX_WAIT_SECS),
        }
    }

    /// Set the command override from a whitespace-delimited string.
    /// A blank string clears the override.
    pub fn with_command_line(mut self, line: &str) -> Self {
        self.command = parse_command(line);
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn validate(&self) -> Result<(), RunnerError> {
        if self.definition_id.trim().is_empty() {
            return Err(RunnerError::InvalidSpec(
                "task definition must not be empty".into(),
            ));
        }
        if self.cluster_id.trim().is_empty() {
            return Err(RunnerError::InvalidSpec("cluster must not be empty".into()));
        }
        if self.command.is_some() && self.container_name.trim().is_empty() {
            return Err(RunnerError::InvalidSpec(
                "a command override requires a container name".into(),
            ));
        }
        if self.max_wait.is_zero() {
            return Err(RunnerError::InvalidSpec(
                "max wait time must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Split a command line on whitespace. Blank input means "no override".
pub fn parse_command(line: &str) -> Option<Vec<String>> {
    let tokens: Vec<String> = line.split_whitespace().map(str::to_string).collect();
    if tokens.is_empty() {
        None
    } else {
        Some(tokens)
    }
}

fn default_wait_until_completed() -> bool {
    true
}

/// The inbound request shape, as read from a request file or assembled from
/// CLI flags. Echoed back in the run report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunRequest {
    pub task_definition: String,
    pub ecs_cluster_arn: String,
    pub container: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_wait_time: Option<u64>,
    #[serde(default = "default_wait_until_completed")]
    pub wait_until_completed: bool,
}

impl RunRequest {
    /// Load a request from a YAML or JSON file (chosen by extension).
    pub fn load_from(path: &Path) -> Result<Self, RunnerError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            RunnerError::InvalidSpec(format!("cannot read {}: {}", path.display(), e))
        })?;
        let is_json = path.extension().is_some_and(|ext| ext == "json");
        let request = if is_json {
            serde_json::from_str(&contents).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_str(&contents).map_err(|e| e.to_string())
        };
        request.map_err(|e| RunnerError::InvalidSpec(format!("{}: {}", path.display(), e)))
    }

    pub fn into_spec(&self) -> Result<TaskSpec, RunnerError> {
        if self.container.trim().is_empty() {
            return Err(RunnerError::InvalidSpec(
                "container must not be empty".into(),
            ));
        }
        let spec = TaskSpec::new(
            self.task_definition.clone(),
            self.ecs_cluster_arn.clone(),
            self.container.clone(),
        )
        .with_command_line(self.command.as_deref().unwrap_or(""))
        .with_max_wait(Duration::from_secs(
            self.max_wait_time.unwrap_or(DEFAULT_MAX_WAIT_SECS),
        ));
        spec.validate()?;
        Ok(spec)
    }
}

/// Lifecycle state reported for a task (`lastStatus`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Provisioning,
    Pending,
    Activating,
    Running,
    Deactivating,
    Stopping,
    Deprovisioning,
    Stopped,
    #[serde(untagged)]
    Other(String),
}

impl TaskStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "PROVISIONING" => TaskStatus::Provisioning,
            "PENDING" => TaskStatus::Pending,
            "ACTIVATING" => TaskStatus::Activating,
            "RUNNING" => TaskStatus::Running,
            "DEACTIVATING" => TaskStatus::Deactivating,
            "STOPPING" => TaskStatus::Stopping,
            "DEPROVISIONING" => TaskStatus::Deprovisioning,
            "STOPPED" => TaskStatus::Stopped,
            other => TaskStatus::Other(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Stopped)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Provisioning => write!(f, "PROVISIONING"),
            TaskStatus::Pending => write!(f, "PENDING"),
            TaskStatus::Activating => write!(f, "ACTIVATING"),
            TaskStatus::Running => write!(f, "RUNNING"),
            TaskStatus::Deactivating => write!(f, "DEACTIVATING"),
            TaskStatus::Stopping => write!(f, "STOPPING"),
            TaskStatus::Deprovisioning => write!(f, "DEPROVISIONING"),
            TaskStatus::Stopped => write!(f, "STOPPED"),
            TaskStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Why a stopped task stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopCode {
    EssentialContainerExited,
    TaskFailedToStart,
    UserInitiated,
    ServiceSchedulerInitiated,
    SpotInterruption,
    TerminationNotice,
    #[serde(untagged)]
    Other(String),
}

impl StopCode {
    pub fn parse(s: &str) -> Self {
        match s {
            "EssentialContainerExited" => StopCode::EssentialContainerExited,
            "TaskFailedToStart" => StopCode::TaskFailedToStart,
            "UserInitiated" => StopCode::UserInitiated,
            "ServiceSchedulerInitiated" => StopCode::ServiceSchedulerInitiated,
            "SpotInterruption" => StopCode::SpotInterruption,
            "TerminationNotice" => StopCode::TerminationNotice,
            other => StopCode::Other(other.to_string()),
        }
    }

    /// Only an essential container exiting counts as a normal stop.
    pub fn is_normal_exit(&self) -> bool {
        matches!(self, StopCode::EssentialContainerExited)
    }
}

impl fmt::Display for StopCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopCode::EssentialContainerExited => write!(f, "EssentialContainerExited"),
            StopCode::TaskFailedToStart => write!(f, "TaskFailedToStart"),
            StopCode::UserInitiated => write!(f, "UserInitiated"),
            StopCode::ServiceSchedulerInitiated => write!(f, "ServiceSchedulerInitiated"),
            StopCode::SpotInterruption => write!(f, "SpotInterruption"),
            StopCode::TerminationNotice => write!(f, "TerminationNotice"),
            StopCode::Other(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerState {
    pub name: String,
    pub exit_code: Option<i32>,
    pub reason: Option<String>,
}

impl ContainerState {
    pub fn exited(name: impl Into<String>, exit_code: i32) -> Self {
        Self {
            name: name.into(),
            exit_code: Some(exit_code),
            reason: None,
        }
    }
}

/// One task record from a status query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub handle: TaskHandle,
    pub status: TaskStatus,
    pub stop_code: Option<StopCode>,
    pub stopped_reason: Option<String>,
    pub containers: Vec<ContainerState>,
}

impl TaskSnapshot {
    pub fn new(handle: TaskHandle, status: TaskStatus) -> Self {
        Self {
            handle,
            status,
            stop_code: None,
            stopped_reason: None,
            containers: Vec::new(),
        }
    }

    pub fn stopped(handle: TaskHandle, stop_code: StopCode) -> Self {
        Self {
            stop_code: Some(stop_code),
            ..Self::new(handle, TaskStatus::Stopped)
        }
    }

    pub fn with_container(mut self, container: ContainerState) -> Self {
        self.containers.push(container);
        self
    }

    pub fn with_stopped_reason(mut self, reason: impl Into<String>) -> Self {
        self.stopped_reason = Some(reason.into());
        self
    }

    pub fn container(&self, name: &str) -> Option<&ContainerState> {
        self.containers.iter().find(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RunRequest {
        RunRequest {
            task_definition: "app:3".into(),
            ecs_cluster_arn: "arn:aws:ecs:eu-west-1:123456789012:cluster/prod".into(),
            container: "worker".into(),
            command: None,
            max_wait_time: None,
            wait_until_completed: true,
        }
    }

    #[test]
    fn blank_command_means_no_override() {
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("   \t "), None);
        assert_eq!(
            parse_command(" echo  hello\tworld "),
            Some(vec!["echo".into(), "hello".into(), "world".into()])
        );
    }

    #[test]
    fn request_defaults_max_wait_to_five_minutes() {
        let spec = request().into_spec().unwrap();
        assert_eq!(spec.max_wait, Duration::from_secs(300));
        assert_eq!(spec.command, None);
    }

    #[test]
    fn request_rejects_missing_fields() {
        let mut req = request();
        req.task_definition = " ".into();
        assert!(matches!(req.into_spec(), Err(RunnerError::InvalidSpec(_))));

        let mut req = request();
        req.ecs_cluster_arn = String::new();
        assert!(matches!(req.into_spec(), Err(RunnerError::InvalidSpec(_))));

        let mut req = request();
        req.container = String::new();
        assert!(matches!(req.into_spec(), Err(RunnerError::InvalidSpec(_))));

        let mut req = request();
        req.max_wait_time = Some(0);
        assert!(matches!(req.into_spec(), Err(RunnerError::InvalidSpec(_))));
    }

    #[test]
    fn request_parses_from_yaml_with_defaults() {
        let yaml = r#"
task_definition: app:3
ecs_cluster_arn: arn:aws:ecs:eu-west-1:123456789012:cluster/prod
container: worker
command: echo hello world
"#;
        let req: RunRequest = serde_yaml::from_str(yaml).unwrap();
        assert!(req.wait_until_completed);
        assert_eq!(req.max_wait_time, None);
        let spec = req.into_spec().unwrap();
        assert_eq!(
            spec.command,
            Some(vec!["echo".into(), "hello".into(), "world".into()])
        );
    }

    #[test]
    fn task_id_matches_its_arn() {
        let arn = TaskHandle::new("arn:aws:ecs:eu-west-1:123456789012:task/prod/0f9a2c");
        assert!(arn.refers_to(&TaskHandle::new("0f9a2c")));
        assert!(TaskHandle::new("0f9a2c").refers_to(&arn));
        assert!(arn.refers_to(&arn.clone()));
        assert!(!arn.refers_to(&TaskHandle::new("9a2c")));
    }

    #[test]
    fn unknown_status_and_stop_code_are_kept_verbatim() {
        assert_eq!(TaskStatus::parse("PENDING"), TaskStatus::Pending);
        assert_eq!(
            TaskStatus::parse("HIBERNATING"),
            TaskStatus::Other("HIBERNATING".into())
        );
        assert!(TaskStatus::parse("STOPPED").is_terminal());
        assert!(!TaskStatus::parse("STOPPING").is_terminal());
        assert_eq!(StopCode::parse("UserInitiated").to_string(), "UserInitiated");
        assert!(!StopCode::parse("Brand new code").is_normal_exit());
    }
}
