pub mod api;
pub mod config;
pub mod error;
pub mod launcher;
pub mod runner;
pub mod task;
pub mod verdict;
pub mod waiter;

pub use api::{ApiError, TaskApi};
pub use config::Config;
pub use error::{Diagnostic, RunnerError};
pub use launcher::Launcher;
pub use runner::{RunReport, TaskRunner};
pub use task::{RunRequest, TaskHandle, TaskSnapshot, TaskSpec, TaskStatus};
pub use verdict::{classify, Classification, Outcome, Verdict};
pub use waiter::{Backoff, WaitPolicy, Waiter};
