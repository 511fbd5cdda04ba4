use serde::{Deserialize, Serialize};

/// Outcome classification of a task, as reported to the scheduler.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    Terminated,
    /// The interpreter itself could not continue
    SystemError,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Terminated | TaskStatus::SystemError
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
            TaskStatus::Terminated => "terminated",
            TaskStatus::SystemError => "system_error",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exit status set by a handler or by the interpreter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExitStatus {
    pub status: TaskStatus,
    pub message: Option<String>,
}

impl ExitStatus {
    pub fn new(status: TaskStatus, message: Option<String>) -> Self {
        Self { status, message }
    }
}

/// What one `step()` tells the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepResult {
    /// Seconds to wait before the next step
    pub wait: u64,
    /// No further steps will do anything
    pub complete: bool,
    pub status: TaskStatus,
    pub message: Option<String>,
}

impl StepResult {
    pub fn running(wait: u64) -> Self {
        Self {
            wait,
            complete: false,
            status: TaskStatus::Running,
            message: None,
        }
    }

    pub fn completed(exit: &ExitStatus, wait: u64) -> Self {
        Self {
            wait,
            complete: true,
            status: exit.status,
            message: exit.message.clone(),
        }
    }
}
