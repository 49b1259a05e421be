use serde::{Deserialize, Serialize};

/// Reference to a long-running control-plane operation.
///
/// Handed out by every mutating call. It is deliberately not `Clone`: a
/// handle is awaited once and then dropped.
#[derive(Debug, PartialEq, Eq)]
pub struct TaskHandle {
    id: String,
    operation: String,
    target: String,
}

impl TaskHandle {
    pub fn new(
        id: impl Into<String>,
        operation: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            operation: operation.into(),
            target: target.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// What was requested, e.g. `updateHardwareSection`.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Identifier of the resource the task acts on.
    pub fn target(&self) -> &str {
        &self.target
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub major_code: u16,
    pub minor_code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Queued,
    Running { progress: Option<u8> },
    Success,
    Error(TaskFailure),
    Aborted,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Success | TaskStatus::Error(_) | TaskStatus::Aborted
        )
    }
}

/// A mutating call that was accepted: the resource it will produce and the
/// task to await before the resource is usable.
#[derive(Debug)]
pub struct Accepted<T> {
    pub resource: T,
    pub task: TaskHandle,
}
