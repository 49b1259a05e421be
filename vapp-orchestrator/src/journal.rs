//! Per-run record of every control-plane step.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub id: String,
    /// Name of the vApp, VM or `vm/key` the step acted on.
    pub target: String,
    pub operation_type: OperationType,
    pub status: OperationStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    InstantiateVapp,
    CreateVm,
    UpdateCompute,
    AddDisk,
    UpdateNetwork,
    SetStorageProfile,
    AddMetadata,
    SetGuestCustomization,
    PowerOn,
    PowerOff,
    DeleteVapp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Pending,
    Running,
    Success,
    Failed,
}

/// Append-only list of operations. Clones share the same list.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<Operation>>>,
}

/// Position of an entry, handed back by [`Journal::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryId(usize);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Operation>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn start(&self, operation_type: OperationType, target: &str) -> EntryId {
        let mut entries = self.lock();
        entries.push(Operation {
            id: Uuid::new_v4().to_string(),
            target: target.to_string(),
            operation_type,
            status: OperationStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            error: None,
        });
        EntryId(entries.len() - 1)
    }

    /// The request was accepted and its task is being awaited.
    pub fn running(&self, id: EntryId) {
        if let Some(entry) = self.lock().get_mut(id.0) {
            entry.status = OperationStatus::Running;
        }
    }

    pub fn finish<T, E: std::fmt::Display>(&self, id: EntryId, result: &Result<T, E>) {
        if let Some(entry) = self.lock().get_mut(id.0) {
            entry.completed_at = Some(Utc::now());
            match result {
                Ok(_) => entry.status = OperationStatus::Success,
                Err(err) => {
                    entry.status = OperationStatus::Failed;
                    entry.error = Some(err.to_string());
                }
            }
        }
    }

    pub fn entries(&self) -> Vec<Operation> {
        self.lock().clone()
    }

    pub fn count(&self, operation_type: OperationType) -> usize {
        self.lock()
            .iter()
            .filter(|op| op.operation_type == operation_type)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_move_through_their_lifecycle() {
        let journal = Journal::new();
        let first = journal.start(OperationType::InstantiateVapp, "web");
        journal.running(first);
        journal.finish::<(), String>(first, &Ok(()));

        let second = journal.start(OperationType::AddDisk, "web");
        journal.finish::<(), String>(second, &Err("rejected".to_string()));

        let entries = journal.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status, OperationStatus::Success);
        assert!(entries[0].completed_at.is_some());
        assert_eq!(entries[1].status, OperationStatus::Failed);
        assert_eq!(entries[1].error.as_deref(), Some("rejected"));
        assert_eq!(journal.count(OperationType::AddDisk), 1);
    }

    #[test]
    fn serializes_with_snake_case_types() {
        let journal = Journal::new();
        journal.start(OperationType::SetGuestCustomization, "web");
        let json = serde_json::to_value(journal.entries()).unwrap();
        assert_eq!(json[0]["operation_type"], "set_guest_customization");
        assert_eq!(json[0]["status"], "pending");
        assert!(json[0].get("completed_at").is_none());
    }
}
