//! Todo history model.
//!
//! # Responsibility
//! - Define append-only snapshots of prior todo states.
//!
//! # Invariants
//! - A history record is immutable once written.
//! - `todo_id` is a weak reference and may outlive the todo it names.

use crate::model::todo::{Todo, TodoId};
use serde::{Deserialize, Serialize};

/// Stable identifier of one history record.
pub type HistoryId = uuid::Uuid;

/// Which mutation produced a history record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryOperation {
    /// Field update; snapshot holds the state before the update.
    Modified,
    /// Soft delete; snapshot holds the state with the deleted markers set.
    Deleted,
}

impl HistoryOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "modified" => Some(Self::Modified),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// Archive request handed to the history log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub todo_id: TodoId,
    pub snapshot: Todo,
    pub operation: HistoryOperation,
}

impl HistoryEntry {
    pub fn modified(snapshot: Todo) -> Self {
        Self {
            todo_id: snapshot.id,
            snapshot,
            operation: HistoryOperation::Modified,
        }
    }

    pub fn deleted(snapshot: Todo) -> Self {
        Self {
            todo_id: snapshot.id,
            snapshot,
            operation: HistoryOperation::Deleted,
        }
    }
}

/// Persisted history record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoHistory {
    pub id: HistoryId,
    pub todo_id: TodoId,
    /// Full todo snapshot at archival time.
    pub data: Todo,
    pub operation: HistoryOperation,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}
