//! Todo domain model.
//!
//! # Responsibility
//! - Define the canonical current-state record held by the todo store.
//! - Provide lifecycle helpers for soft-delete, restore and field updates.
//!
//! # Invariants
//! - `id` is stable and never reused for another todo.
//! - `is_deleted == true` exactly when `deleted_at` is set.
//! - `version` only moves forward, by one per field update.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Stable identifier assigned by the store on create.
pub type TodoId = Uuid;

/// Canonical todo record.
///
/// Serialized with camelCase keys so history snapshots and API payloads keep
/// the `isDeleted` / `deletedAt` naming callers already rely on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: TodoId,
    pub title: String,
    /// Free-form status text, validated by the request boundary.
    pub status: String,
    /// Recycle-bin marker.
    pub is_deleted: bool,
    /// Unix epoch milliseconds. Set only while `is_deleted` is true.
    pub deleted_at: Option<i64>,
    /// Number of field updates applied since create.
    pub version: i64,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
}

/// Create input for a todo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTodo {
    pub title: String,
    pub status: String,
}

impl NewTodo {
    pub fn new(title: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            status: status.into(),
        }
    }
}

/// Allow-listed fields an update may overwrite.
///
/// `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoPatch {
    pub title: Option<String>,
    pub status: Option<String>,
}

impl TodoPatch {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Returns true when the patch carries no field changes.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.status.is_none()
    }
}

/// Validation errors for persisted or to-be-persisted todos.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TodoValidationError {
    BlankTitle,
    BlankStatus,
    NegativeVersion(i64),
    /// `version` is already at its maximum and cannot be bumped.
    VersionOverflow,
    /// `is_deleted` and `deleted_at` disagree.
    DeletedMarkerMismatch {
        is_deleted: bool,
        deleted_at: Option<i64>,
    },
}

impl Display for TodoValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankTitle => write!(f, "todo title must not be blank"),
            Self::BlankStatus => write!(f, "todo status must not be blank"),
            Self::NegativeVersion(version) => {
                write!(f, "todo version must be non-negative, got {version}")
            }
            Self::VersionOverflow => {
                write!(f, "todo version cannot be incremented past {}", i64::MAX)
            }
            Self::DeletedMarkerMismatch {
                is_deleted,
                deleted_at,
            } => write!(
                f,
                "todo is_deleted={is_deleted} does not match deleted_at={deleted_at:?}"
            ),
        }
    }
}

impl Error for TodoValidationError {}

impl Todo {
    /// Builds a fresh, active todo with a generated id.
    ///
    /// # Invariants
    /// - `is_deleted` starts as `false` and `deleted_at` as `None`.
    /// - `version` starts at `0`.
    pub fn new(input: NewTodo, now_ms: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: input.title,
            status: input.status,
            is_deleted: false,
            deleted_at: None,
            version: 0,
            created_at: now_ms,
            updated_at: now_ms,
        }
    }

    /// Checks the record-level invariants.
    pub fn validate(&self) -> Result<(), TodoValidationError> {
        if self.title.trim().is_empty() {
            return Err(TodoValidationError::BlankTitle);
        }
        if self.status.trim().is_empty() {
            return Err(TodoValidationError::BlankStatus);
        }
        if self.version < 0 {
            return Err(TodoValidationError::NegativeVersion(self.version));
        }
        if self.is_deleted != self.deleted_at.is_some() {
            return Err(TodoValidationError::DeletedMarkerMismatch {
                is_deleted: self.is_deleted,
                deleted_at: self.deleted_at,
            });
        }
        Ok(())
    }

    /// Moves this todo into the recycle bin.
    ///
    /// Calling it on an already deleted todo refreshes `deleted_at`.
    pub fn soft_delete(&mut self, now_ms: i64) {
        self.is_deleted = true;
        self.deleted_at = Some(now_ms);
    }

    /// Takes this todo out of the recycle bin.
    pub fn restore(&mut self) {
        self.is_deleted = false;
        self.deleted_at = None;
    }

    /// Applies a field update: merge, bump version, force active.
    ///
    /// `deleted_at` is cleared together with `is_deleted` so the deleted
    /// marker pair stays consistent after an override update.
    ///
    /// Leaves `self` untouched when the version cannot be bumped.
    pub fn apply_patch(&mut self, patch: &TodoPatch) -> Result<(), TodoValidationError> {
        let version = self
            .version
            .checked_add(1)
            .ok_or(TodoValidationError::VersionOverflow)?;
        if let Some(title) = patch.title.as_ref() {
            self.title = title.clone();
        }
        if let Some(status) = patch.status.as_ref() {
            self.status = status.clone();
        }
        self.version = version;
        self.is_deleted = false;
        self.deleted_at = None;
        Ok(())
    }

    /// Returns whether this todo is visible outside the recycle bin.
    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }
}

/// Current wall clock as Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
