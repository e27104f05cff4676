//! Todo use-case service.
//!
//! # Responsibility
//! - Own the read -> decide -> archive -> commit flow for every todo request.
//! - Group the history append and the record write into one store
//!   transaction.
//! - Translate repository failures into `NotFound` / `Forbidden` /
//!   persistence errors carrying operation and id context.
//!
//! # Invariants
//! - Create and restore never write history.
//! - Update archives the pre-update record as `modified`; soft delete archives
//!   the record with its deleted markers already set as `deleted`.
//! - Update bumps `version` by exactly one; soft delete and restore leave it.
//! - An update refused with `Forbidden` leaves the stored record untouched.
//! - Hard delete-all bypasses history entirely.

use crate::model::history::HistoryEntry;
use crate::model::todo::{now_epoch_ms, NewTodo, Todo, TodoId, TodoPatch};
use crate::repo::history_repo::{HistoryRepository, SqliteHistoryRepository};
use crate::repo::todo_repo::{DeletedFilter, SqliteTodoRepository, TodoRepository};
use crate::repo::{RepoError, RepoResult};
use rusqlite::Connection;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, TodoServiceError>;

/// Use-case operations, used for error context and log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TodoOperation {
    Create,
    FindActive,
    FindDeleted,
    FindById,
    FindDeletedById,
    Update,
    SoftDelete,
    Restore,
    DeleteAllHard,
}

impl TodoOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "todo_create",
            Self::FindActive => "todo_find_active",
            Self::FindDeleted => "todo_find_deleted",
            Self::FindById => "todo_find_by_id",
            Self::FindDeletedById => "todo_find_deleted_by_id",
            Self::Update => "todo_update",
            Self::SoftDelete => "todo_soft_delete",
            Self::Restore => "todo_restore",
            Self::DeleteAllHard => "todo_delete_all_hard",
        }
    }
}

/// Which lookup missed, so messages match the caller's view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundContext {
    /// Active (or include-deleted) lookup by id.
    Lookup(TodoId),
    /// Target of a mutation does not exist.
    Target(TodoId),
    /// Id is absent from the recycle bin.
    RecycleBinItem(TodoId),
    /// Recycle bin has no entries at all.
    RecycleBinEmpty,
}

/// Coarse error class exposed to the request boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    Persistence,
}

/// Errors from todo use-case operations.
#[derive(Debug)]
pub enum TodoServiceError {
    NotFound(NotFoundContext),
    /// Update targeted a soft-deleted todo without the override flag.
    Forbidden(TodoId),
    /// Underlying store read/write failed.
    Persistence {
        operation: TodoOperation,
        todo_id: Option<TodoId>,
        source: RepoError,
    },
    /// Write succeeded but the read-back disagreed.
    InconsistentState(&'static str),
}

impl TodoServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Persistence { .. } | Self::InconsistentState(_) => ErrorKind::Persistence,
        }
    }

    fn persistence(operation: TodoOperation, todo_id: Option<TodoId>, source: RepoError) -> Self {
        match source {
            // The row vanished between load and write.
            RepoError::NotFound(id) => Self::NotFound(NotFoundContext::Target(id)),
            source => Self::Persistence {
                operation,
                todo_id,
                source,
            },
        }
    }
}

impl Display for TodoServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(NotFoundContext::Lookup(id)) => {
                write!(f, "Not found Todo with id {id}")
            }
            Self::NotFound(NotFoundContext::Target(id)) => {
                write!(f, "Todo with id {id} not found.")
            }
            Self::NotFound(NotFoundContext::RecycleBinItem(id)) => {
                write!(f, "Todo with id {id} not found in recycle bin.")
            }
            Self::NotFound(NotFoundContext::RecycleBinEmpty) => {
                write!(f, "No items found in recycle bin.")
            }
            Self::Forbidden(id) => write!(
                f,
                "Todo with id={id} is deleted. Pass overrideDeleted=true to modify it."
            ),
            Self::Persistence {
                operation,
                todo_id,
                source,
            } => match (operation, todo_id) {
                (TodoOperation::Create, _) => {
                    write!(f, "Some error occurred while creating the Todo: {source}")
                }
                (TodoOperation::DeleteAllHard, _) => {
                    write!(f, "Some error occurred while removing all Todos: {source}")
                }
                (TodoOperation::FindActive, _) => write!(f, "Error retrieving todos: {source}"),
                (TodoOperation::FindDeleted, _) => {
                    write!(f, "Error retrieving items from recycle bin: {source}")
                }
                (TodoOperation::Update, Some(id)) => {
                    write!(f, "Error updating Todo with id={id}: {source}")
                }
                (TodoOperation::SoftDelete, Some(id)) => write!(
                    f,
                    "Error moving Todo with id={id} to recycle bin: {source}"
                ),
                (TodoOperation::Restore, Some(id)) => {
                    write!(f, "Error restoring Todo with id={id}: {source}")
                }
                (_, Some(id)) => write!(f, "Error retrieving Todo with id={id}: {source}"),
                (other, None) => write!(f, "{} failed: {source}", other.as_str()),
            },
            Self::InconsistentState(details) => write!(f, "inconsistent todo state: {details}"),
        }
    }
}

impl Error for TodoServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Persistence { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Todo service facade over repository implementations.
pub struct TodoService<R: TodoRepository, H: HistoryRepository> {
    repo: R,
    history: H,
}

/// Service wired to the SQLite repositories of one connection.
pub type SqliteTodoService<'conn> =
    TodoService<SqliteTodoRepository<'conn>, SqliteHistoryRepository<'conn>>;

impl<'conn> TodoService<SqliteTodoRepository<'conn>, SqliteHistoryRepository<'conn>> {
    /// Builds both repositories over `conn`, checking its schema.
    pub fn try_from_connection(conn: &'conn Connection) -> RepoResult<Self> {
        Ok(Self::new(
            SqliteTodoRepository::try_new(conn)?,
            SqliteHistoryRepository::try_new(conn)?,
        ))
    }
}

impl<R: TodoRepository, H: HistoryRepository> TodoService<R, H> {
    /// Creates a service over a todo store and a history log.
    ///
    /// Both must write through the same connection so that
    /// `TodoRepository::in_transaction` covers the history append.
    pub fn new(repo: R, history: H) -> Self {
        Self { repo, history }
    }

    /// Creates an active todo at version 0 and returns the stored record.
    pub fn create_todo(&self, input: NewTodo) -> ServiceResult<Todo> {
        let op = TodoOperation::Create;
        let todo = Todo::new(input, now_epoch_ms());
        let id = self
            .repo
            .create_todo(&todo)
            .map_err(|err| self.fail(op, None, err))?;

        let created = self.reload(op, id, "created todo not found in read-back")?;
        info!("event={} module=service status=ok todo_id={id}", op.as_str());
        Ok(created)
    }

    /// Lists todos outside the recycle bin. Empty is not an error.
    pub fn find_active(&self) -> ServiceResult<Vec<Todo>> {
        self.repo
            .list_todos(DeletedFilter::Active)
            .map_err(|err| self.fail(TodoOperation::FindActive, None, err))
    }

    /// Lists the recycle bin.
    ///
    /// Fails with `NotFound` when the bin is empty, unlike `find_active`.
    pub fn find_deleted(&self) -> ServiceResult<Vec<Todo>> {
        let todos = self
            .repo
            .list_todos(DeletedFilter::Deleted)
            .map_err(|err| self.fail(TodoOperation::FindDeleted, None, err))?;
        if todos.is_empty() {
            return Err(TodoServiceError::NotFound(NotFoundContext::RecycleBinEmpty));
        }
        Ok(todos)
    }

    /// Gets one todo; soft-deleted todos are visible only with `include_deleted`.
    pub fn find_by_id(&self, id: TodoId, include_deleted: bool) -> ServiceResult<Todo> {
        let filter = if include_deleted {
            DeletedFilter::Any
        } else {
            DeletedFilter::Active
        };
        self.repo
            .get_todo(id, filter)
            .map_err(|err| self.fail(TodoOperation::FindById, Some(id), err))?
            .ok_or(TodoServiceError::NotFound(NotFoundContext::Lookup(id)))
    }

    /// Gets one todo from the recycle bin.
    pub fn find_deleted_by_id(&self, id: TodoId) -> ServiceResult<Todo> {
        self.repo
            .get_todo(id, DeletedFilter::Deleted)
            .map_err(|err| self.fail(TodoOperation::FindDeletedById, Some(id), err))?
            .ok_or(TodoServiceError::NotFound(NotFoundContext::RecycleBinItem(id)))
    }

    /// Applies `patch` to a todo, archiving its previous state.
    ///
    /// # Contract
    /// - Soft-deleted todos require `override_deleted`, else `Forbidden`.
    /// - The archived snapshot is the record exactly as loaded.
    /// - The result is active, with `version` one higher than before.
    pub fn update_todo(
        &self,
        id: TodoId,
        patch: &TodoPatch,
        override_deleted: bool,
    ) -> ServiceResult<Todo> {
        let op = TodoOperation::Update;
        let mut todo = self.load_target(op, id)?;

        if todo.is_deleted && !override_deleted {
            warn!(
                "event={} module=service status=rejected todo_id={id} reason=deleted_without_override",
                op.as_str()
            );
            return Err(TodoServiceError::Forbidden(id));
        }

        let entry = HistoryEntry::modified(todo.clone());
        todo.apply_patch(patch).map_err(|err| self.fail(op, Some(id), err.into()))?;
        todo.updated_at = now_epoch_ms();

        self.archive_and_save(&todo, &entry).map_err(|err| self.fail(op, Some(id), err))?;

        let updated = self.reload(op, id, "updated todo not found in read-back")?;
        info!(
            "event={} module=service status=ok todo_id={id} version={} override_deleted={override_deleted}",
            op.as_str(),
            updated.version
        );
        Ok(updated)
    }

    /// Moves a todo into the recycle bin and archives it as `deleted`.
    ///
    /// Already deleted todos are accepted; their `deleted_at` is refreshed.
    pub fn soft_delete_todo(&self, id: TodoId) -> ServiceResult<Todo> {
        let op = TodoOperation::SoftDelete;
        let mut todo = self.load_target(op, id)?;

        let now = now_epoch_ms();
        todo.soft_delete(now);
        let entry = HistoryEntry::deleted(todo.clone());
        todo.updated_at = now;

        self.archive_and_save(&todo, &entry).map_err(|err| self.fail(op, Some(id), err))?;

        let deleted = self.reload(op, id, "deleted todo not found in read-back")?;
        info!("event={} module=service status=ok todo_id={id}", op.as_str());
        Ok(deleted)
    }

    /// Takes a todo out of the recycle bin. No history is written.
    ///
    /// Fails with `NotFound` when the todo is missing or not deleted.
    pub fn restore_todo(&self, id: TodoId) -> ServiceResult<Todo> {
        let op = TodoOperation::Restore;
        let mut todo = self
            .repo
            .get_todo(id, DeletedFilter::Any)
            .map_err(|err| self.fail(op, Some(id), err))?
            .filter(|todo| todo.is_deleted)
            .ok_or(TodoServiceError::NotFound(NotFoundContext::RecycleBinItem(id)))?;

        todo.restore();
        todo.updated_at = now_epoch_ms();
        self.repo
            .save_todo(&todo)
            .map_err(|err| self.fail(op, Some(id), err))?;

        let restored = self.reload(op, id, "restored todo not found in read-back")?;
        info!("event={} module=service status=ok todo_id={id}", op.as_str());
        Ok(restored)
    }

    /// Permanently removes every todo, active or deleted.
    ///
    /// Administrative operation: no confirmation, no history, history rows
    /// referencing the removed todos are left as they are.
    pub fn delete_all_hard(&self) -> ServiceResult<usize> {
        let op = TodoOperation::DeleteAllHard;
        let removed = self
            .repo
            .delete_all_todos()
            .map_err(|err| self.fail(op, None, err))?;
        warn!("event={} module=service status=ok removed={removed}", op.as_str());
        Ok(removed)
    }

    /// Appends `entry`, then writes `todo`, as one transaction.
    fn archive_and_save(&self, todo: &Todo, entry: &HistoryEntry) -> RepoResult<()> {
        todo.validate()?;
        self.repo.in_transaction(&mut || {
            self.history.append_history(entry)?;
            self.repo.save_todo(todo)
        })
    }

    fn load_target(&self, op: TodoOperation, id: TodoId) -> ServiceResult<Todo> {
        self.repo
            .get_todo(id, DeletedFilter::Any)
            .map_err(|err| self.fail(op, Some(id), err))?
            .ok_or(TodoServiceError::NotFound(NotFoundContext::Target(id)))
    }

    fn reload(&self, op: TodoOperation, id: TodoId, details: &'static str) -> ServiceResult<Todo> {
        self.repo
            .get_todo(id, DeletedFilter::Any)
            .map_err(|err| self.fail(op, Some(id), err))?
            .ok_or(TodoServiceError::InconsistentState(details))
    }

    fn fail(&self, op: TodoOperation, id: Option<TodoId>, err: RepoError) -> TodoServiceError {
        let error = TodoServiceError::persistence(op, id, err);
        if error.kind() == ErrorKind::Persistence {
            warn!(
                "event={} module=service status=error todo_id={} error={error}",
                op.as_str(),
                id.map_or_else(|| "-".to_string(), |id| id.to_string())
            );
        }
        error
    }
}
