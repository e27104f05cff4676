//! Core domain logic for the todo backend.
//! This crate is the single source of truth for lifecycle and history invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use db::{close_db, open_db, open_db_in_memory, open_db_with_config, DbConfig, DbError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::history::{HistoryEntry, HistoryId, HistoryOperation, TodoHistory};
pub use model::todo::{NewTodo, Todo, TodoId, TodoPatch, TodoValidationError};
pub use repo::history_repo::{HistoryRepository, SqliteHistoryRepository};
pub use repo::todo_repo::{DeletedFilter, SqliteTodoRepository, TodoRepository};
pub use repo::{RepoError, RepoResult};
pub use service::todo_service::{
    ErrorKind, NotFoundContext, ServiceResult, SqliteTodoService, TodoOperation, TodoService,
    TodoServiceError,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
