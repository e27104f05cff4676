//! History log contracts and SQLite implementation.
//!
//! # Responsibility
//! - Append immutable todo snapshots to `todo_history`.
//! - Provide the audit read used by reporting callers.
//!
//! # Invariants
//! - Rows are insert-only; no API updates or deletes them.
//! - `data` holds the JSON encoding of the full todo snapshot.
//! - Per-todo listing is ordered by insertion sequence.

use crate::model::history::{HistoryEntry, HistoryOperation, TodoHistory};
use crate::model::todo::{now_epoch_ms, Todo, TodoId};
use crate::repo::{ensure_connection_ready, RepoError, RepoResult};
use log::debug;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const HISTORY_COLUMNS: &[&str] = &["id", "seq", "todo_id", "data", "operation", "created_at"];

/// Repository interface for the append-only history log.
pub trait HistoryRepository {
    /// Persists one snapshot and returns the stored record.
    fn append_history(&self, entry: &HistoryEntry) -> RepoResult<TodoHistory>;
    /// Lists all history records naming `todo_id`, oldest first.
    fn list_history(&self, todo_id: TodoId) -> RepoResult<Vec<TodoHistory>>;
    /// Counts every history record in the log.
    fn count_history(&self) -> RepoResult<u64>;
}

/// SQLite-backed history log.
pub struct SqliteHistoryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteHistoryRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, "todo_history", HISTORY_COLUMNS)?;
        Ok(Self { conn })
    }
}

impl HistoryRepository for SqliteHistoryRepository<'_> {
    fn append_history(&self, entry: &HistoryEntry) -> RepoResult<TodoHistory> {
        let data = serde_json::to_string(&entry.snapshot)?;
        let record_id = Uuid::new_v4();
        let created_at = now_epoch_ms();

        self.conn.execute(
            "INSERT INTO todo_history (id, seq, todo_id, data, operation, created_at)
             VALUES (
                ?1,
                (SELECT COALESCE(MAX(seq), 0) + 1 FROM todo_history),
                ?2,
                ?3,
                ?4,
                ?5
             );",
            params![
                record_id.to_string(),
                entry.todo_id.to_string(),
                data,
                entry.operation.as_str(),
                created_at,
            ],
        )?;

        debug!(
            "event=history_append module=repo status=ok todo_id={} operation={}",
            entry.todo_id,
            entry.operation.as_str()
        );

        Ok(TodoHistory {
            id: record_id,
            todo_id: entry.todo_id,
            data: entry.snapshot.clone(),
            operation: entry.operation,
            created_at,
        })
    }

    fn list_history(&self, todo_id: TodoId) -> RepoResult<Vec<TodoHistory>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, todo_id, data, operation, created_at
             FROM todo_history
             WHERE todo_id = ?1
             ORDER BY seq ASC;",
        )?;
        let mut rows = stmt.query([todo_id.to_string()])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_history_row(row)?);
        }
        Ok(records)
    }

    fn count_history(&self) -> RepoResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM todo_history;", [], |row| row.get(0))?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative history count `{count}`")))
    }
}

fn parse_history_row(row: &Row<'_>) -> RepoResult<TodoHistory> {
    let id_text: String = row.get("id")?;
    let id = parse_uuid(&id_text, "todo_history.id")?;
    let todo_id_text: String = row.get("todo_id")?;
    let todo_id = parse_uuid(&todo_id_text, "todo_history.todo_id")?;

    let operation_text: String = row.get("operation")?;
    let operation = HistoryOperation::parse(&operation_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid operation `{operation_text}` in todo_history.operation"
        ))
    })?;

    let data_text: String = row.get("data")?;
    let data: Todo = serde_json::from_str(&data_text)?;

    Ok(TodoHistory {
        id,
        todo_id,
        data,
        operation,
        created_at: row.get("created_at")?,
    })
}

fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}
