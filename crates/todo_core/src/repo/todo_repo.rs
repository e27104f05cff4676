//! Todo store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD APIs over canonical `todos` storage.
//! - Expose the write transaction boundary of the store's connection.
//!
//! # Invariants
//! - Write paths must call `Todo::validate()` before SQL mutations.
//! - Read paths must reject invalid persisted state instead of masking it.
//! - Writes issued inside `in_transaction` commit together or not at all.
//! - `delete_all_todos` never touches `todo_history`.

use crate::model::todo::{Todo, TodoId};
use crate::repo::{bool_to_int, ensure_connection_ready, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const TODO_SELECT_SQL: &str = "SELECT
    id,
    title,
    status,
    is_deleted,
    deleted_at,
    version,
    created_at,
    updated_at
FROM todos";

const TODO_COLUMNS: &[&str] = &[
    "id",
    "title",
    "status",
    "is_deleted",
    "deleted_at",
    "version",
    "created_at",
    "updated_at",
];

/// Which side of the recycle bin a read looks at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeletedFilter {
    /// Only todos with `is_deleted = false`.
    #[default]
    Active,
    /// Only todos with `is_deleted = true`.
    Deleted,
    /// Both.
    Any,
}

impl DeletedFilter {
    fn sql_clause(self) -> &'static str {
        match self {
            Self::Active => " AND is_deleted = 0",
            Self::Deleted => " AND is_deleted = 1",
            Self::Any => "",
        }
    }
}

/// Repository interface for the todo store.
pub trait TodoRepository {
    /// Inserts a new todo row.
    fn create_todo(&self, todo: &Todo) -> RepoResult<TodoId>;
    /// Loads one todo by id, constrained by `filter`.
    fn get_todo(&self, id: TodoId, filter: DeletedFilter) -> RepoResult<Option<Todo>>;
    /// Lists todos in insertion order, constrained by `filter`.
    fn list_todos(&self, filter: DeletedFilter) -> RepoResult<Vec<Todo>>;
    /// Overwrites one todo row with the given state.
    fn save_todo(&self, todo: &Todo) -> RepoResult<()>;
    /// Runs `work` inside one write transaction on this store's connection.
    ///
    /// Commits when `work` succeeds and rolls back when it fails. Any other
    /// repository sharing the connection joins the same transaction.
    fn in_transaction(&self, work: &mut dyn FnMut() -> RepoResult<()>) -> RepoResult<()>;
    /// Removes every todo row, deleted or not. Returns the removed count.
    fn delete_all_todos(&self) -> RepoResult<usize>;
}

/// SQLite-backed todo store.
pub struct SqliteTodoRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTodoRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, "todos", TODO_COLUMNS)?;
        Ok(Self { conn })
    }
}

impl TodoRepository for SqliteTodoRepository<'_> {
    fn create_todo(&self, todo: &Todo) -> RepoResult<TodoId> {
        todo.validate()?;

        self.conn.execute(
            "INSERT INTO todos (
                id,
                title,
                status,
                is_deleted,
                deleted_at,
                version,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                todo.id.to_string(),
                todo.title.as_str(),
                todo.status.as_str(),
                bool_to_int(todo.is_deleted),
                todo.deleted_at,
                todo.version,
                todo.created_at,
                todo.updated_at,
            ],
        )?;

        Ok(todo.id)
    }

    fn get_todo(&self, id: TodoId, filter: DeletedFilter) -> RepoResult<Option<Todo>> {
        let sql = format!("{TODO_SELECT_SQL} WHERE id = ?1{};", filter.sql_clause());
        let mut stmt = self.conn.prepare(&sql)?;
        let parsed = stmt
            .query_row([id.to_string()], |row| Ok(parse_todo_row(row)))
            .optional()?;
        parsed.transpose()
    }

    fn list_todos(&self, filter: DeletedFilter) -> RepoResult<Vec<Todo>> {
        let sql = format!(
            "{TODO_SELECT_SQL} WHERE 1 = 1{} ORDER BY created_at ASC, rowid ASC;",
            filter.sql_clause()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut todos = Vec::new();
        while let Some(row) = rows.next()? {
            todos.push(parse_todo_row(row)?);
        }
        Ok(todos)
    }

    fn save_todo(&self, todo: &Todo) -> RepoResult<()> {
        todo.validate()?;
        update_todo_row(self.conn, todo)
    }

    fn in_transaction(&self, work: &mut dyn FnMut() -> RepoResult<()>) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        // Dropping `tx` on the error path rolls back.
        work()?;
        tx.commit()?;
        Ok(())
    }

    fn delete_all_todos(&self) -> RepoResult<usize> {
        let removed = self.conn.execute("DELETE FROM todos;", [])?;
        Ok(removed)
    }
}

fn update_todo_row(conn: &Connection, todo: &Todo) -> RepoResult<()> {
    let changed = conn.execute(
        "UPDATE todos
         SET
            title = ?1,
            status = ?2,
            is_deleted = ?3,
            deleted_at = ?4,
            version = ?5,
            updated_at = ?6
         WHERE id = ?7;",
        params![
            todo.title.as_str(),
            todo.status.as_str(),
            bool_to_int(todo.is_deleted),
            todo.deleted_at,
            todo.version,
            todo.updated_at,
            todo.id.to_string(),
        ],
    )?;

    if changed == 0 {
        return Err(RepoError::NotFound(todo.id));
    }

    Ok(())
}

fn parse_todo_row(row: &Row<'_>) -> RepoResult<Todo> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{id_text}` in todos.id"))
    })?;

    let is_deleted = match row.get::<_, i64>("is_deleted")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_deleted value `{other}` in todos.is_deleted"
            )));
        }
    };

    let todo = Todo {
        id,
        title: row.get("title")?,
        status: row.get("status")?,
        is_deleted,
        deleted_at: row.get("deleted_at")?,
        version: row.get("version")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    todo.validate()?;
    Ok(todo)
}
