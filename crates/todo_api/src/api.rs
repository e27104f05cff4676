//! Request-level API for the `/todos` resource.
//!
//! # Responsibility
//! - Dispatch method + target + body to `TodoService` operations.
//! - Map service errors to status codes and `{message}` bodies.
//! - Decode and minimally check request bodies before the core sees them.
//!
//! # Invariants
//! - Handlers never panic; every failure becomes an `ApiResponse`.
//! - Unknown body keys are ignored; only `title` and `status` reach the core.

use crate::route::{parse_flag, split_target, Method, Route};
use log::{debug, warn};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::OnceLock;
use todo_core::db::open_db;
use todo_core::{ErrorKind, NewTodo, SqliteTodoService, Todo, TodoId, TodoPatch, TodoServiceError};
use uuid::Uuid;

pub const DB_PATH_ENV: &str = "TODO_DB_PATH";
const DEFAULT_DB_FILE_NAME: &str = "todo_api.sqlite3";
static DB_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Status code and JSON body returned for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn ok_with_message(message: &str, data: Value) -> Self {
        Self::ok(json!({ "message": message, "data": data }))
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "message": message.into() }),
        }
    }

    fn from_service_error(err: &TodoServiceError) -> Self {
        let status = match err.kind() {
            ErrorKind::NotFound => 404,
            ErrorKind::Forbidden => 403,
            ErrorKind::Persistence => 500,
        };
        Self::error(status, err.to_string())
    }
}

/// Body accepted by `POST /todos`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateTodoRequest {
    pub title: String,
    pub status: String,
}

/// Body accepted by `PUT /todos/:id`. Absent fields are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UpdateTodoRequest {
    pub title: Option<String>,
    pub status: Option<String>,
}

impl CreateTodoRequest {
    fn into_new_todo(self) -> Result<NewTodo, String> {
        require_non_blank("title", &self.title)?;
        require_non_blank("status", &self.status)?;
        Ok(NewTodo::new(self.title, self.status))
    }
}

impl UpdateTodoRequest {
    fn into_patch(self) -> Result<TodoPatch, String> {
        if let Some(title) = self.title.as_deref() {
            require_non_blank("title", title)?;
        }
        if let Some(status) = self.status.as_deref() {
            require_non_blank("status", status)?;
        }
        Ok(TodoPatch {
            title: self.title,
            status: self.status,
        })
    }
}

/// Request dispatcher over an injected, already-open connection.
pub struct TodoApi<'conn> {
    conn: &'conn Connection,
}

impl<'conn> TodoApi<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Handles one request.
    ///
    /// `target` is the path with an optional query string, e.g.
    /// `/todos/<id>?overrideDeleted=true`. `body` is the raw JSON body.
    pub fn handle(&self, method: &str, target: &str, body: Option<&str>) -> ApiResponse {
        let (path, query) = match split_target(target) {
            Ok(parts) => parts,
            Err(err) => return ApiResponse::error(400, format!("invalid query string: {err}")),
        };
        let route = Method::parse(method).and_then(|method| Route::resolve(method, path));
        let Some(route) = route else {
            return ApiResponse::error(404, "Route not found");
        };

        let service = match SqliteTodoService::try_from_connection(self.conn) {
            Ok(service) => service,
            Err(err) => {
                warn!("event=api_request module=api status=error error_code=repo_init_failed error={err}");
                return ApiResponse::error(500, format!("todo store unavailable: {err}"));
            }
        };

        let include_deleted = parse_flag(query.get("includeDeleted").map(String::as_str));
        let override_deleted = parse_flag(query.get("overrideDeleted").map(String::as_str));

        let response = match route {
            Route::Create => create(&service, body),
            Route::FindActive => respond(service.find_active(), to_json),
            Route::FindDeleted => respond(service.find_deleted(), to_json),
            Route::FindDeletedById(raw_id) => with_id(&raw_id, |id| {
                respond(service.find_deleted_by_id(id), to_json)
            }),
            Route::FindById(raw_id) => with_id(&raw_id, |id| {
                respond(service.find_by_id(id, include_deleted), to_json)
            }),
            Route::Update(raw_id) => with_id(&raw_id, |id| {
                update(&service, id, body, override_deleted)
            }),
            Route::Restore(raw_id) => with_id(&raw_id, |id| {
                respond(
                    service.restore_todo(id),
                    with_message("Todo restored successfully!"),
                )
            }),
            Route::SoftDelete(raw_id) => with_id(&raw_id, |id| {
                respond(
                    service.soft_delete_todo(id),
                    with_message("Todo moved to recycle bin successfully!"),
                )
            }),
            Route::DeleteAllHard => respond(service.delete_all_hard(), |removed| {
                Ok(ApiResponse::ok(json!({
                    "message": format!("{removed} Todos have been deleted successfully !")
                })))
            }),
        };

        debug!(
            "event=api_request module=api method={} path={} status={}",
            method.trim().to_ascii_uppercase(),
            path,
            response.status
        );
        response
    }
}

/// Handles one request against the database named by `TODO_DB_PATH`.
///
/// Falls back to a file in the system temp directory when unset.
pub fn handle_request(method: &str, target: &str, body: Option<&str>) -> ApiResponse {
    let db_path = resolve_db_path();
    let conn = match open_db(&db_path) {
        Ok(conn) => conn,
        Err(err) => return ApiResponse::error(500, format!("todo DB open failed: {err}")),
    };
    TodoApi::new(&conn).handle(method, target, body)
}

fn create(service: &SqliteTodoService<'_>, body: Option<&str>) -> ApiResponse {
    let input = match decode_body::<CreateTodoRequest>(body).and_then(|req| req.into_new_todo()) {
        Ok(input) => input,
        Err(message) => return ApiResponse::error(400, message),
    };
    respond(service.create_todo(input), to_json)
}

fn update(
    service: &SqliteTodoService<'_>,
    id: TodoId,
    body: Option<&str>,
    override_deleted: bool,
) -> ApiResponse {
    let patch = match decode_body::<UpdateTodoRequest>(body).and_then(|req| req.into_patch()) {
        Ok(patch) => patch,
        Err(message) => return ApiResponse::error(400, message),
    };
    respond(
        service.update_todo(id, &patch, override_deleted),
        with_message("Todo updated successfully!"),
    )
}

fn respond<T>(
    result: Result<T, TodoServiceError>,
    on_ok: impl FnOnce(T) -> Result<ApiResponse, String>,
) -> ApiResponse {
    match result {
        Ok(value) => on_ok(value).unwrap_or_else(|message| ApiResponse::error(500, message)),
        Err(err) => ApiResponse::from_service_error(&err),
    }
}

fn to_json<T: Serialize>(value: T) -> Result<ApiResponse, String> {
    encode(value).map(ApiResponse::ok)
}

fn with_message(message: &'static str) -> impl FnOnce(Todo) -> Result<ApiResponse, String> {
    move |todo| encode(todo).map(|data| ApiResponse::ok_with_message(message, data))
}

fn encode<T: Serialize>(value: T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|err| format!("response encoding failed: {err}"))
}

fn with_id(raw_id: &str, f: impl FnOnce(TodoId) -> ApiResponse) -> ApiResponse {
    match Uuid::parse_str(raw_id) {
        Ok(id) => f(id),
        Err(_) => ApiResponse::error(404, format!("Not found Todo with id {raw_id}")),
    }
}

fn decode_body<T: for<'de> Deserialize<'de>>(body: Option<&str>) -> Result<T, String> {
    let raw = body.map(str::trim).filter(|raw| !raw.is_empty()).unwrap_or("{}");
    serde_json::from_str(raw).map_err(|err| format!("invalid request body: {err}"))
}

fn require_non_blank(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} can not be empty!"));
    }
    Ok(())
}

fn resolve_db_path() -> PathBuf {
    DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var(DB_PATH_ENV) {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(DEFAULT_DB_FILE_NAME)
        })
        .clone()
}
