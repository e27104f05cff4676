//! HTTP-shaped boundary for the todo core.
//!
//! Resolves `/todos` routes, decodes bodies and maps core errors to status
//! codes without tying the crate to a particular HTTP server.

pub mod api;
pub mod route;

pub use api::{handle_request, ApiResponse, CreateTodoRequest, TodoApi, UpdateTodoRequest};
pub use route::{parse_flag, split_target, Method, Route};
