//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `todo_core` linkage and storage.
//! - Open the configured database, report schema and recycle-bin counts, close it.
//!
//! Reads `TODO_DB_PATH` (in-memory when unset) and `TODO_LOG_DIR` /
//! `TODO_LOG_LEVEL` (logging stays off without a directory).

use std::process::ExitCode;
use todo_core::db::migrations::current_user_version;
use todo_core::logging::LoggingConfig;
use todo_core::{close_db, open_db_with_config, DbConfig, ErrorKind, SqliteTodoService};

fn main() -> ExitCode {
    if let Some(config) = LoggingConfig::from_env() {
        if let Err(err) = config.init() {
            eprintln!("todo_cli logging disabled: {err}");
        }
    }

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("todo_cli error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::var("TODO_DB_PATH") {
        Ok(path) if !path.trim().is_empty() => DbConfig::file(path.trim()),
        _ => DbConfig::in_memory(),
    };

    println!("todo_core ping={}", todo_core::ping());
    println!("todo_core version={}", todo_core::core_version());

    let conn = open_db_with_config(&config)?;
    println!("todo_core schema_version={}", current_user_version(&conn)?);
    {
        let service = SqliteTodoService::try_from_connection(&conn)?;
        let active = service.find_active()?.len();
        let deleted = match service.find_deleted() {
            Ok(todos) => todos.len(),
            Err(err) if err.kind() == ErrorKind::NotFound => 0,
            Err(err) => return Err(err.into()),
        };
        println!("todo_core active={active} recycle_bin={deleted}");
    }
    close_db(conn)?;
    Ok(())
}
