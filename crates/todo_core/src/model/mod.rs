//! Domain model for todos and their change history.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//!
//! # Invariants
//! - Every todo is identified by a stable `TodoId`.
//! - Individual deletion is a soft-delete marker, not a row removal.
//! - History records reference todos by id only; there is no cascade.

pub mod history;
pub mod todo;
