//! Database abstraction layer.
//!
//! Trait-based data access so storage backends can be swapped without
//! touching the matching, messaging, or task logic.
//!
//! - `error`: storage-agnostic error types
//! - `models`: domain entities (Skill, VolunteerClaim, Project, Task, Message, ...)
//! - `repository`: trait definitions for data access
//! - `sqlite`: the SQLite implementation

mod error;
mod models;
mod repository;
pub mod sqlite;
pub mod utils;


pub use error::{DbError, DbResult};
pub use models::*;
pub use repository::*;
pub use sqlite::SqliteDatabase;
