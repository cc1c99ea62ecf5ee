//! SQLite persistence for installed models and the runtime configuration.
//!
//! One connection behind a lock; multi-statement invariants run inside a
//! single transaction.

mod config_repo;
mod database;
mod migrations;

pub use config_repo::StoredRuntimeConfig;
pub use database::{Database, DbError};
pub use migrations::SCHEMA_VERSION;
