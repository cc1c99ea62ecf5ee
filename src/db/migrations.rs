//! Schema creation and upgrades.

use rusqlite::Connection;

use super::DbError;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

/// Bring the database up to `SCHEMA_VERSION`.
pub fn run_migrations(conn: &Connection) -> Result<(), DbError> {
    let current = schema_version(conn)?;

    if current < 1 {
        migrate_v1(conn)?;
    }
    if current < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn schema_version(conn: &Connection) -> Result<i32, DbError> {
    let table_exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
        [],
        |row| row.get(0),
    )?;
    if !table_exists {
        return Ok(0);
    }
    let version: Option<i32> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(version.unwrap_or(0))
}

/// Initial tables.
fn migrate_v1(conn: &Connection) -> Result<(), DbError> {
    tracing::info!("Running database migration v1");

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS installed_models (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            slug TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL,
            file_path TEXT NOT NULL,
            quantization TEXT,
            context_length INTEGER,
            parameter_count REAL,
            size_bytes INTEGER,
            checksum_sha256 TEXT,
            is_active INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            last_loaded_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_installed_models_checksum
            ON installed_models(checksum_sha256);
        CREATE INDEX IF NOT EXISTS idx_installed_models_active
            ON installed_models(is_active);

        CREATE TABLE IF NOT EXISTS runtime_config (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            context_length INTEGER NOT NULL,
            gpu_layers INTEGER,
            cpu_threads INTEGER NOT NULL,
            eval_batch_size INTEGER NOT NULL,
            kv_cache_placement TEXT NOT NULL,
            use_mmap INTEGER NOT NULL,
            keep_in_memory INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        );

        INSERT INTO schema_version (version) VALUES (1);
        "#,
    )?;
    Ok(())
}

/// Storage-level guard: at most one row may carry `is_active = 1`.
fn migrate_v2(conn: &Connection) -> Result<(), DbError> {
    tracing::info!("Running database migration v2");

    conn.execute_batch(
        r#"
        UPDATE installed_models SET is_active = 0
            WHERE is_active = 1
              AND id <> (SELECT MAX(id) FROM installed_models WHERE is_active = 1);

        CREATE UNIQUE INDEX IF NOT EXISTS idx_installed_models_single_active
            ON installed_models(is_active) WHERE is_active = 1;

        INSERT INTO schema_version (version) VALUES (2);
        "#,
    )?;
    Ok(())
}
