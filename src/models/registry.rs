//! Registry of installed models.
//!
//! Owns two invariants over the `installed_models` table: slugs are unique,
//! and at most one row is active. Every mutation that touches either runs
//! inside one transaction.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use super::record::{InstalledModel, NewInstalledModel, MODEL_COLUMNS};
use super::slug::dedup_candidate;
use crate::db::{Database, DbError};

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Model not found: {0}")]
    NotFound(i64),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<rusqlite::Error> for RegistryError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Db(DbError::from(e))
    }
}

/// Thread-safe view over the installed model table.
#[derive(Clone)]
pub struct ModelRegistry {
    db: Arc<Database>,
}

impl ModelRegistry {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// All installed models, newest first.
    pub fn list(&self) -> Result<Vec<InstalledModel>, RegistryError> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MODEL_COLUMNS} FROM installed_models ORDER BY created_at DESC, id DESC"
            ))?;
            let rows = stmt.query_map([], InstalledModel::from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    pub fn get(&self, id: i64) -> Result<InstalledModel, RegistryError> {
        self.db.with_connection(|conn| fetch(conn, id))
    }

    /// The model currently marked active, if any.
    pub fn active(&self) -> Result<Option<InstalledModel>, RegistryError> {
        self.db.with_connection(|conn| {
            let model = conn
                .query_row(
                    &format!("SELECT {MODEL_COLUMNS} FROM installed_models WHERE is_active = 1"),
                    [],
                    InstalledModel::from_row,
                )
                .optional()?;
            Ok(model)
        })
    }

    /// Models sharing a content digest, oldest first.
    pub fn find_by_checksum(&self, checksum: &str) -> Result<Vec<InstalledModel>, RegistryError> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MODEL_COLUMNS} FROM installed_models
                 WHERE checksum_sha256 = ?1 ORDER BY id"
            ))?;
            let rows = stmt.query_map(params![checksum], InstalledModel::from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    /// Insert a model under the first free slug in `base`, `base-2`, `base-3`, ...
    ///
    /// `build` receives the assigned slug so callers can derive the file path
    /// from it. Slug choice and insert share one transaction.
    pub fn register<F>(&self, base_slug: &str, build: F) -> Result<InstalledModel, RegistryError>
    where
        F: FnOnce(&str) -> NewInstalledModel,
    {
        self.db.with_transaction(|conn| {
            let slug = next_free_slug(conn, base_slug)?;
            let new = build(&slug);
            let now = Utc::now();
            let size_bytes = new.size_bytes.and_then(|b| i64::try_from(b).ok());
            conn.execute(
                "INSERT INTO installed_models
                    (slug, display_name, file_path, quantization, context_length,
                     parameter_count, size_bytes, checksum_sha256, is_active,
                     created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?9)",
                params![
                    slug,
                    new.display_name,
                    new.file_path,
                    new.quantization,
                    new.context_length,
                    new.parameter_count,
                    size_bytes,
                    new.checksum_sha256,
                    now,
                ],
            )?;
            fetch(conn, conn.last_insert_rowid())
        })
    }

    /// Mark `id` as the only active model.
    pub fn activate(&self, id: i64) -> Result<InstalledModel, RegistryError> {
        self.db.with_transaction(|conn| {
            let now = Utc::now();
            activate_in(conn, id, now)?;
            fetch(conn, id)
        })
    }

    /// Mark `id` as the only active model and stamp its load time.
    pub fn mark_loaded(
        &self,
        id: i64,
        loaded_at: DateTime<Utc>,
    ) -> Result<InstalledModel, RegistryError> {
        self.db.with_transaction(|conn| {
            let now = Utc::now();
            activate_in(conn, id, now)?;
            conn.execute(
                "UPDATE installed_models SET last_loaded_at = ?1 WHERE id = ?2",
                params![loaded_at, id],
            )?;
            fetch(conn, id)
        })
    }

    /// Clear every active flag. Returns how many rows changed.
    pub fn deactivate_all(&self) -> Result<usize, RegistryError> {
        self.db.with_transaction(|conn| {
            let changed = conn.execute(
                "UPDATE installed_models SET is_active = 0, updated_at = ?1 WHERE is_active = 1",
                params![Utc::now()],
            )?;
            Ok(changed)
        })
    }

    /// Remove a record and return it.
    pub fn delete(&self, id: i64) -> Result<InstalledModel, RegistryError> {
        self.db.with_transaction(|conn| {
            let model = fetch(conn, id)?;
            conn.execute("DELETE FROM installed_models WHERE id = ?1", params![id])?;
            Ok(model)
        })
    }
}

fn fetch(conn: &Connection, id: i64) -> Result<InstalledModel, RegistryError> {
    conn.query_row(
        &format!("SELECT {MODEL_COLUMNS} FROM installed_models WHERE id = ?1"),
        params![id],
        InstalledModel::from_row,
    )
    .optional()?
    .ok_or(RegistryError::NotFound(id))
}

fn slug_taken(conn: &Connection, slug: &str) -> Result<bool, RegistryError> {
    let taken: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM installed_models WHERE slug = ?1)",
        params![slug],
        |row| row.get(0),
    )?;
    Ok(taken)
}

fn next_free_slug(conn: &Connection, base: &str) -> Result<String, RegistryError> {
    let mut attempt = 1;
    loop {
        let candidate = dedup_candidate(base, attempt);
        if !slug_taken(conn, &candidate)? {
            return Ok(candidate);
        }
        attempt += 1;
    }
}

/// Deactivate everything except `id`, then activate `id`. Must run inside a
/// transaction.
fn activate_in(conn: &Connection, id: i64, now: DateTime<Utc>) -> Result<(), RegistryError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM installed_models WHERE id = ?1)",
        params![id],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(RegistryError::NotFound(id));
    }
    conn.execute(
        "UPDATE installed_models SET is_active = 0, updated_at = ?1
         WHERE is_active = 1 AND id <> ?2",
        params![now, id],
    )?;
    conn.execute(
        "UPDATE installed_models SET is_active = 1, updated_at = ?1 WHERE id = ?2",
        params![now, id],
    )?;
    Ok(())
}
