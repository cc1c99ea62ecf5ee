//! The singleton `runtime_config` row.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{Database, DbError};
use crate::runtime::{KvCachePlacement, RuntimeSettings};

const CONFIG_ID: i64 = 1;

/// Persisted runtime configuration plus its last write time.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRuntimeConfig {
    pub settings: RuntimeSettings,
    pub updated_at: DateTime<Utc>,
}

impl Database {
    /// Current configuration, creating the default row on first read.
    pub fn load_runtime_config(&self) -> Result<StoredRuntimeConfig, DbError> {
        self.with_transaction(|conn| {
            if let Some(stored) = select_config(conn)? {
                return Ok(stored);
            }
            tracing::debug!("Creating default runtime configuration");
            write_config(conn, &RuntimeSettings::default(), Utc::now())?;
            select_config(conn)?
                .ok_or_else(|| DbError::Corrupt("runtime_config row missing after insert".into()))
        })
    }

    /// Replace the configuration wholesale. Callers validate first.
    pub fn save_runtime_config(
        &self,
        settings: &RuntimeSettings,
    ) -> Result<StoredRuntimeConfig, DbError> {
        self.with_transaction(|conn| {
            write_config(conn, settings, Utc::now())?;
            select_config(conn)?
                .ok_or_else(|| DbError::Corrupt("runtime_config row missing after update".into()))
        })
    }
}

fn write_config(
    conn: &Connection,
    settings: &RuntimeSettings,
    now: DateTime<Utc>,
) -> Result<(), DbError> {
    conn.execute(
        r#"
        INSERT INTO runtime_config
            (id, context_length, gpu_layers, cpu_threads, eval_batch_size,
             kv_cache_placement, use_mmap, keep_in_memory, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(id) DO UPDATE SET
            context_length = excluded.context_length,
            gpu_layers = excluded.gpu_layers,
            cpu_threads = excluded.cpu_threads,
            eval_batch_size = excluded.eval_batch_size,
            kv_cache_placement = excluded.kv_cache_placement,
            use_mmap = excluded.use_mmap,
            keep_in_memory = excluded.keep_in_memory,
            updated_at = excluded.updated_at
        "#,
        params![
            CONFIG_ID,
            settings.context_length,
            settings.gpu_layers,
            settings.cpu_threads,
            settings.eval_batch_size,
            settings.kv_cache_placement.as_str(),
            settings.use_mmap,
            settings.keep_in_memory,
            now,
        ],
    )?;
    Ok(())
}

fn select_config(conn: &Connection) -> Result<Option<StoredRuntimeConfig>, DbError> {
    let raw = conn
        .query_row(
            "SELECT context_length, gpu_layers, cpu_threads, eval_batch_size,
                    kv_cache_placement, use_mmap, keep_in_memory, updated_at
             FROM runtime_config WHERE id = ?1",
            params![CONFIG_ID],
            read_raw,
        )
        .optional()?;

    raw.map(RawConfig::into_stored).transpose()
}

struct RawConfig {
    context_length: u32,
    gpu_layers: Option<u32>,
    cpu_threads: u32,
    eval_batch_size: u32,
    placement: String,
    use_mmap: bool,
    keep_in_memory: bool,
    updated_at: DateTime<Utc>,
}

fn read_raw(row: &Row<'_>) -> rusqlite::Result<RawConfig> {
    Ok(RawConfig {
        context_length: row.get(0)?,
        gpu_layers: row.get(1)?,
        cpu_threads: row.get(2)?,
        eval_batch_size: row.get(3)?,
        placement: row.get(4)?,
        use_mmap: row.get(5)?,
        keep_in_memory: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

impl RawConfig {
    fn into_stored(self) -> Result<StoredRuntimeConfig, DbError> {
        let kv_cache_placement: KvCachePlacement = self
            .placement
            .parse()
            .map_err(|e| DbError::Corrupt(format!("runtime_config: {e}")))?;
        Ok(StoredRuntimeConfig {
            settings: RuntimeSettings {
                context_length: self.context_length,
                gpu_layers: self.gpu_layers,
                cpu_threads: self.cpu_threads,
                eval_batch_size: self.eval_batch_size,
                kv_cache_placement,
                use_mmap: self.use_mmap,
                keep_in_memory: self.keep_in_memory,
            },
            updated_at: self.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_read_creates_defaults() {
        let db = Database::open_in_memory().unwrap();
        let stored = db.load_runtime_config().unwrap();
        assert_eq!(stored.settings, RuntimeSettings::default());

        let again = db.load_runtime_config().unwrap();
        assert_eq!(again.updated_at, stored.updated_at);
    }

    #[test]
    fn test_save_replaces_every_field() {
        let db = Database::open_in_memory().unwrap();
        db.load_runtime_config().unwrap();

        let settings = RuntimeSettings {
            context_length: 8192,
            gpu_layers: Some(24),
            cpu_threads: 6,
            eval_batch_size: 64,
            kv_cache_placement: KvCachePlacement::Gpu,
            use_mmap: false,
            keep_in_memory: false,
        };
        let saved = db.save_runtime_config(&settings).unwrap();
        assert_eq!(saved.settings, settings);
        assert_eq!(db.load_runtime_config().unwrap().settings, settings);
    }

    #[test]
    fn test_gpu_layers_zero_distinct_from_unset() {
        let db = Database::open_in_memory().unwrap();
        let zero = RuntimeSettings { gpu_layers: Some(0), ..Default::default() };
        db.save_runtime_config(&zero).unwrap();
        assert_eq!(db.load_runtime_config().unwrap().settings.gpu_layers, Some(0));

        db.save_runtime_config(&RuntimeSettings::default()).unwrap();
        assert_eq!(db.load_runtime_config().unwrap().settings.gpu_layers, None);
    }
}
