//! Installed model rows.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// A GGUF artifact installed on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstalledModel {
    pub id: i64,
    /// Stable identifier derived from the filename; unique.
    pub slug: String,
    pub display_name: String,
    /// Absolute path to the GGUF file.
    pub file_path: String,
    pub quantization: Option<String>,
    pub context_length: Option<u32>,
    /// Parameter count in billions.
    pub parameter_count: Option<f64>,
    pub size_bytes: Option<u64>,
    pub checksum_sha256: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_loaded_at: Option<DateTime<Utc>>,
}

/// Fields supplied when registering a model; the slug is assigned by the
/// registry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewInstalledModel {
    pub display_name: String,
    pub file_path: String,
    pub quantization: Option<String>,
    pub context_length: Option<u32>,
    pub parameter_count: Option<f64>,
    pub size_bytes: Option<u64>,
    pub checksum_sha256: Option<String>,
}

pub(crate) const MODEL_COLUMNS: &str = "id, slug, display_name, file_path, quantization, \
     context_length, parameter_count, size_bytes, checksum_sha256, is_active, \
     created_at, updated_at, last_loaded_at";

impl InstalledModel {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let size_bytes: Option<i64> = row.get(7)?;
        Ok(Self {
            id: row.get(0)?,
            slug: row.get(1)?,
            display_name: row.get(2)?,
            file_path: row.get(3)?,
            quantization: row.get(4)?,
            context_length: row.get(5)?,
            parameter_count: row.get(6)?,
            size_bytes: size_bytes.and_then(|b| u64::try_from(b).ok()),
            checksum_sha256: row.get(8)?,
            is_active: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
            last_loaded_at: row.get(12)?,
        })
    }
}
