//! Upload pipeline: stage to disk, checksum, register, move into place.
//!
//! Files land in the models directory as `<slug><original-extension>`.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use super::checksum::{sha256_file, CHUNK_SIZE};
use super::record::{InstalledModel, NewInstalledModel};
use super::registry::{ModelRegistry, RegistryError};
use super::slug::{infer_quantization, slugify};
use crate::telemetry;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Filename is required.")]
    MissingFilename,

    #[error("Upload I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Optional form fields accompanying an upload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadMetadata {
    pub display_name: Option<String>,
    pub quantization: Option<String>,
    pub context_length: Option<u32>,
    pub parameter_count: Option<f64>,
}

/// An upload written to disk but not yet registered.
#[derive(Debug)]
pub struct StagedUpload {
    filename: String,
    path: PathBuf,
    size_bytes: u64,
    checksum: String,
}

/// Stores uploaded model files and their registry records.
#[derive(Clone)]
pub struct ModelStore {
    registry: ModelRegistry,
    models_dir: PathBuf,
}

impl ModelStore {
    pub fn new(registry: ModelRegistry, models_dir: PathBuf) -> Self {
        Self { registry, models_dir }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Stream `reader` to disk under a slug derived from `filename`.
    ///
    /// Blocks (asynchronously) for the full write plus a full checksum pass.
    /// Nothing is left on disk or in the registry if any step fails.
    pub async fn install<R>(
        &self,
        filename: &str,
        reader: R,
        meta: UploadMetadata,
    ) -> Result<InstalledModel, UploadError>
    where
        R: AsyncRead + Unpin,
    {
        let staged = self.stage(filename, reader).await?;
        self.commit(staged, meta).await
    }

    /// Write the upload to a hidden staging file and checksum it.
    ///
    /// The result must be passed to [`commit`](Self::commit) or
    /// [`discard`](Self::discard).
    pub async fn stage<R>(&self, filename: &str, reader: R) -> Result<StagedUpload, UploadError>
    where
        R: AsyncRead + Unpin,
    {
        let filename = sanitize_filename(filename).ok_or(UploadError::MissingFilename)?;
        tokio::fs::create_dir_all(&self.models_dir).await?;
        let path = self
            .models_dir
            .join(format!(".upload-{}.part", uuid::Uuid::new_v4()));

        match write_and_hash(&path, reader).await {
            Ok((size_bytes, checksum)) => {
                tracing::debug!(filename = %filename, size_bytes, "Upload staged");
                Ok(StagedUpload { filename, path, size_bytes, checksum })
            }
            Err(e) => {
                remove_staged(&path).await;
                Err(e.into())
            }
        }
    }

    /// Register a staged upload and move it to `<slug><ext>`.
    pub async fn commit(
        &self,
        staged: StagedUpload,
        meta: UploadMetadata,
    ) -> Result<InstalledModel, UploadError> {
        let store = self.clone();
        let staging = staged.path.clone();
        match tokio::task::spawn_blocking(move || store.commit_blocking(staged, meta)).await {
            Ok(result) => result,
            Err(e) => {
                remove_staged(&staging).await;
                Err(UploadError::Io(io::Error::other(e)))
            }
        }
    }

    fn commit_blocking(
        &self,
        staged: StagedUpload,
        meta: UploadMetadata,
    ) -> Result<InstalledModel, UploadError> {
        let name = Path::new(&staged.filename);
        let stem = name
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| staged.filename.clone());
        let extension = name
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let quantization = meta
            .quantization
            .filter(|q| !q.trim().is_empty())
            .or_else(|| infer_quantization(&staged.filename));
        let display_name = meta
            .display_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| stem.clone());
        let models_dir = &self.models_dir;
        let registered = self.registry.register(&slugify(&stem), |slug| NewInstalledModel {
            display_name,
            file_path: models_dir
                .join(format!("{slug}{extension}"))
                .to_string_lossy()
                .into_owned(),
            quantization,
            context_length: meta.context_length,
            parameter_count: meta.parameter_count,
            size_bytes: Some(staged.size_bytes),
            checksum_sha256: Some(staged.checksum.clone()),
        });
        let model = match registered {
            Ok(model) => model,
            Err(e) => {
                remove_staged_blocking(&staged.path);
                return Err(e.into());
            }
        };

        if let Err(e) = std::fs::rename(&staged.path, &model.file_path) {
            remove_staged_blocking(&staged.path);
            if let Err(cleanup) = self.registry.delete(model.id) {
                tracing::error!(model_id = model.id, error = %cleanup, "Failed to roll back model record");
            }
            return Err(e.into());
        }

        self.log_duplicates(&model, &staged.checksum);
        telemetry::record_model_upload(staged.size_bytes);
        tracing::info!(
            model_id = model.id,
            slug = %model.slug,
            size_bytes = staged.size_bytes,
            checksum = %staged.checksum,
            "Model uploaded"
        );
        Ok(model)
    }

    /// Drop a staged upload that will not be committed.
    pub async fn discard(&self, staged: StagedUpload) {
        remove_staged(&staged.path).await;
    }

    /// Delete a record and its file. A file already gone is not an error.
    ///
    /// Blocking; call from a blocking context.
    pub fn remove(&self, id: i64) -> Result<InstalledModel, UploadError> {
        let model = self.registry.delete(id)?;
        match std::fs::remove_file(&model.file_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(model_id = id, path = %model.file_path, "Model file already missing");
            }
            Err(e) => return Err(e.into()),
        }
        tracing::info!(model_id = id, slug = %model.slug, "Model deleted");
        Ok(model)
    }

    fn log_duplicates(&self, model: &InstalledModel, digest: &str) {
        match self.registry.find_by_checksum(digest) {
            Ok(same) => {
                let others: Vec<&str> = same
                    .iter()
                    .filter(|m| m.id != model.id)
                    .map(|m| m.slug.as_str())
                    .collect();
                if !others.is_empty() {
                    tracing::info!(slug = %model.slug, duplicates = ?others, "Identical content already installed");
                }
            }
            Err(e) => tracing::debug!(error = %e, "Checksum lookup failed"),
        }
    }
}

/// Final path component of a client-supplied filename, if any.
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or("").trim();
    if last.is_empty() || last == "." || last == ".." {
        return None;
    }
    Some(last.to_string())
}

async fn write_and_hash<R>(staging: &Path, mut reader: R) -> io::Result<(u64, String)>
where
    R: AsyncRead + Unpin,
{
    let mut file = tokio::fs::File::create(staging).await?;
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut written: u64 = 0;
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).await?;
        written += n as u64;
    }
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    let path = staging.to_path_buf();
    let digest = tokio::task::spawn_blocking(move || sha256_file(&path))
        .await
        .map_err(io::Error::other)??;
    Ok((written, digest))
}

async fn remove_staged(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        log_staged_removal(path, e);
    }
}

fn remove_staged_blocking(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        log_staged_removal(path, e);
    }
}

fn log_staged_removal(path: &Path, e: io::Error) {
    if e.kind() != io::ErrorKind::NotFound {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove staged upload");
    }
}
