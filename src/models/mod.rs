//! Installed model registry and the upload pipeline feeding it.

pub mod checksum;
pub mod slug;

mod record;
mod registry;
mod upload;

pub use checksum::{sha256_file, sha256_reader};
pub use record::{InstalledModel, NewInstalledModel};
pub use registry::{ModelRegistry, RegistryError};
pub use slug::{infer_quantization, slugify};
pub use upload::{sanitize_filename, ModelStore, StagedUpload, UploadError, UploadMetadata};
