//! Data model for pinfold manifests.
//!
//! This crate defines the schema layer: fully pinned source records
//! (`SourceRecord`), per-component build modules (`BuildModule`), the
//! assembled manifest document (`Manifest`), and the supported target
//! architecture table (`Arch`). Serialization is deterministic: field
//! order is fixed by struct declaration and every collection is sorted
//! by a stable key before the document is written.

pub mod arch;
pub mod manifest;
pub mod module;
pub mod source;

pub use arch::{Arch, SUPPORTED_ARCHES};
pub use manifest::{assemble, BaseRecipe, Comments, Manifest, ManifestMeta, ReleaseNote};
pub use module::{BuildModule, BuildOptions};
pub use source::{Digest, SourceComment, SourceRecord};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("manifest I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("manifest serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("unverifiable source '{0}': every non-script source must carry a content digest")]
    UnpinnedSource(String),
    #[error("git source '{0}' is not pinned to a commit")]
    UnpinnedCommit(String),
}
