//! Error definitions for the dataset adapter.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DatasetError>;

#[derive(Debug, Error)]
pub enum DatasetError {
    /// The annotation source could not be loaded or is malformed.
    #[error("failed to load annotation source {path}: {source}")]
    Configuration {
        path: PathBuf,
        #[source]
        source: cocoindex::CocoError,
    },
    /// An image file expected on disk is missing.
    #[error("path does not exist: {0}")]
    NotFound(PathBuf),
    /// Flip augmentation was requested a second time; a second pass would
    /// duplicate already-mirrored records and break the index/roidb pairing.
    #[error("flipped images have already been appended")]
    AlreadyFlipped,
    /// An annotation names a category id absent from the category list.
    #[error("unknown category id {0}")]
    UnknownCategory(i64),
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("json error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Coco(#[from] cocoindex::CocoError),
}
