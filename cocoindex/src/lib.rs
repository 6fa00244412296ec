//! COCO-style annotation index and detection evaluation.
//!
//! This crate provides:
//! - serde types for COCO-style annotation files (images, annotations, categories)
//! - An indexed query API over a loaded annotation file ([`CocoIndex`])
//! - A detection-results overlay that turns submission-format entries into a
//!   result index sharing images and categories with the ground truth
//! - Bbox detection evaluation over the standard IoU threshold ladder
//!   ([`DetectionEval`] / [`EvalResult`])

use std::path::PathBuf;

use thiserror::Error;

pub mod eval;
pub mod index;
pub mod schema;

pub use eval::{DetectionEval, EvalResult};
pub use index::CocoIndex;
pub use schema::{CocoAnnotation, CocoCategory, CocoDataset, CocoImage, DetectionResult};

/// Errors raised while loading or querying an annotation index.
#[derive(Debug, Error)]
pub enum CocoError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("json parse error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("result references unknown image id {0}")]
    UnknownImage(i64),
}

pub type Result<T> = std::result::Result<T, CocoError>;
