//! Dataset path configuration.
//!
//! All paths the adapter touches derive from this struct; nothing reads
//! global state.

use std::path::{Path, PathBuf};

/// Filesystem layout of a WIDER Pedestrian devkit.
///
/// Expected structure under `data_dir`:
///
/// ```text
/// <data_dir>/
///   annotations/WiderPedestrian_<image_set>.json
///   JPEGImages/img<5-digit-id>.jpg
/// ```
///
/// `ann_file` overrides the default annotation location; setting it disables
/// the roidb cache, since the cache key only encodes the dataset name.
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub ann_file: Option<PathBuf>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/WiderPedestrian"),
            cache_dir: PathBuf::from("data/cache"),
            ann_file: None,
        }
    }
}

impl DatasetConfig {
    pub fn new(data_dir: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            cache_dir: cache_dir.into(),
            ann_file: None,
        }
    }

    /// Use an explicit annotation file instead of the devkit default.
    pub fn with_ann_file(mut self, ann_file: impl Into<PathBuf>) -> Self {
        self.ann_file = Some(ann_file.into());
        self
    }

    /// Annotation file for an image set, honoring the override.
    pub fn ann_file(&self, image_set: &str) -> PathBuf {
        match &self.ann_file {
            Some(path) => path.clone(),
            None => self
                .data_dir
                .join("annotations")
                .join(format!("WiderPedestrian_{image_set}.json")),
        }
    }

    /// Image path for an image id: `JPEGImages/img<5-digit-id>.jpg`.
    pub fn image_path(&self, id: i64) -> PathBuf {
        self.data_dir
            .join("JPEGImages")
            .join(format!("img{id:05}.jpg"))
    }

    /// Roidb cache artifact for a dataset name.
    pub fn cache_file(&self, name: &str) -> PathBuf {
        self.cache_dir.join(format!("{name}_gt_roidb.json"))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
