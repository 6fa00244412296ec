//! Serde types for COCO-style annotation files.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::{CocoError, Result};

/// COCO image info.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CocoImage {
    pub id: i64,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub file_name: String,
}

/// COCO annotation for a single instance.
///
/// `bbox` is in [x, y, width, height] format (xywh). `score` is present only
/// on result annotations built from detector output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CocoAnnotation {
    #[serde(default)]
    pub id: i64,
    pub image_id: i64,
    pub category_id: i64,
    pub bbox: [f32; 4],
    pub area: f32,
    #[serde(default, deserialize_with = "deserialize_iscrowd")]
    pub iscrowd: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

// Annotation files in the wild carry iscrowd as 0/1 or as a bool.
fn deserialize_iscrowd<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IsCrowd {
        Bool(bool),
        Int(u8),
    }
    match IsCrowd::deserialize(deserializer)? {
        IsCrowd::Bool(b) => Ok(b),
        IsCrowd::Int(i) => Ok(i != 0),
    }
}

/// COCO category info.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CocoCategory {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub supercategory: Option<String>,
}

/// A COCO-style dataset (ground truth or results).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CocoDataset {
    #[serde(default)]
    pub images: Vec<CocoImage>,
    #[serde(default)]
    pub annotations: Vec<CocoAnnotation>,
    #[serde(default)]
    pub categories: Vec<CocoCategory>,
}

impl CocoDataset {
    /// Load an annotation file from disk.
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| CocoError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| CocoError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// One entry of the detection submission format.
///
/// `bbox` is [x, y, width, height] in pixels of the original image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub image_id: i64,
    pub category_id: i64,
    pub bbox: [f32; 4],
    pub score: f32,
}
