//! WIDER Pedestrian roidb dataset adapter.
//!
//! Adapts a COCO-annotated pedestrian detection dataset into the roidb
//! interface consumed by a detection training/evaluation pipeline:
//! - discover images and ground-truth boxes from an annotation file
//! - normalize them into fixed-schema [`ImageRecord`]s, with an on-disk cache
//! - augment the dataset by horizontal flipping
//! - serialize detector output back into the submission format and score it
//!   against ground truth

pub mod class_table;
pub mod config;
pub mod dataset;
pub mod error;
pub mod record;

pub use class_table::{ClassTable, BACKGROUND};
pub use config::DatasetConfig;
pub use dataset::{ClassBoxes, EvalOptions, WiderPedestrian};
pub use error::{DatasetError, Result};
pub use record::{GtOverlaps, ImageRecord, OverlapRow, CROWD_OVERLAP};
