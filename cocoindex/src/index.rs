//! Indexed query API over a loaded annotation file.

use std::collections::HashMap;
use std::path::Path;

use crate::schema::{CocoAnnotation, CocoCategory, CocoDataset, CocoImage, DetectionResult};
use crate::{CocoError, Result};

/// An annotation index: a [`CocoDataset`] plus id-keyed lookup tables.
///
/// Query results preserve annotation-file order throughout, so callers can
/// rely on a stable image enumeration.
#[derive(Debug, Clone)]
pub struct CocoIndex {
    dataset: CocoDataset,
    imgs_by_id: HashMap<i64, usize>,
    cats_by_id: HashMap<i64, usize>,
    anns_by_image: HashMap<i64, Vec<usize>>,
}

impl CocoIndex {
    /// Build an index over an in-memory dataset.
    pub fn new(dataset: CocoDataset) -> Self {
        let imgs_by_id = dataset
            .images
            .iter()
            .enumerate()
            .map(|(i, img)| (img.id, i))
            .collect();
        let cats_by_id = dataset
            .categories
            .iter()
            .enumerate()
            .map(|(i, cat)| (cat.id, i))
            .collect();
        let mut anns_by_image: HashMap<i64, Vec<usize>> = HashMap::new();
        for (i, ann) in dataset.annotations.iter().enumerate() {
            anns_by_image.entry(ann.image_id).or_default().push(i);
        }
        Self {
            dataset,
            imgs_by_id,
            cats_by_id,
            anns_by_image,
        }
    }

    /// Load and index an annotation file.
    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self::new(CocoDataset::from_file(path)?))
    }

    /// Image ids in annotation-file order.
    pub fn image_ids(&self) -> Vec<i64> {
        self.dataset.images.iter().map(|img| img.id).collect()
    }

    pub fn images(&self) -> &[CocoImage] {
        &self.dataset.images
    }

    pub fn image(&self, id: i64) -> Option<&CocoImage> {
        self.imgs_by_id.get(&id).map(|&i| &self.dataset.images[i])
    }

    pub fn categories(&self) -> &[CocoCategory] {
        &self.dataset.categories
    }

    /// Category ids in annotation-file order.
    pub fn category_ids(&self) -> Vec<i64> {
        self.dataset.categories.iter().map(|cat| cat.id).collect()
    }

    pub fn category(&self, id: i64) -> Option<&CocoCategory> {
        self.cats_by_id
            .get(&id)
            .map(|&i| &self.dataset.categories[i])
    }

    /// All annotations (crowd and non-crowd) for an image, file order.
    pub fn annotations_for_image(&self, image_id: i64) -> Vec<&CocoAnnotation> {
        self.anns_by_image
            .get(&image_id)
            .map(|ixs| ixs.iter().map(|&i| &self.dataset.annotations[i]).collect())
            .unwrap_or_default()
    }

    pub fn num_annotations(&self) -> usize {
        self.dataset.annotations.len()
    }

    /// Build a result index from detector output.
    ///
    /// The result index shares images and categories with this ground-truth
    /// index; each entry becomes an annotation carrying its score, with
    /// `area = w * h` and sequential ids. A result naming an image id absent
    /// from the ground truth is rejected.
    pub fn with_results(&self, results: &[DetectionResult]) -> Result<CocoIndex> {
        let mut annotations = Vec::with_capacity(results.len());
        for (i, det) in results.iter().enumerate() {
            if !self.imgs_by_id.contains_key(&det.image_id) {
                return Err(CocoError::UnknownImage(det.image_id));
            }
            annotations.push(CocoAnnotation {
                id: i as i64 + 1,
                image_id: det.image_id,
                category_id: det.category_id,
                bbox: det.bbox,
                area: det.bbox[2] * det.bbox[3],
                iscrowd: false,
                score: Some(det.score),
            });
        }
        Ok(CocoIndex::new(CocoDataset {
            images: self.dataset.images.clone(),
            annotations,
            categories: self.dataset.categories.clone(),
        }))
    }
}
