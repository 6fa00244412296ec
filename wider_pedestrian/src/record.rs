//! Per-image ground-truth records.

use serde::{Deserialize, Serialize};

/// Overlap value marking crowd rows: excluded from training.
pub const CROWD_OVERLAP: f32 = -1.0;

/// One row of the sparse N×C ground-truth overlap matrix.
///
/// A regular instance is one-hot at its class with value 1.0. A crowd
/// instance carries -1.0 across every class, the sentinel that excludes it
/// from per-instance training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlapRow {
    Class(usize),
    Crowd,
}

/// Sparse row-wise overlap matrix (N boxes × C classes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GtOverlaps {
    rows: Vec<OverlapRow>,
    num_classes: usize,
}

impl GtOverlaps {
    pub fn new(rows: Vec<OverlapRow>, num_classes: usize) -> Self {
        Self { rows, num_classes }
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn row(&self, i: usize) -> OverlapRow {
        self.rows[i]
    }

    pub fn is_crowd(&self, i: usize) -> bool {
        matches!(self.rows[i], OverlapRow::Crowd)
    }

    /// Matrix entry (row, class).
    pub fn value(&self, row: usize, class: usize) -> f32 {
        match self.rows[row] {
            OverlapRow::Crowd => CROWD_OVERLAP,
            OverlapRow::Class(c) if c == class => 1.0,
            OverlapRow::Class(_) => 0.0,
        }
    }

    /// One dense row of length `num_classes`.
    pub fn dense_row(&self, row: usize) -> Vec<f32> {
        (0..self.num_classes).map(|c| self.value(row, c)).collect()
    }
}

/// Ground-truth record for a single image.
///
/// `boxes` are (x1, y1, x2, y2) pixel coordinates clipped to
/// `[0, width-1] × [0, height-1]`, with `x2 >= x1` and `y2 >= y1` for every
/// row. `gt_classes`, `gt_overlaps` and `seg_areas` run parallel to `boxes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub width: u32,
    pub height: u32,
    pub boxes: Vec<[u32; 4]>,
    pub gt_classes: Vec<usize>,
    pub gt_overlaps: GtOverlaps,
    pub seg_areas: Vec<f32>,
    pub flipped: bool,
}

impl ImageRecord {
    pub fn num_boxes(&self) -> usize {
        self.boxes.len()
    }

    /// Horizontally mirrored copy of this record.
    ///
    /// Boxes map as `x1' = width - x2 - 1`, `x2' = width - x1 - 1`; classes,
    /// overlaps and areas are carried over unchanged.
    pub fn flipped_copy(&self) -> ImageRecord {
        let boxes = self
            .boxes
            .iter()
            .map(|&[x1, y1, x2, y2]| {
                let new_x1 = self.width - x2 - 1;
                let new_x2 = self.width - x1 - 1;
                assert!(new_x2 >= new_x1);
                [new_x1, y1, new_x2, y2]
            })
            .collect();
        ImageRecord {
            width: self.width,
            height: self.height,
            boxes,
            gt_classes: self.gt_classes.clone(),
            gt_overlaps: self.gt_overlaps.clone(),
            seg_areas: self.seg_areas.clone(),
            flipped: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ImageRecord {
        ImageRecord {
            width: 100,
            height: 80,
            boxes: vec![[10, 10, 50, 50], [0, 0, 99, 79]],
            gt_classes: vec![1, 1],
            gt_overlaps: GtOverlaps::new(vec![OverlapRow::Class(1), OverlapRow::Crowd], 2),
            seg_areas: vec![1681.0, 8000.0],
            flipped: false,
        }
    }

    #[test]
    fn overlap_rows_are_one_hot_or_crowd() {
        let overlaps = GtOverlaps::new(vec![OverlapRow::Class(1), OverlapRow::Crowd], 3);
        assert_eq!(overlaps.dense_row(0), vec![0.0, 1.0, 0.0]);
        assert_eq!(overlaps.dense_row(1), vec![-1.0, -1.0, -1.0]);
        assert!(!overlaps.is_crowd(0));
        assert!(overlaps.is_crowd(1));
    }

    #[test]
    fn flip_mirrors_x_coordinates() {
        let flipped = record().flipped_copy();
        // width=100, (10,10,50,50) -> (49,10,89,50)
        assert_eq!(flipped.boxes[0], [49, 10, 89, 50]);
        // A full-frame box stays full-frame.
        assert_eq!(flipped.boxes[1], [0, 0, 99, 79]);
        assert!(flipped.flipped);
    }

    #[test]
    fn flip_preserves_labels_and_areas() {
        let original = record();
        let flipped = original.flipped_copy();
        assert_eq!(flipped.gt_classes, original.gt_classes);
        assert_eq!(flipped.gt_overlaps, original.gt_overlaps);
        assert_eq!(flipped.seg_areas, original.seg_areas);
        assert_eq!(flipped.height, original.height);
    }

    #[test]
    fn record_round_trips_through_json() {
        let original = record();
        let json = serde_json::to_string(&original).unwrap();
        let back: ImageRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, original);
    }
}
