//! Bbox detection evaluation over the standard COCO IoU threshold ladder.
//!
//! Matching follows the pycocotools reference behavior:
//! - detections are matched to ground truth greedily in score-descending order
//! - crowd ground truth acts as "ignore": it can absorb any number of
//!   detections, and detections matched to it count as neither TP nor FP
//! - per image, at most `max_dets` detections per category are considered
//! - AP uses the 101-point interpolated precision curve

use std::cmp::Ordering;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::index::CocoIndex;
use crate::schema::CocoAnnotation;

const NUM_RECALL_POINTS: usize = 101;

/// Compute IoU between two boxes in xywh format.
pub fn compute_iou(box1: [f32; 4], box2: [f32; 4]) -> f32 {
    let [x1, y1, w1, h1] = box1;
    let [x2, y2, w2, h2] = box2;

    let inter_x_min = x1.max(x2);
    let inter_y_min = y1.max(y2);
    let inter_x_max = (x1 + w1).min(x2 + w2);
    let inter_y_max = (y1 + h1).min(y2 + h2);

    let inter_w = (inter_x_max - inter_x_min).max(0.0);
    let inter_h = (inter_y_max - inter_y_min).max(0.0);
    let inter_area = inter_w * inter_h;

    let union_area = w1 * h1 + w2 * h2 - inter_area;
    if union_area > 0.0 {
        inter_area / union_area
    } else {
        0.0
    }
}

/// Interpolated precision at 101 recall thresholds.
///
/// `detections` is (score, is_tp) sorted by score descending. The curve is
/// made monotonically decreasing with the reference backward pass, then
/// sampled at recall thresholds 0.00, 0.01, ..., 1.00 via searchsorted.
fn interpolated_precision(detections: &[(f32, bool)], num_gt: usize) -> Vec<f32> {
    let mut curve = vec![0.0f32; NUM_RECALL_POINTS];
    if num_gt == 0 || detections.is_empty() {
        return curve;
    }

    let mut tp_cumsum = 0usize;
    let mut fp_cumsum = 0usize;
    let mut precisions = Vec::with_capacity(detections.len());
    let mut recalls = Vec::with_capacity(detections.len());
    for &(_score, is_tp) in detections {
        if is_tp {
            tp_cumsum += 1;
        } else {
            fp_cumsum += 1;
        }
        precisions.push(tp_cumsum as f32 / (tp_cumsum + fp_cumsum) as f32);
        recalls.push(tp_cumsum as f32 / num_gt as f32);
    }

    // pr[i-1] = max(pr[i-1], pr[i])
    for i in (1..precisions.len()).rev() {
        if precisions[i] > precisions[i - 1] {
            precisions[i - 1] = precisions[i];
        }
    }

    for (r_ind, slot) in curve.iter_mut().enumerate() {
        let r_thresh = r_ind as f32 / (NUM_RECALL_POINTS - 1) as f32;
        let idx = recalls.partition_point(|&r| r < r_thresh);
        if idx < precisions.len() {
            *slot = precisions[idx];
        }
    }
    curve
}

/// Accumulated evaluation output.
///
/// `precision[t][k]` is the 101-point interpolated precision curve for IoU
/// threshold `t` and category `k`; `recall[t][k]` is the best recall reached.
/// Both are filled with `-1.0` for categories without ground truth, and
/// consumers must skip sentinel entries when averaging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalResult {
    pub iou_thresholds: Vec<f32>,
    pub recall_thresholds: Vec<f32>,
    pub category_ids: Vec<i64>,
    pub precision: Vec<Vec<Vec<f32>>>,
    pub recall: Vec<Vec<f32>>,
}

impl EvalResult {
    /// Mean AP over every defined precision entry (all thresholds).
    pub fn mean_ap(&self) -> f32 {
        mean_defined(self.precision.iter().flatten().flatten().copied())
    }

    /// AP at a single IoU threshold, if it is on the ladder.
    pub fn ap_at(&self, threshold: f32) -> Option<f32> {
        let t = self.threshold_index(threshold)?;
        Some(mean_defined(self.precision[t].iter().flatten().copied()))
    }

    /// Index of an IoU threshold on the ladder.
    pub fn threshold_index(&self, threshold: f32) -> Option<usize> {
        self.iou_thresholds
            .iter()
            .position(|&t| (t - threshold).abs() < 1e-5)
    }

    pub fn category_index(&self, category_id: i64) -> Option<usize> {
        self.category_ids.iter().position(|&c| c == category_id)
    }

    /// Mean recall over every defined entry, across all thresholds.
    pub fn mean_recall(&self) -> f32 {
        mean_defined(self.recall.iter().flatten().copied())
    }

    /// Print the summary table.
    pub fn summarize(&self) {
        println!(
            " Average Precision  (AP) @[ IoU=0.50:0.95 | area=   all | maxDets=100 ] = {:.3}",
            self.mean_ap()
        );
        println!(
            " Average Precision  (AP) @[ IoU=0.50      | area=   all | maxDets=100 ] = {:.3}",
            self.ap_at(0.5).unwrap_or(-1.0)
        );
        println!(
            " Average Precision  (AP) @[ IoU=0.75      | area=   all | maxDets=100 ] = {:.3}",
            self.ap_at(0.75).unwrap_or(-1.0)
        );
        println!(
            " Average Recall     (AR) @[ IoU=0.50:0.95 | area=   all | maxDets=100 ] = {:.3}",
            self.mean_recall()
        );
    }
}

fn mean_defined(values: impl Iterator<Item = f32>) -> f32 {
    let mut sum = 0.0f64;
    let mut count = 0usize;
    for v in values {
        if v > -1.0 {
            sum += v as f64;
            count += 1;
        }
    }
    if count == 0 {
        -1.0
    } else {
        (sum / count as f64) as f32
    }
}

/// Detection evaluator pairing a ground-truth index with a result index.
pub struct DetectionEval<'a> {
    gt: &'a CocoIndex,
    dt: &'a CocoIndex,
    iou_thresholds: Vec<f32>,
    max_dets: usize,
}

struct CategoryEval {
    /// (score, is_tp), globally sorted by score descending.
    detections: Vec<(f32, bool)>,
    /// Ground-truth count, crowd excluded.
    num_gt: usize,
}

impl<'a> DetectionEval<'a> {
    /// Evaluator with the native ladder (0.50:0.05:0.95) and maxDets=100.
    pub fn new(gt: &'a CocoIndex, dt: &'a CocoIndex) -> Self {
        let iou_thresholds = (0..10).map(|i| 0.5 + 0.05 * i as f32).collect();
        Self {
            gt,
            dt,
            iou_thresholds,
            max_dets: 100,
        }
    }

    pub fn iou_thresholds(&self) -> &[f32] {
        &self.iou_thresholds
    }

    /// Evaluate every (IoU threshold, category) cell and accumulate.
    pub fn run(&self) -> EvalResult {
        let category_ids = self.gt.category_ids();
        let image_ids = self.gt.image_ids();
        debug!(
            "evaluating {} detections against {} ground-truth annotations ({} images, {} categories)",
            self.dt.num_annotations(),
            self.gt.num_annotations(),
            image_ids.len(),
            category_ids.len()
        );
        let recall_thresholds: Vec<f32> = (0..NUM_RECALL_POINTS)
            .map(|i| i as f32 / (NUM_RECALL_POINTS - 1) as f32)
            .collect();

        let mut precision = Vec::with_capacity(self.iou_thresholds.len());
        let mut recall = Vec::with_capacity(self.iou_thresholds.len());
        for &iou_thresh in &self.iou_thresholds {
            let mut precision_t = Vec::with_capacity(category_ids.len());
            let mut recall_t = Vec::with_capacity(category_ids.len());
            for &cat_id in &category_ids {
                let eval = self.evaluate_category(&image_ids, cat_id, iou_thresh);
                if eval.num_gt == 0 {
                    precision_t.push(vec![-1.0; NUM_RECALL_POINTS]);
                    recall_t.push(-1.0);
                } else {
                    let tp_count = eval.detections.iter().filter(|(_, tp)| *tp).count();
                    precision_t.push(interpolated_precision(&eval.detections, eval.num_gt));
                    recall_t.push(tp_count as f32 / eval.num_gt as f32);
                }
            }
            precision.push(precision_t);
            recall.push(recall_t);
        }

        EvalResult {
            iou_thresholds: self.iou_thresholds.clone(),
            recall_thresholds,
            category_ids,
            precision,
            recall,
        }
    }

    /// Match detections against ground truth for one category and threshold.
    fn evaluate_category(&self, image_ids: &[i64], category_id: i64, iou_thresh: f32) -> CategoryEval {
        let mut all_detections: Vec<(f32, bool)> = Vec::new();
        let mut total_gt = 0usize;

        for &image_id in image_ids {
            let gts: Vec<&CocoAnnotation> = self
                .gt
                .annotations_for_image(image_id)
                .into_iter()
                .filter(|a| a.category_id == category_id)
                .collect();
            total_gt += gts.iter().filter(|g| !g.iscrowd).count();

            let mut dets: Vec<&CocoAnnotation> = self
                .dt
                .annotations_for_image(image_id)
                .into_iter()
                .filter(|a| a.category_id == category_id)
                .collect();
            dets.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(Ordering::Equal)
            });
            dets.truncate(self.max_dets);

            // Non-crowd ground truth is matched first.
            let mut gt_order: Vec<usize> = (0..gts.len()).collect();
            gt_order.sort_by_key(|&i| gts[i].iscrowd as u8);

            let mut gt_matched = vec![false; gts.len()];
            for det in &dets {
                let mut best_iou = iou_thresh;
                let mut best_gt: Option<usize> = None;
                for &gt_idx in &gt_order {
                    let gt = gts[gt_idx];
                    if gt_matched[gt_idx] && !gt.iscrowd {
                        continue;
                    }
                    // Once a real match exists, crowd candidates cannot improve it.
                    if let Some(best) = best_gt {
                        if !gts[best].iscrowd && gt.iscrowd {
                            break;
                        }
                    }
                    let iou = compute_iou(det.bbox, gt.bbox);
                    if iou > best_iou {
                        best_iou = iou;
                        best_gt = Some(gt_idx);
                    }
                }

                let score = det.score.unwrap_or(0.0);
                match best_gt {
                    Some(gt_idx) if gts[gt_idx].iscrowd => {
                        // Absorbed by crowd: neither TP nor FP.
                    }
                    Some(gt_idx) => {
                        gt_matched[gt_idx] = true;
                        all_detections.push((score, true));
                    }
                    None => {
                        all_detections.push((score, false));
                    }
                }
            }
        }

        all_detections.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        CategoryEval {
            detections: all_detections,
            num_gt: total_gt,
        }
    }
}
