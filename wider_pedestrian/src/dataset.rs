//! The WIDER Pedestrian dataset adapter.
//!
//! Wraps an annotation index and exposes the roidb interface a detection
//! training loop consumes: a stable image-id index, per-image ground-truth
//! records (with an on-disk cache), horizontal-flip augmentation, and
//! serialization of detector output back into the submission format for
//! evaluation against ground truth.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use cocoindex::{CocoIndex, DetectionEval, DetectionResult, EvalResult};
use log::{debug, info, warn};
use uuid::Uuid;

use crate::class_table::ClassTable;
use crate::config::DatasetConfig;
use crate::error::{DatasetError, Result};
use crate::record::{GtOverlaps, ImageRecord, OverlapRow};

/// Detected boxes indexed `[class][image]`, each entry a list of
/// `(x1, y1, x2, y2, score)` rows. Class 0 is background and is skipped.
pub type ClassBoxes = Vec<Vec<Vec<[f32; 5]>>>;

/// Result-file naming and cleanup behavior for evaluation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalOptions {
    /// Append a random unique token to the results filename, so concurrent
    /// evaluation jobs writing into the same directory do not collide.
    pub use_salt: bool,
    /// Delete the results file once evaluation finishes.
    pub cleanup: bool,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            use_salt: true,
            cleanup: true,
        }
    }
}

const IOU_LO_THRESH: f32 = 0.5;
const IOU_HI_THRESH: f32 = 0.95;

/// Dataset adapter over a COCO-annotated WIDER Pedestrian image set.
#[derive(Debug)]
pub struct WiderPedestrian {
    name: String,
    image_set: String,
    year: u32,
    config: DatasetConfig,
    coco: CocoIndex,
    classes: ClassTable,
    image_index: Vec<i64>,
    roidb: Option<Vec<ImageRecord>>,
    flipped: bool,
    use_cache: bool,
    eval_options: EvalOptions,
}

impl WiderPedestrian {
    /// Load the annotation index for an image set and build the class table
    /// and image-id index.
    pub fn new(image_set: &str, config: DatasetConfig) -> Result<Self> {
        let ann_file = config.ann_file(image_set);
        let coco = CocoIndex::from_file(&ann_file).map_err(|source| {
            DatasetError::Configuration {
                path: ann_file.clone(),
                source,
            }
        })?;
        let classes = ClassTable::new(coco.categories());
        let image_index = coco.image_ids();
        // An explicit annotation override bypasses the cache: the cache key
        // only encodes the dataset name, not the source file.
        let use_cache = config.ann_file.is_none();
        info!(
            "loaded {} images, {} classes from {}",
            image_index.len(),
            classes.num_classes(),
            ann_file.display()
        );
        Ok(Self {
            name: format!("WiderPedestrian_{image_set}"),
            image_set: image_set.to_string(),
            year: 2018,
            config,
            coco,
            classes,
            image_index,
            roidb: None,
            flipped: false,
            use_cache,
            eval_options: EvalOptions::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image_set(&self) -> &str {
        &self.image_set
    }

    pub fn year(&self) -> u32 {
        self.year
    }

    pub fn classes(&self) -> &ClassTable {
        &self.classes
    }

    pub fn num_classes(&self) -> usize {
        self.classes.num_classes()
    }

    /// Image ids in annotation order. After flip augmentation the index is
    /// self-concatenated, so ids are no longer unique; consumers must track
    /// flip state via record order.
    pub fn image_index(&self) -> &[i64] {
        &self.image_index
    }

    pub fn num_images(&self) -> usize {
        self.image_index.len()
    }

    pub fn image_id_at(&self, i: usize) -> i64 {
        self.image_index[i]
    }

    /// Whether the roidb may be served from the on-disk cache.
    pub fn uses_cache(&self) -> bool {
        self.use_cache
    }

    pub fn eval_options(&self) -> EvalOptions {
        self.eval_options
    }

    /// Per-record image widths, in roidb order.
    pub fn widths(&mut self) -> Result<Vec<u32>> {
        Ok(self.gt_roidb()?.iter().map(|r| r.width).collect())
    }

    /// Absolute path of an image id, verified to exist on disk.
    pub fn image_path_from_index(&self, id: i64) -> Result<PathBuf> {
        let path = self.config.image_path(id);
        if !path.exists() {
            return Err(DatasetError::NotFound(path));
        }
        Ok(path)
    }

    /// Absolute path of image `i` in the image sequence.
    pub fn image_path_at(&self, i: usize) -> Result<PathBuf> {
        self.image_path_from_index(self.image_index[i])
    }

    /// The database of ground-truth regions of interest.
    ///
    /// Built lazily: served from the cache artifact when present and caching
    /// is enabled (unvalidated against the annotation source), otherwise
    /// computed from every image's annotations in index order and persisted
    /// to the cache path before returning.
    pub fn gt_roidb(&mut self) -> Result<&[ImageRecord]> {
        if self.roidb.is_none() {
            self.roidb = Some(self.build_roidb()?);
        }
        Ok(self.roidb.as_deref().unwrap_or_default())
    }

    fn build_roidb(&self) -> Result<Vec<ImageRecord>> {
        let cache_file = self.config.cache_file(&self.name);
        if self.use_cache && cache_file.exists() {
            let file = File::open(&cache_file).map_err(|source| DatasetError::Io {
                path: cache_file.clone(),
                source,
            })?;
            let roidb: Vec<ImageRecord> = serde_json::from_reader(BufReader::new(file))
                .map_err(|source| DatasetError::Json {
                    path: cache_file.clone(),
                    source,
                })?;
            info!("{} gt roidb loaded from {}", self.name, cache_file.display());
            return Ok(roidb);
        }

        let roidb: Vec<ImageRecord> = self
            .image_index
            .iter()
            .map(|&id| self.load_annotation(id))
            .collect::<Result<_>>()?;

        if let Some(parent) = cache_file.parent() {
            fs::create_dir_all(parent).map_err(|source| DatasetError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = File::create(&cache_file).map_err(|source| DatasetError::Io {
            path: cache_file.clone(),
            source,
        })?;
        serde_json::to_writer(BufWriter::new(file), &roidb).map_err(|source| {
            DatasetError::Json {
                path: cache_file.clone(),
                source,
            }
        })?;
        info!("wrote gt roidb to {}", cache_file.display());
        Ok(roidb)
    }

    /// Convert one image's annotations into a ground-truth record.
    ///
    /// Boxes are clipped to the image bounds; annotations with non-positive
    /// area or an inverted box after clipping are dropped. Crowd instances
    /// get an all -1.0 overlap row so training excludes them.
    pub fn load_annotation(&self, id: i64) -> Result<ImageRecord> {
        let img = self
            .coco
            .image(id)
            .ok_or(cocoindex::CocoError::UnknownImage(id))?;
        let (width, height) = (img.width, img.height);

        let mut boxes = Vec::new();
        let mut gt_classes = Vec::new();
        let mut rows = Vec::new();
        let mut seg_areas = Vec::new();
        for ann in self.coco.annotations_for_image(id) {
            let [bx, by, bw, bh] = ann.bbox;
            let x1 = bx.max(0.0);
            let y1 = by.max(0.0);
            let x2 = (width as f32 - 1.0).min(x1 + (bw - 1.0).max(0.0));
            let y2 = (height as f32 - 1.0).min(y1 + (bh - 1.0).max(0.0));
            if ann.area <= 0.0 || x2 < x1 || y2 < y1 {
                debug!("dropping invalid annotation {} on image {}", ann.id, id);
                continue;
            }
            let class = self
                .classes
                .class_of_category(ann.category_id)
                .ok_or(DatasetError::UnknownCategory(ann.category_id))?;
            boxes.push([x1 as u32, y1 as u32, x2 as u32, y2 as u32]);
            gt_classes.push(class);
            rows.push(if ann.iscrowd {
                OverlapRow::Crowd
            } else {
                OverlapRow::Class(class)
            });
            seg_areas.push(ann.area);
        }

        debug_assert!(boxes
            .iter()
            .all(|&[x1, y1, x2, y2]| x1 <= x2 && y1 <= y2 && x2 < width && y2 < height));

        Ok(ImageRecord {
            width,
            height,
            boxes,
            gt_classes,
            gt_overlaps: GtOverlaps::new(rows, self.classes.num_classes()),
            seg_areas,
            flipped: false,
        })
    }

    /// Append a horizontally mirrored copy of every record and double the
    /// image-id index by self-concatenation.
    ///
    /// One-shot: a second call fails with [`DatasetError::AlreadyFlipped`]
    /// instead of silently corrupting the index/roidb pairing.
    pub fn append_flipped_images(&mut self) -> Result<()> {
        if self.flipped {
            return Err(DatasetError::AlreadyFlipped);
        }
        let mirrored: Vec<ImageRecord> = self
            .gt_roidb()?
            .iter()
            .map(ImageRecord::flipped_copy)
            .collect();
        let count = mirrored.len();
        if let Some(roidb) = self.roidb.as_mut() {
            roidb.extend(mirrored);
        }
        let doubled = self.image_index.clone();
        self.image_index.extend(doubled);
        self.flipped = true;
        info!("appended {count} flipped records");
        Ok(())
    }

    /// Flatten per-class, per-image detections into submission entries.
    ///
    /// Output boxes switch from corner to width/height encoding with the
    /// inclusive-pixel convention `w = x2 - x1 + 1`, `h = y2 - y1 + 1`.
    fn results_from_boxes(&self, all_boxes: &ClassBoxes) -> Vec<DetectionResult> {
        let mut results = Vec::new();
        for (cls_ind, name) in self.classes.names().iter().enumerate() {
            if cls_ind == 0 {
                continue;
            }
            let Some(category_id) = self.classes.category_id(name) else {
                continue;
            };
            let Some(per_image) = all_boxes.get(cls_ind) else {
                continue;
            };
            debug!(
                "collecting {} results ({}/{})",
                name,
                cls_ind,
                self.num_classes() - 1
            );
            for (im_ind, dets) in per_image.iter().enumerate() {
                let image_id = self.image_index[im_ind];
                for &[x1, y1, x2, y2, score] in dets {
                    results.push(DetectionResult {
                        image_id,
                        category_id,
                        bbox: [x1, y1, x2 - x1 + 1.0, y2 - y1 + 1.0],
                        score,
                    });
                }
            }
        }
        results
    }

    /// Serialize detections as a JSON results file in the submission format.
    pub fn write_results_file(&self, all_boxes: &ClassBoxes, path: &Path) -> Result<()> {
        let results = self.results_from_boxes(all_boxes);
        info!(
            "writing {} results to {}",
            results.len(),
            path.display()
        );
        let file = File::create(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::to_writer(BufWriter::new(file), &results).map_err(|source| {
            DatasetError::Json {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    /// Write a results file, evaluate it against ground truth, print the
    /// metrics, and persist the raw evaluation result to `output_dir`.
    ///
    /// The results filename carries a unique suffix when `use_salt` is on;
    /// the file is removed afterwards when `cleanup` is on. The persisted
    /// `detection_results.json` has a fixed name and is overwritten.
    pub fn evaluate_detections(
        &self,
        all_boxes: &ClassBoxes,
        output_dir: &Path,
    ) -> Result<EvalResult> {
        fs::create_dir_all(output_dir).map_err(|source| DatasetError::Io {
            path: output_dir.to_path_buf(),
            source,
        })?;
        let mut stem = format!("detections_{}{}_results", self.image_set, self.year);
        if self.eval_options.use_salt {
            stem.push_str(&format!("_{}", Uuid::new_v4()));
        }
        let res_path = output_dir.join(format!("{stem}.json"));

        self.write_results_file(all_boxes, &res_path)?;
        let eval = self.do_detection_eval(&res_path, output_dir)?;

        if self.eval_options.cleanup {
            fs::remove_file(&res_path).map_err(|source| DatasetError::Io {
                path: res_path.clone(),
                source,
            })?;
        }
        Ok(eval)
    }

    /// Run evaluation from an on-disk results file.
    fn do_detection_eval(&self, res_file: &Path, output_dir: &Path) -> Result<EvalResult> {
        let file = File::open(res_file).map_err(|source| DatasetError::Io {
            path: res_file.to_path_buf(),
            source,
        })?;
        let results: Vec<DetectionResult> = serde_json::from_reader(BufReader::new(file))
            .map_err(|source| DatasetError::Json {
                path: res_file.to_path_buf(),
                source,
            })?;

        let dt = self.coco.with_results(&results)?;
        let eval = DetectionEval::new(&self.coco, &dt).run();
        self.print_detection_eval_metrics(&eval);

        let eval_path = output_dir.join("detection_results.json");
        let file = File::create(&eval_path).map_err(|source| DatasetError::Io {
            path: eval_path.clone(),
            source,
        })?;
        serde_json::to_writer(BufWriter::new(file), &eval).map_err(|source| {
            DatasetError::Json {
                path: eval_path.clone(),
                source,
            }
        })?;
        info!("wrote detection eval results to {}", eval_path.display());
        Ok(eval)
    }

    /// Print mean and per-category AP over the 0.50–0.95 IoU band, then the
    /// summary table.
    fn print_detection_eval_metrics(&self, eval: &EvalResult) {
        let (Some(lo), Some(hi)) = (
            eval.threshold_index(IOU_LO_THRESH),
            eval.threshold_index(IOU_HI_THRESH),
        ) else {
            warn!("evaluation result does not cover the 0.50-0.95 IoU band");
            return;
        };
        println!(
            "~~~~ Mean and per-category AP @ IoU=[{IOU_LO_THRESH:.2},{IOU_HI_THRESH:.2}] ~~~~"
        );
        println!("{:.1}", 100.0 * band_mean_ap(eval, lo, hi, None));
        for (cls_ind, name) in self.classes.names().iter().enumerate() {
            if cls_ind == 0 {
                continue;
            }
            let Some(category_id) = self.classes.category_id(name) else {
                continue;
            };
            let Some(k) = eval.category_index(category_id) else {
                continue;
            };
            println!("{}: {:.1}", name, 100.0 * band_mean_ap(eval, lo, hi, Some(k)));
        }
        println!("~~~~ Summary metrics ~~~~");
        eval.summarize();
    }

    /// Competition mode keeps the submission file: salt and cleanup are both
    /// disabled while on, and both restored when turned off.
    pub fn competition_mode(&mut self, on: bool) {
        if on {
            self.eval_options.use_salt = false;
            self.eval_options.cleanup = false;
        } else {
            self.eval_options.use_salt = true;
            self.eval_options.cleanup = true;
        }
    }
}

/// Mean of the defined precision entries restricted to an inclusive
/// IoU-threshold band, optionally to a single category.
fn band_mean_ap(eval: &EvalResult, lo: usize, hi: usize, category: Option<usize>) -> f32 {
    let mut sum = 0.0f64;
    let mut count = 0usize;
    for t in lo..=hi {
        for (k, curve) in eval.precision[t].iter().enumerate() {
            if category.is_some_and(|c| c != k) {
                continue;
            }
            for &p in curve {
                if p > -1.0 {
                    sum += p as f64;
                    count += 1;
                }
            }
        }
    }
    if count == 0 {
        -1.0
    } else {
        (sum / count as f64) as f32
    }
}
