//! Eval subcommand: score a detections file against ground truth.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use clap::Args;

use cocoindex::DetectionResult;
use wider_pedestrian::{ClassBoxes, DatasetConfig, WiderPedestrian};

/// Arguments for the eval subcommand
#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Image set to evaluate against (e.g. val).
    #[arg(long, default_value = "val")]
    pub image_set: String,

    /// Dataset root (contains 'annotations' and 'JPEGImages').
    #[arg(long)]
    pub data_dir: PathBuf,

    /// Directory for the roidb cache artifact.
    #[arg(long, default_value = "data/cache")]
    pub cache_dir: PathBuf,

    /// Detections to score: a JSON array of
    /// {image_id, category_id, bbox:[x,y,w,h], score} entries.
    #[arg(long)]
    pub detections: PathBuf,

    /// Output directory for evaluation results.
    #[arg(long, short, default_value = "eval_output")]
    pub output_dir: PathBuf,

    /// Competition mode: keep the submission file, no unique suffix.
    #[arg(long)]
    pub competition: bool,
}

/// Run the eval subcommand
pub fn run(args: &EvalArgs) -> anyhow::Result<()> {
    let config = DatasetConfig::new(&args.data_dir, &args.cache_dir);
    let mut dataset = WiderPedestrian::new(&args.image_set, config)?;
    if args.competition {
        dataset.competition_mode(true);
    }

    let file = File::open(&args.detections)?;
    let results: Vec<DetectionResult> = serde_json::from_reader(BufReader::new(file))?;
    println!(
        "scoring {} detections on {} ({} images)",
        results.len(),
        dataset.name(),
        dataset.num_images()
    );

    let all_boxes = group_results(&dataset, &results)?;
    dataset.evaluate_detections(&all_boxes, &args.output_dir)?;
    Ok(())
}

/// Regroup flat submission entries into the per-class, per-image structure
/// the adapter consumes, converting xywh back to corner coordinates.
fn group_results(
    dataset: &WiderPedestrian,
    results: &[DetectionResult],
) -> anyhow::Result<ClassBoxes> {
    let image_pos: HashMap<i64, usize> = dataset
        .image_index()
        .iter()
        .enumerate()
        .map(|(i, &id)| (id, i))
        .collect();

    let mut all_boxes: ClassBoxes =
        vec![vec![Vec::new(); dataset.num_images()]; dataset.num_classes()];
    for det in results {
        let Some(cls) = dataset.classes().class_of_category(det.category_id) else {
            anyhow::bail!("detections reference unknown category id {}", det.category_id);
        };
        let Some(&im_ind) = image_pos.get(&det.image_id) else {
            anyhow::bail!("detections reference unknown image id {}", det.image_id);
        };
        let [x, y, w, h] = det.bbox;
        all_boxes[cls][im_ind].push([x, y, x + w - 1.0, y + h - 1.0, det.score]);
    }
    Ok(all_boxes)
}
