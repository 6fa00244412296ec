//! Roidb subcommand: build (or load from cache) the ground-truth roidb.

use std::path::PathBuf;

use clap::Args;

use wider_pedestrian::{DatasetConfig, WiderPedestrian};

/// Arguments for the roidb subcommand
#[derive(Args, Debug)]
pub struct RoidbArgs {
    /// Image set to load (e.g. train, val).
    #[arg(long, default_value = "train")]
    pub image_set: String,

    /// Dataset root (contains 'annotations' and 'JPEGImages').
    #[arg(long)]
    pub data_dir: PathBuf,

    /// Directory for the roidb cache artifact.
    #[arg(long, default_value = "data/cache")]
    pub cache_dir: PathBuf,

    /// Explicit annotation file (disables the roidb cache).
    #[arg(long)]
    pub ann_file: Option<PathBuf>,

    /// Also append horizontally flipped records.
    #[arg(long)]
    pub flip: bool,
}

/// Run the roidb subcommand
pub fn run(args: &RoidbArgs) -> anyhow::Result<()> {
    let mut config = DatasetConfig::new(&args.data_dir, &args.cache_dir);
    if let Some(ann_file) = &args.ann_file {
        config = config.with_ann_file(ann_file);
    }

    let mut dataset = WiderPedestrian::new(&args.image_set, config)?;
    dataset.gt_roidb()?;
    if args.flip {
        dataset.append_flipped_images()?;
    }

    let roidb = dataset.gt_roidb()?.to_vec();
    let num_boxes: usize = roidb.iter().map(|r| r.num_boxes()).sum();
    let num_crowd: usize = roidb
        .iter()
        .map(|r| (0..r.num_boxes()).filter(|&i| r.gt_overlaps.is_crowd(i)).count())
        .sum();

    println!("dataset: {}", dataset.name());
    println!("images:  {}", dataset.num_images());
    println!("boxes:   {num_boxes} ({num_crowd} crowd)");
    for (i, name) in dataset.classes().names().iter().enumerate() {
        if i == 0 {
            continue;
        }
        let count: usize = roidb
            .iter()
            .map(|r| r.gt_classes.iter().filter(|&&c| c == i).count())
            .sum();
        println!("  {name}: {count}");
    }
    Ok(())
}
