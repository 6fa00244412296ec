use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;

use wider_pedestrian::{DatasetConfig, DatasetError, OverlapRow, WiderPedestrian};

/// Lay out a minimal devkit: annotation file plus one image file on disk.
///
/// Image 1 (100x80) carries a clean box, a crowd region, an out-of-bounds
/// box, and a zero-area annotation; image 2 (60x60) carries a box with a
/// negative origin and a zero-width box.
fn write_devkit(root: &Path) -> PathBuf {
    let ann_dir = root.join("annotations");
    fs::create_dir_all(&ann_dir).unwrap();
    fs::create_dir_all(root.join("JPEGImages")).unwrap();
    fs::write(root.join("JPEGImages/img00001.jpg"), b"").unwrap();

    let dataset = json!({
        "images": [
            {"id": 1, "width": 100, "height": 80, "file_name": "img00001.jpg"},
            {"id": 2, "width": 60, "height": 60, "file_name": "img00002.jpg"}
        ],
        "annotations": [
            {"id": 1, "image_id": 1, "category_id": 1,
             "bbox": [10.0, 10.0, 41.0, 41.0], "area": 1681.0, "iscrowd": 0},
            {"id": 2, "image_id": 1, "category_id": 1,
             "bbox": [0.0, 0.0, 60.0, 60.0], "area": 3600.0, "iscrowd": 1},
            {"id": 3, "image_id": 1, "category_id": 1,
             "bbox": [90.0, 70.0, 50.0, 50.0], "area": 2500.0, "iscrowd": 0},
            {"id": 4, "image_id": 1, "category_id": 1,
             "bbox": [5.0, 5.0, 10.0, 10.0], "area": 0.0, "iscrowd": 0},
            {"id": 5, "image_id": 2, "category_id": 1,
             "bbox": [-10.0, -10.0, 30.0, 30.0], "area": 900.0, "iscrowd": 0},
            {"id": 6, "image_id": 2, "category_id": 1,
             "bbox": [5.0, 5.0, 0.0, 10.0], "area": 10.0, "iscrowd": 0}
        ],
        "categories": [
            {"id": 1, "name": "pedestrian"}
        ]
    });
    let ann_file = ann_dir.join("WiderPedestrian_val.json");
    fs::write(&ann_file, serde_json::to_vec(&dataset).unwrap()).unwrap();
    ann_file
}

fn dataset_at(root: &Path) -> WiderPedestrian {
    let config = DatasetConfig::new(root, root.join("cache"));
    WiderPedestrian::new("val", config).unwrap()
}

#[test]
fn conversion_clips_boxes_and_drops_invalid_annotations() {
    let temp = tempfile::tempdir().unwrap();
    write_devkit(temp.path());
    let mut dataset = dataset_at(temp.path());

    let roidb = dataset.gt_roidb().unwrap();
    assert_eq!(roidb.len(), 2);

    // Image 1: the zero-area annotation is gone, three survive.
    let r1 = &roidb[0];
    assert_eq!((r1.width, r1.height), (100, 80));
    assert_eq!(r1.boxes.len(), 3);
    assert_eq!(r1.boxes[0], [10, 10, 50, 50]);
    assert_eq!(r1.boxes[1], [0, 0, 59, 59]);
    // Out-of-bounds box clipped to the image frame.
    assert_eq!(r1.boxes[2], [90, 70, 99, 79]);
    assert_eq!(r1.gt_classes, vec![1, 1, 1]);
    assert_eq!(r1.seg_areas, vec![1681.0, 3600.0, 2500.0]);
    assert!(!r1.flipped);

    // Crowd row is all -1.0; regular rows are one-hot at the class.
    assert_eq!(r1.gt_overlaps.row(0), OverlapRow::Class(1));
    assert_eq!(r1.gt_overlaps.row(1), OverlapRow::Crowd);
    assert_eq!(r1.gt_overlaps.dense_row(0), vec![0.0, 1.0]);
    assert_eq!(r1.gt_overlaps.dense_row(1), vec![-1.0, -1.0]);

    // Image 2: negative origin clamps to zero; zero-width box survives
    // clipping as a degenerate x2 == x1 column.
    let r2 = &roidb[1];
    assert_eq!(r2.boxes[0], [0, 0, 29, 29]);
    assert_eq!(r2.boxes[1], [5, 5, 5, 14]);

    // Every surviving box is ordered and in-bounds.
    for r in roidb {
        for &[x1, y1, x2, y2] in &r.boxes {
            assert!(x1 <= x2 && y1 <= y2);
            assert!(x2 < r.width && y2 < r.height);
        }
    }
}

#[test]
fn second_call_serves_identical_records() {
    let temp = tempfile::tempdir().unwrap();
    write_devkit(temp.path());
    let mut dataset = dataset_at(temp.path());

    let first = dataset.gt_roidb().unwrap().to_vec();
    let second = dataset.gt_roidb().unwrap().to_vec();
    assert_eq!(first, second);
}

#[test]
fn cache_artifact_is_written_and_loaded_unvalidated() {
    let temp = tempfile::tempdir().unwrap();
    write_devkit(temp.path());

    let mut dataset = dataset_at(temp.path());
    assert!(dataset.uses_cache());
    let original = dataset.gt_roidb().unwrap().to_vec();

    let cache_file = temp.path().join("cache/WiderPedestrian_val_gt_roidb.json");
    assert!(cache_file.exists());

    // A fresh adapter reads the cache back, order preserved.
    let mut reloaded = dataset_at(temp.path());
    assert_eq!(reloaded.gt_roidb().unwrap(), original.as_slice());

    // Tamper with the cache: the hit path trusts it without revalidation.
    let mut cached: Vec<wider_pedestrian::ImageRecord> =
        serde_json::from_slice(&fs::read(&cache_file).unwrap()).unwrap();
    cached[0].width = 12345;
    fs::write(&cache_file, serde_json::to_vec(&cached).unwrap()).unwrap();

    let mut tampered = dataset_at(temp.path());
    assert_eq!(tampered.gt_roidb().unwrap()[0].width, 12345);
}

#[test]
fn ann_file_override_bypasses_the_cache() {
    let temp = tempfile::tempdir().unwrap();
    let ann_file = write_devkit(temp.path());

    // Populate the cache through the default path first.
    let mut cached_run = dataset_at(temp.path());
    cached_run.gt_roidb().unwrap();
    let cache_file = temp.path().join("cache/WiderPedestrian_val_gt_roidb.json");
    let mut cached: Vec<wider_pedestrian::ImageRecord> =
        serde_json::from_slice(&fs::read(&cache_file).unwrap()).unwrap();
    cached[0].width = 12345;
    fs::write(&cache_file, serde_json::to_vec(&cached).unwrap()).unwrap();

    let config = DatasetConfig::new(temp.path(), temp.path().join("cache"))
        .with_ann_file(&ann_file);
    let mut overridden = WiderPedestrian::new("val", config).unwrap();
    assert!(!overridden.uses_cache());
    // Records come from the annotation source, not the tampered cache.
    assert_eq!(overridden.gt_roidb().unwrap()[0].width, 100);
}

#[test]
fn append_flipped_doubles_once_then_fails_loudly() {
    let temp = tempfile::tempdir().unwrap();
    write_devkit(temp.path());
    let mut dataset = dataset_at(temp.path());

    let originals = dataset.gt_roidb().unwrap().to_vec();
    dataset.append_flipped_images().unwrap();

    assert_eq!(dataset.num_images(), 4);
    assert_eq!(dataset.image_index(), &[1, 2, 1, 2]);

    let roidb = dataset.gt_roidb().unwrap();
    assert_eq!(roidb.len(), 4);
    assert_eq!(&roidb[..2], originals.as_slice());

    // width=100, (10,10,50,50) -> (49,10,89,50)
    let flipped = &roidb[2];
    assert!(flipped.flipped);
    assert_eq!(flipped.boxes[0], [49, 10, 89, 50]);
    assert_eq!(flipped.gt_classes, originals[0].gt_classes);
    assert_eq!(flipped.seg_areas, originals[0].seg_areas);

    let err = dataset.append_flipped_images().unwrap_err();
    assert!(matches!(err, DatasetError::AlreadyFlipped));
    // The failed call must not have touched the state.
    assert_eq!(dataset.num_images(), 4);
    assert_eq!(dataset.gt_roidb().unwrap().len(), 4);
}

#[test]
fn image_paths_resolve_only_when_present_on_disk() {
    let temp = tempfile::tempdir().unwrap();
    write_devkit(temp.path());
    let dataset = dataset_at(temp.path());

    let path = dataset.image_path_from_index(1).unwrap();
    assert!(path.ends_with("JPEGImages/img00001.jpg"));
    assert_eq!(dataset.image_path_at(0).unwrap(), path);

    // Image 2 is annotated but its file is absent.
    let err = dataset.image_path_from_index(2).unwrap_err();
    assert!(matches!(err, DatasetError::NotFound(_)));
    assert!(dataset.image_path_at(1).is_err());
}

#[test]
fn missing_annotation_source_is_a_configuration_error() {
    let temp = tempfile::tempdir().unwrap();
    let config = DatasetConfig::new(temp.path(), temp.path().join("cache"));
    let err = WiderPedestrian::new("val", config).unwrap_err();
    assert!(matches!(err, DatasetError::Configuration { .. }));
}

#[test]
fn class_table_starts_with_background() {
    let temp = tempfile::tempdir().unwrap();
    write_devkit(temp.path());
    let dataset = dataset_at(temp.path());

    assert_eq!(dataset.num_classes(), 2);
    assert_eq!(dataset.classes().name(0), Some(wider_pedestrian::BACKGROUND));
    assert_eq!(dataset.classes().index("pedestrian"), Some(1));
    assert_eq!(dataset.classes().category_id("pedestrian"), Some(1));
}
