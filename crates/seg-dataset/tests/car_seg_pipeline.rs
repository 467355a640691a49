//! End-to-end run of the car-part preparation jobs on a synthetic export tree.

use std::fs;
use std::path::Path;

use image::{Rgb, RgbImage};
use seg_core::{DataSplit, LayoutConfig, QuantizeConfig, SplitOrder};
use seg_dataset::discovery::{BACKGROUNDS_LIST, SEGMENTATIONS_LIST};
use seg_dataset::quantize::read_indexed_png;
use seg_dataset::{
    collect_pool, convert_masks, copy_backgrounds, discover_pairs, read_manifest,
    write_pair_lists, FoldSplit, Palette,
};
use tempfile::TempDir;

fn save_jpeg(path: &Path, color: [u8; 3]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    RgbImage::from_pixel(16, 16, Rgb(color)).save(path).unwrap();
}

#[test]
fn test_car_seg_pipeline() {
    let temp_dir = TempDir::new().unwrap();
    let export = temp_dir.path().join("export");
    let lists = temp_dir.path().join("lists");
    let jpeg_folder = temp_dir.path().join("JPEGImages");
    let split_folder = temp_dir.path().join("ImageSets");
    let seg_folder = temp_dir.path().join("SegmentationClass");

    save_jpeg(&export.join("car_a/img1_0000_Layer 1.jpg"), [250, 250, 250]);
    save_jpeg(&export.join("car_a/img1_0001_Background.jpg"), [90, 120, 30]);
    // annotation without a background
    save_jpeg(&export.join("car_a/img2_0000_Layer 1.jpg"), [250, 250, 250]);
    save_jpeg(&export.join("car_b/img3_0000_Layer 1.jpg"), [50, 250, 150]);
    save_jpeg(&export.join("car_b/img3_0001_Background.jpg"), [10, 10, 10]);

    let layout = LayoutConfig::default();
    let discovery = discover_pairs(&export, &layout).unwrap();
    assert_eq!(discovery.pairs.len(), 2);
    assert_eq!(discovery.invalid, vec![export.join("car_a/img2_0000_Layer 1.jpg")]);

    write_pair_lists(&discovery, &lists).unwrap();
    let backgrounds = read_manifest(&lists.join(BACKGROUNDS_LIST)).unwrap();
    let annotations = read_manifest(&lists.join(SEGMENTATIONS_LIST)).unwrap();
    assert_eq!(backgrounds.len(), annotations.len());

    let copied = copy_backgrounds(&backgrounds, &export, &jpeg_folder, |_| {}).unwrap();
    assert_eq!(copied.len(), 2);
    assert!(jpeg_folder.join("car_a_img1_0001_Background.jpg").is_file());
    assert!(jpeg_folder.join("car_b_img3_0001_Background.jpg").is_file());

    let pool = collect_pool(&jpeg_folder, &layout.background_suffix, SplitOrder::Lexicographic)
        .unwrap();
    let split = FoldSplit::from_pool(pool, 5).unwrap();
    split.write_to(&split_folder).unwrap();
    assert_eq!(
        read_manifest(&split_folder.join(DataSplit::TrainVal.manifest_name())).unwrap(),
        vec!["car_a_img1", "car_b_img3"]
    );
    assert_eq!(split.get(DataSplit::Train), ["car_a_img1".to_string()]);
    assert_eq!(split.get(DataSplit::Validation), ["car_b_img3".to_string()]);

    let config = QuantizeConfig::default();
    let converted = convert_masks(&annotations, &export, &seg_folder, &config).unwrap();
    assert_eq!(converted.len(), 2);

    let palette = Palette::build(&config.colors, config.palette_seed).unwrap();
    let expected = [
        ("car_a_img1_0000_Layer 1.png", palette.class_id("hood").unwrap()),
        ("car_b_img3_0000_Layer 1.png", palette.class_id("trunk").unwrap()),
    ];
    for (name, class) in expected {
        let (labels, plte) = read_indexed_png(&seg_folder.join(name)).unwrap();
        assert_eq!(labels.dimensions(), (16, 16));
        assert!(labels.pixels().all(|p| p[0] == class), "{name} not uniformly {class}");
        assert_eq!(plte, palette.to_bytes());
    }
}
