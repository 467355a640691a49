//! Conversion of augmented `.mat` labels into the base dataset's PNG convention.

use std::fs;
use std::path::{Path, PathBuf};

use image::GrayImage;
use seg_core::{Error, Result};
use tracing::{debug, info};

use crate::copy::copy_preserving_times;
use crate::mat::{MatArray, MatFile};
use crate::merge::{AugSelection, VocLayout};

/// Struct field holding the class-index matrix in SBD `cls/*.mat` files
pub const SEGMENTATION_FIELD: &str = "GTcls.Segmentation";

/// Casts a 2-D label matrix to 8 bits per pixel.
///
/// Out-of-range values saturate and NaN becomes 0.
pub fn label_image(array: &MatArray) -> Result<GrayImage> {
    let (height, width) = array.plane_dims()?;
    let pixels: Vec<u8> = array.data.iter().map(|&v| v as u8).collect();

    GrayImage::from_raw(width as u32, height as u32, pixels).ok_or_else(|| {
        Error::Image(format!(
            "label matrix of {} values does not fill {}x{}",
            array.data.len(),
            width,
            height
        ))
    })
}

/// Writes a label matrix as a single-channel 8-bit PNG
pub fn save_label_png(array: &MatArray, path: &Path) -> Result<()> {
    let image = label_image(array)?;
    image
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|e| Error::Image(format!("Failed to save {}: {e}", path.display())))
}

/// Converts one augmented sample: label PNG plus a copy of its JPEG.
///
/// Returns the written label path.
pub fn convert_aug_sample(layout: &VocLayout, id: &str) -> Result<PathBuf> {
    let mat = MatFile::open(&layout.aug_label(id))?;
    let segmentation = mat.numeric(SEGMENTATION_FIELD)?;

    let label_path = layout.label_dir().join(format!("{id}.png"));
    save_label_png(segmentation, &label_path)?;

    let image_path = layout.aug_image(id);
    let jpeg_path = layout.jpeg_dir().join(format!("{id}.jpg"));
    copy_preserving_times(&image_path, &jpeg_path)?;

    debug!("Converted {} -> {}", id, label_path.display());
    Ok(label_path)
}

/// Creates the output directories of the base dataset
pub fn prepare_output_dirs(layout: &VocLayout) -> Result<()> {
    fs::create_dir_all(layout.label_dir())?;
    fs::create_dir_all(layout.jpeg_dir())?;
    Ok(())
}

/// Converts every selected sample; the first failure aborts.
///
/// `on_done` runs after each converted sample with its ID.
pub fn copy_aug_annotations<F>(
    layout: &VocLayout,
    selection: &AugSelection,
    mut on_done: F,
) -> Result<usize>
where
    F: FnMut(&str),
{
    prepare_output_dirs(layout)?;

    let mut converted = 0;
    for id in selection.all() {
        convert_aug_sample(layout, id)?;
        on_done(id);
        converted += 1;
    }

    info!("Converted {} augmented annotations", converted);
    Ok(converted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mat::tests::{gtcls_struct, mat_file};
    use tempfile::TempDir;

    fn write_aug_sample(layout: &VocLayout, id: &str, rows: &[&[u8]]) {
        fs::create_dir_all(layout.aug_root.join("cls")).unwrap();
        fs::create_dir_all(layout.aug_root.join("img")).unwrap();
        fs::write(layout.aug_label(id), mat_file(&[gtcls_struct(rows)])).unwrap();
        let img = image::RgbImage::from_pixel(3, 2, image::Rgb([10, 20, 30]));
        img.save_with_format(layout.aug_image(id), image::ImageFormat::Jpeg)
            .unwrap();
    }

    #[test]
    fn test_label_image_cast() {
        let array = MatArray {
            dims: vec![1, 4],
            data: vec![0.0, 15.0, 300.0, f64::NAN],
        };
        let image = label_image(&array).unwrap();
        assert_eq!(image.dimensions(), (4, 1));
        assert_eq!(image.as_raw(), &vec![0, 15, 255, 0]);
    }

    #[test]
    fn test_convert_aug_sample() {
        let temp_dir = TempDir::new().unwrap();
        let layout = VocLayout::new(temp_dir.path().join("aug"), temp_dir.path().join("voc"));
        write_aug_sample(&layout, "2008_000123", &[&[0, 1, 1], &[0, 255, 20]]);
        prepare_output_dirs(&layout).unwrap();

        let label_path = convert_aug_sample(&layout, "2008_000123").unwrap();

        let label = image::open(&label_path).unwrap().to_luma8();
        assert_eq!(label.dimensions(), (3, 2));
        assert_eq!(label.as_raw(), &vec![0, 1, 1, 0, 255, 20]);
        assert!(layout.jpeg_dir().join("2008_000123.jpg").is_file());
    }

    #[test]
    fn test_copy_aug_annotations_reports_each_id() {
        let temp_dir = TempDir::new().unwrap();
        let layout = VocLayout::new(temp_dir.path().join("aug"), temp_dir.path().join("voc"));
        write_aug_sample(&layout, "a", &[&[1, 2]]);
        write_aug_sample(&layout, "b", &[&[3], &[4]]);

        let selection = AugSelection {
            train: vec!["a".to_string()],
            val: vec!["b".to_string()],
        };
        let mut seen = Vec::new();
        let converted =
            copy_aug_annotations(&layout, &selection, |id| seen.push(id.to_string())).unwrap();

        assert_eq!(converted, 2);
        assert_eq!(seen, vec!["a", "b"]);
        assert!(layout.label_dir().join("b.png").is_file());
        assert!(layout.jpeg_dir().join("a.jpg").is_file());
    }

    #[test]
    fn test_missing_mat_aborts() {
        let temp_dir = TempDir::new().unwrap();
        let layout = VocLayout::new(temp_dir.path().join("aug"), temp_dir.path().join("voc"));
        write_aug_sample(&layout, "a", &[&[1]]);

        let selection = AugSelection {
            train: vec!["a".to_string(), "missing".to_string()],
            val: Vec::new(),
        };
        assert!(copy_aug_annotations(&layout, &selection, |_| {}).is_err());
        assert!(layout.label_dir().join("a.png").is_file());
    }
}
