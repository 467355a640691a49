//! Merging an augmented annotation set into a VOC-style dataset.
//!
//! The augmented set ships its own train/val manifests, some of whose IDs
//! already belong to the base dataset's trainval list. Those are dropped; the
//! rest are appended to the base train list to form `train_aug.txt`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use seg_core::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::manifest::{read_manifest, read_manifest_or_empty, write_manifest};

/// Directory conventions of the augmented (SBD) and base (VOC) datasets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocLayout {
    /// Root of the augmented set (`train.txt`, `val.txt`, `cls/`, `img/`)
    pub aug_root: PathBuf,
    /// Root of the base set (`ImageSets/`, `SegmentationClassRaw/`, `JPEGImages/`)
    pub base_root: PathBuf,
}

impl VocLayout {
    pub fn new(aug_root: impl Into<PathBuf>, base_root: impl Into<PathBuf>) -> Self {
        Self {
            aug_root: aug_root.into(),
            base_root: base_root.into(),
        }
    }

    pub fn aug_train_list(&self) -> PathBuf {
        self.aug_root.join("train.txt")
    }

    pub fn aug_val_list(&self) -> PathBuf {
        self.aug_root.join("val.txt")
    }

    /// Label matrix of one augmented sample
    pub fn aug_label(&self, id: &str) -> PathBuf {
        self.aug_root.join("cls").join(format!("{id}.mat"))
    }

    /// JPEG of one augmented sample
    pub fn aug_image(&self, id: &str) -> PathBuf {
        self.aug_root.join("img").join(format!("{id}.jpg"))
    }

    fn image_sets(&self) -> PathBuf {
        self.base_root.join("ImageSets").join("Segmentation")
    }

    pub fn trainval_list(&self) -> PathBuf {
        self.image_sets().join("trainval.txt")
    }

    pub fn train_list(&self) -> PathBuf {
        self.image_sets().join("train.txt")
    }

    pub fn train_aug_list(&self) -> PathBuf {
        self.image_sets().join("train_aug.txt")
    }

    /// Directory receiving single-channel label PNGs
    pub fn label_dir(&self) -> PathBuf {
        self.base_root.join("SegmentationClassRaw")
    }

    /// Directory receiving copied JPEGs
    pub fn jpeg_dir(&self) -> PathBuf {
        self.base_root.join("JPEGImages")
    }
}

/// Augmented IDs that are not part of the reference trainval list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AugSelection {
    pub train: Vec<String>,
    pub val: Vec<String>,
}

impl AugSelection {
    /// Surviving train IDs followed by surviving val IDs
    pub fn all(&self) -> impl Iterator<Item = &String> {
        self.train.iter().chain(self.val.iter())
    }

    pub fn len(&self) -> usize {
        self.train.len() + self.val.len()
    }

    pub fn is_empty(&self) -> bool {
        self.train.is_empty() && self.val.is_empty()
    }
}

/// Keeps, in order, every aug ID that does not appear in `reference`.
pub fn remove_duplicates(
    aug_train: &[String],
    aug_val: &[String],
    reference: &[String],
) -> AugSelection {
    let reference: HashSet<&str> = reference.iter().map(String::as_str).collect();
    let keep = |ids: &[String]| -> Vec<String> {
        ids.iter()
            .filter(|id| !reference.contains(id.as_str()))
            .cloned()
            .collect()
    };

    AugSelection {
        train: keep(aug_train),
        val: keep(aug_val),
    }
}

/// Reads the three manifests of `layout` and filters the aug lists.
///
/// Missing manifests count as empty.
pub fn select_aug_ids(layout: &VocLayout) -> Result<AugSelection> {
    let aug_train = read_manifest_or_empty(&layout.aug_train_list())?;
    let aug_val = read_manifest_or_empty(&layout.aug_val_list())?;
    let reference = read_manifest_or_empty(&layout.trainval_list())?;

    let selection = remove_duplicates(&aug_train, &aug_val, &reference);
    info!(
        "Aug train: {}/{} kept, aug val: {}/{} kept (reference trainval has {})",
        selection.train.len(),
        aug_train.len(),
        selection.val.len(),
        aug_val.len(),
        reference.len()
    );
    Ok(selection)
}

/// Original train list plus both filtered aug lists, sorted, not deduplicated
pub fn merge_train_lists(original_train: &[String], selection: &AugSelection) -> Vec<String> {
    let mut merged: Vec<String> = original_train
        .iter()
        .chain(selection.all())
        .cloned()
        .collect();
    merged.sort();
    merged
}

/// Writes the merged train list to `output`.
///
/// Returns `Ok(None)` without writing anything when `original_train` does not exist.
pub fn build_train_aug(
    original_train: &Path,
    selection: &AugSelection,
    output: &Path,
) -> Result<Option<usize>> {
    if !original_train.is_file() {
        debug!(
            "Original train list {} is absent, skipping merged list",
            original_train.display()
        );
        return Ok(None);
    }

    let original = read_manifest(original_train)?;
    let merged = merge_train_lists(&original, selection);
    write_manifest(output, &merged)?;

    info!("Merged train list: {} entries -> {}", merged.len(), output.display());
    Ok(Some(merged.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_reference_ids_are_removed_in_order() {
        let aug_train = ids(&["c", "a", "x", "b"]);
        let aug_val = ids(&["y", "a", "z"]);
        let reference = ids(&["a", "b"]);

        let selection = remove_duplicates(&aug_train, &aug_val, &reference);
        assert_eq!(selection.train, ids(&["c", "x"]));
        assert_eq!(selection.val, ids(&["y", "z"]));
        assert_eq!(selection.len(), 4);
    }

    #[test]
    fn test_cross_list_duplicates_are_kept() {
        let aug_train = ids(&["a", "a"]);
        let aug_val = ids(&["a"]);

        let selection = remove_duplicates(&aug_train, &aug_val, &[]);
        assert_eq!(selection.train, ids(&["a", "a"]));
        assert_eq!(selection.val, ids(&["a"]));
    }

    #[test]
    fn test_merge_is_sorted_union() {
        let original = ids(&["m", "b"]);
        let selection = AugSelection {
            train: ids(&["z", "b"]),
            val: ids(&["a"]),
        };

        assert_eq!(
            merge_train_lists(&original, &selection),
            ids(&["a", "b", "b", "m", "z"])
        );
    }

    #[test]
    fn test_build_train_aug_skips_without_original() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("train_aug.txt");

        let result = build_train_aug(
            &temp_dir.path().join("train.txt"),
            &AugSelection::default(),
            &output,
        )
        .unwrap();

        assert_eq!(result, None);
        assert!(!output.exists());
    }

    #[test]
    fn test_select_aug_ids_from_layout() {
        let temp_dir = TempDir::new().unwrap();
        let layout = VocLayout::new(temp_dir.path().join("aug"), temp_dir.path().join("voc"));

        write_manifest(&layout.aug_train_list(), &["1", "2", "3"]).unwrap();
        write_manifest(&layout.aug_val_list(), &["4", "5"]).unwrap();
        write_manifest(&layout.trainval_list(), &["2", "5"]).unwrap();
        write_manifest(&layout.train_list(), &["2", "0"]).unwrap();

        let selection = select_aug_ids(&layout).unwrap();
        assert_eq!(selection.train, ids(&["1", "3"]));
        assert_eq!(selection.val, ids(&["4"]));

        let written = build_train_aug(&layout.train_list(), &selection, &layout.train_aug_list())
            .unwrap();
        assert_eq!(written, Some(5));
        assert_eq!(
            fs::read_to_string(layout.train_aug_list()).unwrap(),
            "0\n1\n2\n3\n4\n"
        );
    }

    #[test]
    fn test_missing_aug_lists_are_empty() {
        let temp_dir = TempDir::new().unwrap();
        let layout = VocLayout::new(temp_dir.path().join("aug"), temp_dir.path().join("voc"));

        let selection = select_aug_ids(&layout).unwrap();
        assert!(selection.is_empty());
    }

    #[test]
    fn test_layout_paths() {
        let layout = VocLayout::new("/sbd", "/voc");
        assert_eq!(layout.aug_label("2008_000002"), PathBuf::from("/sbd/cls/2008_000002.mat"));
        assert_eq!(layout.aug_image("2008_000002"), PathBuf::from("/sbd/img/2008_000002.jpg"));
        assert_eq!(
            layout.train_aug_list(),
            PathBuf::from("/voc/ImageSets/Segmentation/train_aug.txt")
        );
        assert_eq!(layout.label_dir(), PathBuf::from("/voc/SegmentationClassRaw"));
    }
}
