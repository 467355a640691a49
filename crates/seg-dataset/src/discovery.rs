//! Pairing of annotation layers with their background photos.
//!
//! The labeling tool exports, per photo, `<token><layer_suffix>` (the painted
//! mask) next to `<token><background_suffix>` (the photo). Discovery walks an
//! export tree, pairs the two by token and keeps only pairs whose files exist.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use seg_core::{Error, LayoutConfig, PathPair, Result};
use tracing::{info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::manifest::write_manifest;

/// File name of the background list written by [`write_pair_lists`]
pub const BACKGROUNDS_LIST: &str = "backgrounds.txt";

/// File name of the annotation list written by [`write_pair_lists`]
pub const SEGMENTATIONS_LIST: &str = "segmentations.txt";

/// Outcome of a discovery walk
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Valid pairs, in walk order of their annotation
    pub pairs: Vec<PathPair>,
    /// Annotations without an existing background
    pub invalid: Vec<PathBuf>,
}

impl Discovery {
    pub fn backgrounds(&self) -> Vec<String> {
        self.pairs
            .iter()
            .map(|p| p.background.to_string_lossy().into_owned())
            .collect()
    }

    pub fn annotations(&self) -> Vec<String> {
        self.pairs
            .iter()
            .map(|p| p.annotation.to_string_lossy().into_owned())
            .collect()
    }
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

/// Dotfiles and dot-directories, e.g. macOS `._*` resource forks
fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_str().is_some_and(|n| n.starts_with('.'))
}

/// Walks `data_root` and pairs annotations with backgrounds.
pub fn discover_pairs(data_root: &Path, layout: &LayoutConfig) -> Result<Discovery> {
    if !data_root.is_dir() {
        return Err(Error::NotFound(format!(
            "Data root not found: {}",
            data_root.display()
        )));
    }

    let mut annotations = Vec::new();
    let mut backgrounds = HashSet::new();

    let walker = WalkDir::new(data_root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

    for entry in walker {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if name.contains(&layout.layer_suffix) {
            annotations.push(entry.path().to_path_buf());
        }
        if name.contains(&layout.background_suffix) {
            backgrounds.insert(entry.path().to_path_buf());
        }
    }

    let mut discovery = Discovery::default();

    for annotation in annotations {
        if !annotation.is_file() {
            continue;
        }
        let Some(name) = file_name(&annotation) else {
            continue;
        };

        let token = name.replace(&layout.layer_suffix, "");
        let background = annotation
            .with_file_name(format!("{token}{}", layout.background_suffix));

        if backgrounds.contains(&background) && background.is_file() {
            discovery.pairs.push(PathPair::new(annotation, background));
        } else {
            warn!("Invalid annotation: {}", annotation.display());
            discovery.invalid.push(annotation);
        }
    }

    info!(
        "Discovered {} valid pairs, {} invalid annotations under {}",
        discovery.pairs.len(),
        discovery.invalid.len(),
        data_root.display()
    );
    Ok(discovery)
}

fn replace_list(path: &Path, entries: &[String], what: &str) -> Result<()> {
    if path.is_file() {
        info!("Remove old {} list...", what);
        fs::remove_file(path)?;
    }
    write_manifest(path, entries)
}

/// Writes `backgrounds.txt` and `segmentations.txt` into `output_dir`,
/// replacing earlier versions.
pub fn write_pair_lists(discovery: &Discovery, output_dir: &Path) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(output_dir)?;

    let backgrounds_path = output_dir.join(BACKGROUNDS_LIST);
    replace_list(&backgrounds_path, &discovery.backgrounds(), "backgrounds")?;

    let annotations_path = output_dir.join(SEGMENTATIONS_LIST);
    replace_list(&annotations_path, &discovery.annotations(), "annotations")?;

    Ok((backgrounds_path, annotations_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::read_manifest;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    fn export_tree(root: &Path) {
        touch(&root.join("car_a/img1_0000_Layer 1.jpg"));
        touch(&root.join("car_a/img1_0001_Background.jpg"));
        touch(&root.join("car_a/img2_0000_Layer 1.jpg"));
        touch(&root.join("car_b/img3_0000_Layer 1.jpg"));
        touch(&root.join("car_b/img3_0001_Background.jpg"));
        touch(&root.join("car_b/notes.txt"));
        // background in a different directory does not pair
        touch(&root.join("car_c/img2_0001_Background.jpg"));
    }

    #[test]
    fn test_discover_pairs() {
        let temp_dir = TempDir::new().unwrap();
        export_tree(temp_dir.path());

        let discovery = discover_pairs(temp_dir.path(), &LayoutConfig::default()).unwrap();

        assert_eq!(discovery.pairs.len(), 2);
        assert_eq!(discovery.invalid, vec![temp_dir.path().join("car_a/img2_0000_Layer 1.jpg")]);
        for pair in &discovery.pairs {
            assert!(pair.exists());
            assert_eq!(pair.annotation.parent(), pair.background.parent());
        }
        assert_eq!(
            discovery.pairs[0].background,
            temp_dir.path().join("car_a/img1_0001_Background.jpg")
        );
    }

    #[test]
    fn test_hidden_entries_are_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("car_a/img1_0000_Layer 1.jpg"));
        touch(&root.join("car_a/img1_0001_Background.jpg"));
        touch(&root.join("car_a/._img1_0000_Layer 1.jpg"));
        touch(&root.join("car_a/._img1_0001_Background.jpg"));
        touch(&root.join(".cache/img9_0000_Layer 1.jpg"));
        touch(&root.join(".cache/img9_0001_Background.jpg"));

        let discovery = discover_pairs(root, &LayoutConfig::default()).unwrap();

        assert_eq!(discovery.pairs.len(), 1);
        assert_eq!(discovery.pairs[0].annotation, root.join("car_a/img1_0000_Layer 1.jpg"));
        assert!(discovery.invalid.is_empty());
    }

    #[test]
    fn test_hidden_data_root_is_walked() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join(".export");
        touch(&root.join("img1_0000_Layer 1.jpg"));
        touch(&root.join("img1_0001_Background.jpg"));

        let discovery = discover_pairs(&root, &LayoutConfig::default()).unwrap();
        assert_eq!(discovery.pairs.len(), 1);
    }

    #[test]
    fn test_directory_named_like_annotation_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("odd_0000_Layer 1.jpg")).unwrap();

        let discovery = discover_pairs(temp_dir.path(), &LayoutConfig::default()).unwrap();
        assert!(discovery.pairs.is_empty());
        assert!(discovery.invalid.is_empty());
    }

    #[test]
    fn test_custom_suffixes() {
        let temp_dir = TempDir::new().unwrap();
        touch(&temp_dir.path().join("x_mask.png"));
        touch(&temp_dir.path().join("x_photo.jpg"));

        let layout = LayoutConfig {
            layer_suffix: "_mask.png".to_string(),
            background_suffix: "_photo.jpg".to_string(),
        };
        let discovery = discover_pairs(temp_dir.path(), &layout).unwrap();
        assert_eq!(discovery.pairs.len(), 1);
    }

    #[test]
    fn test_write_pair_lists_replaces_old_files() {
        let temp_dir = TempDir::new().unwrap();
        let data = temp_dir.path().join("data");
        let lists = temp_dir.path().join("lists");
        export_tree(&data);
        touch(&lists.join(BACKGROUNDS_LIST));
        fs::write(lists.join(BACKGROUNDS_LIST), "stale\nstale\nstale\n").unwrap();

        let discovery = discover_pairs(&data, &LayoutConfig::default()).unwrap();
        let (bg_path, seg_path) = write_pair_lists(&discovery, &lists).unwrap();

        let backgrounds = read_manifest(&bg_path).unwrap();
        let segmentations = read_manifest(&seg_path).unwrap();
        assert_eq!(backgrounds.len(), 2);
        assert_eq!(backgrounds.len(), segmentations.len());
        for (bg, seg) in backgrounds.iter().zip(&segmentations) {
            assert_eq!(
                bg.replace("_0001_Background.jpg", ""),
                seg.replace("_0000_Layer 1.jpg", "")
            );
        }
    }

    #[test]
    fn test_missing_root() {
        let result = discover_pairs(Path::new("/nonexistent/export"), &LayoutConfig::default());
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
