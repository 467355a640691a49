//! Core type definitions shared by the dataset jobs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use crate::Error;

/// An RGB color triple as painted in annotation masks.
pub type Rgb = [u8; 3];

/// Class name to canonical mask color. Iteration order (byte-wise by name)
/// defines the class ids.
pub type ColorMap = BTreeMap<String, Rgb>;

/// An annotation image and the background photo it was painted over.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PathPair {
    /// Hand-painted multi-color mask
    pub annotation: PathBuf,
    /// Original photo the mask belongs to
    pub background: PathBuf,
}

impl PathPair {
    /// Creates a new pair
    pub fn new(annotation: impl Into<PathBuf>, background: impl Into<PathBuf>) -> Self {
        Self {
            annotation: annotation.into(),
            background: background.into(),
        }
    }

    /// Whether both sides currently exist as regular files
    pub fn exists(&self) -> bool {
        self.annotation.is_file() && self.background.is_file()
    }
}

/// How the fold split orders its pool before slicing.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SplitOrder {
    /// Sort base names byte-wise; reproducible across platforms
    #[default]
    Lexicographic,
    /// Keep whatever order the directory listing yields
    Listing,
}

impl std::fmt::Display for SplitOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SplitOrder::Lexicographic => write!(f, "lexicographic"),
            SplitOrder::Listing => write!(f, "listing"),
        }
    }
}

impl FromStr for SplitOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lexicographic" | "sorted" => Ok(SplitOrder::Lexicographic),
            "listing" | "fs" => Ok(SplitOrder::Listing),
            other => Err(Error::InvalidArgument(format!(
                "unknown split order '{other}', expected 'lexicographic' or 'listing'"
            ))),
        }
    }
}

/// Data split type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DataSplit {
    /// Training data
    Train,
    /// Validation data
    Validation,
    /// Union of both
    TrainVal,
}

impl DataSplit {
    /// File name of the manifest holding this split
    pub fn manifest_name(&self) -> &'static str {
        match self {
            DataSplit::Train => "train.txt",
            DataSplit::Validation => "val.txt",
            DataSplit::TrainVal => "trainval.txt",
        }
    }
}

impl std::fmt::Display for DataSplit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSplit::Train => write!(f, "train"),
            DataSplit::Validation => write!(f, "val"),
            DataSplit::TrainVal => write!(f, "trainval"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_split_order_parse() {
        assert_eq!("lexicographic".parse::<SplitOrder>().unwrap(), SplitOrder::Lexicographic);
        assert_eq!("Listing".parse::<SplitOrder>().unwrap(), SplitOrder::Listing);
        assert!("random".parse::<SplitOrder>().is_err());
    }

    #[test]
    fn test_split_order_display_roundtrip() {
        for order in [SplitOrder::Lexicographic, SplitOrder::Listing] {
            assert_eq!(order.to_string().parse::<SplitOrder>().unwrap(), order);
        }
    }

    #[test]
    fn test_manifest_names() {
        assert_eq!(DataSplit::Train.manifest_name(), "train.txt");
        assert_eq!(DataSplit::Validation.manifest_name(), "val.txt");
        assert_eq!(DataSplit::TrainVal.manifest_name(), "trainval.txt");
    }

    #[test]
    fn test_path_pair_exists() {
        let temp_dir = TempDir::new().unwrap();
        let annotation = temp_dir.path().join("a_0000_Layer 1.jpg");
        let background = temp_dir.path().join("a_0001_Background.jpg");
        fs::write(&annotation, b"x").unwrap();

        let pair = PathPair::new(&annotation, &background);
        assert!(!pair.exists());

        fs::write(&background, b"x").unwrap();
        assert!(pair.exists());
    }
}
