//! Train/validation fold split.
//!
//! The pool is cut positionally: the last `ceil(N / num_folds)` names become
//! the validation set, everything before them the training set. Nothing is
//! shuffled, so the ordering of the pool decides the split; see [`SplitOrder`].

use std::fs;
use std::path::Path;

use seg_core::{DataSplit, Error, Result, SplitOrder};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::manifest::write_manifest;

/// Base names of the photos in `jpeg_folder`, with `background_suffix` removed.
///
/// Hidden files and subdirectories are not part of the pool.
pub fn collect_pool(
    jpeg_folder: &Path,
    background_suffix: &str,
    order: SplitOrder,
) -> Result<Vec<String>> {
    if !jpeg_folder.is_dir() {
        return Err(Error::NotFound(format!(
            "JPEG folder not found: {}",
            jpeg_folder.display()
        )));
    }

    let mut pool = Vec::new();
    for entry in fs::read_dir(jpeg_folder)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        pool.push(name.replace(background_suffix, ""));
    }

    if order == SplitOrder::Lexicographic {
        pool.sort();
    }
    Ok(pool)
}

/// Number of names the validation fold receives
pub fn validation_len(total: usize, num_folds: usize) -> usize {
    total.div_ceil(num_folds)
}

/// A positional train/validation split of a pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldSplit {
    pub trainval: Vec<String>,
    pub train: Vec<String>,
    pub val: Vec<String>,
    pub num_folds: usize,
}

impl FoldSplit {
    /// Splits `pool` keeping its order
    pub fn from_pool(pool: Vec<String>, num_folds: usize) -> Result<Self> {
        if num_folds == 0 {
            return Err(Error::Config("num_folds must be at least 1".to_string()));
        }

        let val_len = validation_len(pool.len(), num_folds);
        let train_len = pool.len() - val_len;

        Ok(Self {
            train: pool[..train_len].to_vec(),
            val: pool[train_len..].to_vec(),
            trainval: pool,
            num_folds,
        })
    }

    pub fn get(&self, split: DataSplit) -> &[String] {
        match split {
            DataSplit::Train => &self.train,
            DataSplit::Validation => &self.val,
            DataSplit::TrainVal => &self.trainval,
        }
    }

    /// Writes `trainval.txt`, `train.txt` and `val.txt` into `dir`
    pub fn write_to(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        for split in [DataSplit::TrainVal, DataSplit::Train, DataSplit::Validation] {
            write_manifest(&dir.join(split.manifest_name()), self.get(split))?;
        }

        info!(
            "Split {} samples: {} train, {} val ({} folds) -> {}",
            self.trainval.len(),
            self.train.len(),
            self.val.len(),
            self.num_folds,
            dir.display()
        );
        Ok(())
    }

    pub fn summary(&self, order: SplitOrder) -> SplitSummary {
        SplitSummary {
            num_folds: self.num_folds,
            order,
            trainval_count: self.trainval.len(),
            train_count: self.train.len(),
            val_count: self.val.len(),
        }
    }
}

/// Counts of a written split, for `split_info.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitSummary {
    pub num_folds: usize,
    pub order: SplitOrder,
    pub trainval_count: usize,
    pub train_count: usize,
    pub val_count: usize,
}

impl SplitSummary {
    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
