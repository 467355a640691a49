//! Segmentation dataset preparation library.
//!
//! This crate provides the jobs that turn raw annotation exports into
//! training-ready datasets: merging the augmented VOC lists, converting
//! `.mat` ground truth to PNG, pairing car-part exports, splitting folds
//! and quantizing painted masks into indexed label images.

pub mod annotation;
pub mod copy;
pub mod discovery;
pub mod manifest;
pub mod mat;
pub mod merge;
pub mod palette;
pub mod quantize;
pub mod split;

pub use annotation::{copy_aug_annotations, label_image};
pub use copy::{copy_background, copy_backgrounds};
pub use discovery::{discover_pairs, write_pair_lists, Discovery};
pub use manifest::{flatten_relative, read_manifest, write_manifest};
pub use mat::{MatArray, MatFile, MatValue};
pub use merge::{build_train_aug, select_aug_ids, AugSelection, VocLayout};
pub use palette::Palette;
pub use quantize::{
    convert_masks, median_filter_3x3, ConvertedMask, MaskConverter, QuantizeReport, Quantizer,
};
pub use split::{collect_pool, FoldSplit, SplitSummary};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::annotation::*;
    pub use crate::copy::*;
    pub use crate::discovery::*;
    pub use crate::manifest::*;
    pub use crate::merge::*;
    pub use crate::palette::*;
    pub use crate::quantize::*;
    pub use crate::split::*;
}
