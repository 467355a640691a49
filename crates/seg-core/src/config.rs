//! Configuration structures for the dataset preparation jobs.
//!
//! Every section has defaults matching the car-part labeling export, so a
//! TOML file only needs the keys it changes.

use crate::types::{ColorMap, Rgb, SplitOrder};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Suffix of the hand-painted annotation layer exported by the labeling tool
pub const DEFAULT_LAYER_SUFFIX: &str = "_0000_Layer 1.jpg";

/// Suffix of the background photo exported next to each annotation layer
pub const DEFAULT_BACKGROUND_SUFFIX: &str = "_0001_Background.jpg";

/// 4 folds for training and 1 fold for validation
pub const DEFAULT_NUM_FOLDS: usize = 5;

/// Number of entries in an 8-bit indexed palette
pub const PALETTE_SIZE: usize = 256;

/// Car-part mask colors painted by the annotators.
pub const CAR_PART_COLORS: [(&str, Rgb); 28] = [
    ("BG", [255, 255, 255]),
    ("back_door", [50, 50, 150]),
    ("front_bumper", [250, 50, 250]),
    ("front_door_left", [250, 250, 50]),
    ("front_door_right", [150, 150, 250]),
    ("front_fender_left", [250, 50, 150]),
    ("front_fender_right", [250, 150, 250]),
    ("front_fog_left", [150, 50, 150]),
    ("front_fog_right", [150, 150, 150]),
    ("front_lamp_left", [50, 50, 250]),
    ("front_lamp_right", [250, 150, 150]),
    ("grille_up", [250, 250, 150]),
    ("hood", [250, 250, 250]),
    ("rear_bumper", [250, 50, 50]),
    ("rear_door_left", [150, 150, 50]),
    ("rear_door_right", [50, 250, 250]),
    ("rear_fender_left", [150, 50, 50]),
    ("rear_fender_right", [150, 250, 150]),
    ("rear_lamp_left", [50, 50, 50]),
    ("rear_lamp_right", [50, 150, 50]),
    ("rear_stop_center", [50, 150, 150]),
    ("rear_stop_left", [50, 250, 50]),
    ("rear_stop_right", [250, 150, 50]),
    ("side_mirror_left", [150, 50, 250]),
    ("side_mirror_right", [150, 250, 50]),
    ("side_step_left", [50, 150, 250]),
    ("side_step_right", [150, 250, 250]),
    ("trunk", [50, 250, 150]),
];

/// Builds the default car-part color map
pub fn car_part_color_map() -> ColorMap {
    CAR_PART_COLORS
        .iter()
        .map(|(name, rgb)| (name.to_string(), *rgb))
        .collect()
}

/// Top-level configuration shared by all jobs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepConfig {
    /// File naming conventions of the labeling export
    pub layout: LayoutConfig,
    /// Train/validation fold split
    pub split: SplitParams,
    /// Mask quantization
    pub quantize: QuantizeConfig,
}

impl PrepConfig {
    /// Checks that the configuration describes a usable job setup
    pub fn validate(&self) -> Result<()> {
        if self.layout.layer_suffix.is_empty() || self.layout.background_suffix.is_empty() {
            return Err(Error::Config("layout suffixes must not be empty".to_string()));
        }
        if self.layout.layer_suffix == self.layout.background_suffix {
            return Err(Error::Config(
                "layer and background suffixes must differ".to_string(),
            ));
        }
        if self.split.num_folds == 0 {
            return Err(Error::Config("num_folds must be at least 1".to_string()));
        }
        if self.quantize.colors.is_empty() {
            return Err(Error::Config("color map must contain at least one class".to_string()));
        }
        if self.quantize.colors.len() > PALETTE_SIZE {
            return Err(Error::Config(format!(
                "color map has {} classes, an 8-bit palette holds at most {}",
                self.quantize.colors.len(),
                PALETTE_SIZE
            )));
        }
        Ok(())
    }
}

/// Naming conventions of the labeling tool's export
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LayoutConfig {
    /// Token identifying annotation layers
    pub layer_suffix: String,
    /// Token identifying background photos
    pub background_suffix: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            layer_suffix: DEFAULT_LAYER_SUFFIX.to_string(),
            background_suffix: DEFAULT_BACKGROUND_SUFFIX.to_string(),
        }
    }
}

/// Fold split parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SplitParams {
    /// Number of folds; one of them becomes the validation set
    pub num_folds: usize,
    /// Ordering applied to the pool before slicing
    pub order: SplitOrder,
}

impl Default for SplitParams {
    fn default() -> Self {
        Self {
            num_folds: DEFAULT_NUM_FOLDS,
            order: SplitOrder::Lexicographic,
        }
    }
}

/// Mask quantization parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantizeConfig {
    /// Apply a 3x3 median filter to the label map
    pub remove_salt_and_pepper_noise: bool,
    /// Seed for the palette filler colors
    pub palette_seed: u64,
    /// Class name to mask color
    pub colors: ColorMap,
}

impl Default for QuantizeConfig {
    fn default() -> Self {
        Self {
            remove_salt_and_pepper_noise: true,
            palette_seed: 42,
            colors: car_part_color_map(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PrepConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.split.num_folds, 5);
        assert_eq!(config.layout.layer_suffix, "_0000_Layer 1.jpg");
        assert_eq!(config.quantize.colors.len(), 28);
    }

    #[test]
    fn test_car_part_ids_follow_name_order() {
        let colors = car_part_color_map();
        let names: Vec<_> = colors.keys().cloned().collect();
        assert_eq!(names[0], "BG");
        assert_eq!(names[12], "hood");
        assert_eq!(names[27], "trunk");
    }

    #[test]
    fn test_zero_folds_rejected() {
        let mut config = PrepConfig::default();
        config.split.num_folds = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_too_many_colors_rejected() {
        let mut config = PrepConfig::default();
        for i in 0..300u32 {
            config
                .quantize
                .colors
                .insert(format!("class_{i:03}"), [(i % 256) as u8, 0, 0]);
        }
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: PrepConfig = toml::from_str(
            r#"
            [split]
            num_folds = 10

            [quantize.colors]
            BG = [255, 255, 255]
            hood = [250, 250, 250]
            "#,
        )
        .unwrap();

        assert_eq!(config.split.num_folds, 10);
        assert_eq!(config.split.order, SplitOrder::Lexicographic);
        assert_eq!(config.layout, LayoutConfig::default());
        assert!(config.quantize.remove_salt_and_pepper_noise);
        assert_eq!(config.quantize.colors.len(), 2);
    }
}
