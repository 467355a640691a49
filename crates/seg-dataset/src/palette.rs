//! Class palette built from a name → color dictionary.
//!
//! Class ids follow sorted name order. The first N palette slots hold the
//! class colors in that order; the remaining slots are seeded random filler
//! that only serves the indexed PNG and is never matched against.

use std::collections::HashMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use seg_core::{ColorMap, Error, Result, Rgb, PALETTE_SIZE};
use tracing::warn;

/// Exact mask color to class id
pub type ColorIndex = HashMap<Rgb, u8>;

/// Class names with the 256 colors written into indexed label PNGs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    entries: Vec<Rgb>,
    class_names: Vec<String>,
}

impl Palette {
    /// Builds the 256-entry palette for `colors`
    pub fn build(colors: &ColorMap, seed: u64) -> Result<Self> {
        if colors.is_empty() {
            return Err(Error::Config("color map is empty".to_string()));
        }
        if colors.len() > PALETTE_SIZE {
            return Err(Error::Config(format!(
                "{} classes do not fit a {}-entry palette",
                colors.len(),
                PALETTE_SIZE
            )));
        }

        let class_names: Vec<String> = colors.keys().cloned().collect();
        let mut entries: Vec<Rgb> = colors.values().copied().collect();

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        while entries.len() < PALETTE_SIZE {
            entries.push([rng.gen(), rng.gen(), rng.gen()]);
        }

        Ok(Self {
            entries,
            class_names,
        })
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    /// Class names in id order
    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn class_id(&self, name: &str) -> Option<u8> {
        self.class_names
            .iter()
            .position(|n| n == name)
            .map(|idx| idx as u8)
    }

    /// Palette color of slot `index`
    pub fn color(&self, index: u8) -> Rgb {
        self.entries[index as usize]
    }

    /// All 256 entries as a flat `PLTE` payload
    pub fn to_bytes(&self) -> Vec<u8> {
        self.entries.iter().flatten().copied().collect()
    }

    /// Maps each class color to its id.
    ///
    /// Only the class slots take part; when two classes share a color the
    /// higher id wins.
    pub fn color_index(&self) -> ColorIndex {
        let mut index = ColorIndex::with_capacity(self.num_classes());
        for (id, color) in self.entries[..self.num_classes()].iter().enumerate() {
            if let Some(previous) = index.insert(*color, id as u8) {
                warn!(
                    "Classes '{}' and '{}' share color {:?}; pixels map to '{}'",
                    self.class_names[previous as usize],
                    self.class_names[id],
                    color,
                    self.class_names[id]
                );
            }
        }
        index
    }
}
