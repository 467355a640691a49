//! Quantization of hand-painted color masks into class-index label maps.
//!
//! Image editors smooth the edges between painted regions, leaving colors a
//! few units off the canonical ones. Each channel is biased by +5 and floored
//! to a multiple of 10 (nearest multiple of 10, clipped to 255), which puts
//! those pixels back onto the class colors. Whatever still matches no class
//! becomes class 0.

use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use image::{GrayImage, Luma, RgbImage};
use rayon::prelude::*;
use seg_core::{Error, QuantizeConfig, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::manifest::flatten_relative;
use crate::palette::{ColorIndex, Palette};

/// Class id assigned to colors that match no class
pub const BACKGROUND_CLASS: u8 = 0;

/// Per-pixel class indices, one byte per pixel
pub type LabelMap = GrayImage;

/// Rounds one channel to the nearest multiple of 10, clipped to 255
#[inline]
pub fn round_channel(value: u8) -> u8 {
    let biased = value as i32 + 5;
    ((biased / 10) * 10).clamp(0, 255) as u8
}

/// Pixel counts of one quantized mask
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantizeReport {
    pub pixels: usize,
    /// Pixels whose rounded color matched no class
    pub misses: usize,
}

impl QuantizeReport {
    pub fn miss_rate(&self) -> f64 {
        if self.pixels == 0 {
            0.0
        } else {
            self.misses as f64 / self.pixels as f64
        }
    }
}

/// Maps rounded mask colors to class ids
#[derive(Debug, Clone)]
pub struct Quantizer {
    index: ColorIndex,
}

impl Quantizer {
    pub fn new(palette: &Palette) -> Self {
        Self {
            index: palette.color_index(),
        }
    }

    /// Class id of one (unrounded) pixel color, or `None` on a miss
    pub fn lookup(&self, rgb: [u8; 3]) -> Option<u8> {
        let rounded = [
            round_channel(rgb[0]),
            round_channel(rgb[1]),
            round_channel(rgb[2]),
        ];
        self.index.get(&rounded).copied()
    }

    /// Quantizes a whole mask; dimensions are preserved
    pub fn quantize(&self, mask: &RgbImage) -> (LabelMap, QuantizeReport) {
        let (width, height) = mask.dimensions();
        let mut report = QuantizeReport {
            pixels: (width as usize) * (height as usize),
            misses: 0,
        };

        let labels = mask
            .pixels()
            .map(|pixel| match self.lookup(pixel.0) {
                Some(class) => class,
                None => {
                    report.misses += 1;
                    BACKGROUND_CLASS
                }
            })
            .collect::<Vec<u8>>();

        let labels = GrayImage::from_raw(width, height, labels)
            .unwrap_or_else(|| GrayImage::new(width, height));
        (labels, report)
    }
}

/// 3x3 median filter with replicated borders.
///
/// Removes isolated misclassified pixels; never changes dimensions.
pub fn median_filter_3x3(labels: &LabelMap) -> LabelMap {
    let (width, height) = labels.dimensions();
    if width == 0 || height == 0 {
        return labels.clone();
    }

    let mut result = GrayImage::new(width, height);
    let max_x = width as i64 - 1;
    let max_y = height as i64 - 1;

    for y in 0..height {
        for x in 0..width {
            let mut window = [0u8; 9];
            let mut k = 0;
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    let nx = (x as i64 + dx).clamp(0, max_x) as u32;
                    let ny = (y as i64 + dy).clamp(0, max_y) as u32;
                    window[k] = labels.get_pixel(nx, ny)[0];
                    k += 1;
                }
            }
            window.sort_unstable();
            result.put_pixel(x, y, Luma([window[4]]));
        }
    }

    result
}

/// Writes `labels` as an 8-bit indexed PNG carrying `palette`
pub fn write_indexed_png(labels: &LabelMap, palette: &Palette, path: &Path) -> Result<()> {
    let (width, height) = labels.dimensions();
    if width == 0 || height == 0 {
        return Err(Error::InvalidArgument(format!(
            "cannot write empty label map to {}",
            path.display()
        )));
    }

    let file = fs::File::create(path)?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), width, height);
    encoder.set_color(png::ColorType::Indexed);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_palette(palette.to_bytes());

    let mut writer = encoder.write_header()?;
    writer.write_image_data(labels.as_raw())?;
    writer.finish()?;
    Ok(())
}

/// Reads an 8-bit indexed PNG back into raw indices and its palette bytes
pub fn read_indexed_png(path: &Path) -> Result<(LabelMap, Vec<u8>)> {
    let file = fs::File::open(path)
        .map_err(|e| Error::NotFound(format!("Failed to open {}: {e}", path.display())))?;
    let mut decoder = png::Decoder::new(BufReader::new(file));
    decoder.set_transformations(png::Transformations::IDENTITY);

    let mut reader = decoder.read_info()?;
    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf)?;

    if info.color_type != png::ColorType::Indexed || info.bit_depth != png::BitDepth::Eight {
        return Err(Error::Png(format!(
            "{} is {:?}/{:?}, expected 8-bit indexed",
            path.display(),
            info.color_type,
            info.bit_depth
        )));
    }
    buf.truncate(info.buffer_size());

    let palette = reader
        .info()
        .palette
        .as_ref()
        .map(|p| p.to_vec())
        .unwrap_or_default();
    let labels = GrayImage::from_raw(info.width, info.height, buf)
        .ok_or_else(|| Error::Png(format!("{} has a short image buffer", path.display())))?;

    Ok((labels, palette))
}

/// One converted mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertedMask {
    pub source: PathBuf,
    pub output: PathBuf,
    pub report: QuantizeReport,
}

/// Everything needed to turn color masks into indexed label PNGs
#[derive(Debug, Clone)]
pub struct MaskConverter {
    palette: Palette,
    quantizer: Quantizer,
    denoise: bool,
}

impl MaskConverter {
    pub fn new(palette: Palette, denoise: bool) -> Self {
        let quantizer = Quantizer::new(&palette);
        Self {
            palette,
            quantizer,
            denoise,
        }
    }

    /// Builds the palette from the quantization config
    pub fn from_config(config: &QuantizeConfig) -> Result<Self> {
        let palette = Palette::build(&config.colors, config.palette_seed)?;
        Ok(Self::new(palette, config.remove_salt_and_pepper_noise))
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Quantizes (and optionally denoises) a decoded mask
    pub fn labels(&self, mask: &RgbImage) -> (LabelMap, QuantizeReport) {
        let (labels, report) = self.quantizer.quantize(mask);
        if self.denoise {
            (median_filter_3x3(&labels), report)
        } else {
            (labels, report)
        }
    }

    /// Output path of `mask`: its flattened name below `data_root`, as `.png`
    pub fn output_path(mask: &Path, data_root: &Path, out_dir: &Path) -> Result<PathBuf> {
        let flat = flatten_relative(mask, data_root)?;
        Ok(out_dir.join(Path::new(&flat).with_extension("png")))
    }

    /// Converts one mask file
    pub fn convert(&self, mask: &Path, data_root: &Path, out_dir: &Path) -> Result<ConvertedMask> {
        let image = image::open(mask)
            .map_err(|e| Error::Image(format!("Failed to load mask {}: {e}", mask.display())))?
            .to_rgb8();

        let (labels, report) = self.labels(&image);
        let output = Self::output_path(mask, data_root, out_dir)?;
        write_indexed_png(&labels, &self.palette, &output)?;

        debug!(
            "Converted {} ({} of {} pixels unmatched)",
            mask.display(),
            report.misses,
            report.pixels
        );
        Ok(ConvertedMask {
            source: mask.to_path_buf(),
            output,
            report,
        })
    }

    /// Converts every listed mask in parallel; the first failure aborts.
    ///
    /// `on_done` runs once per finished mask, from worker threads.
    pub fn convert_all<S, F>(
        &self,
        masks: &[S],
        data_root: &Path,
        out_dir: &Path,
        on_done: F,
    ) -> Result<Vec<ConvertedMask>>
    where
        S: AsRef<str> + Sync,
        F: Fn(&ConvertedMask) + Sync,
    {
        fs::create_dir_all(out_dir)?;

        masks
            .par_iter()
            .map(|mask| {
                let converted = self.convert(Path::new(mask.as_ref()), data_root, out_dir)?;
                on_done(&converted);
                Ok(converted)
            })
            .collect()
    }
}

/// Converts every mask of a segmentation list with the given settings
pub fn convert_masks<S: AsRef<str> + Sync>(
    masks: &[S],
    data_root: &Path,
    out_dir: &Path,
    config: &QuantizeConfig,
) -> Result<Vec<ConvertedMask>> {
    let converter = MaskConverter::from_config(config)?;
    let converted = converter.convert_all(masks, data_root, out_dir, |_| {})?;

    let misses: usize = converted.iter().map(|c| c.report.misses).sum();
    info!(
        "Converted {} masks to {} ({} unmatched pixels)",
        converted.len(),
        out_dir.display(),
        misses
    );
    Ok(converted)
}
