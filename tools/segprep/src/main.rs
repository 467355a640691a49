//! Dataset preparation tool for semantic segmentation training.
//!
//! Subcommands:
//! - merging the augmented VOC set into the base dataset
//! - pairing labeling-tool exports into background/annotation lists
//! - copying backgrounds and splitting them into folds
//! - quantizing painted masks into indexed label PNGs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use seg_core::{load_prep_config, setup_cli_logging, DataSplit, PrepConfig, SplitOrder};
use seg_dataset::{
    build_train_aug, collect_pool, copy_aug_annotations, copy_backgrounds, discover_pairs,
    read_manifest, select_aug_ids, write_pair_lists, FoldSplit, MaskConverter, VocLayout,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "segprep")]
#[command(about = "Dataset preparation for semantic segmentation", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge the augmented set into the base dataset
    AddAug {
        /// Root of the augmented dataset (cls/, img/, train.txt, val.txt)
        #[arg(long, default_value = "./pascal_voc_seg/benchmark_RELEASE/dataset")]
        aug_data_folder: PathBuf,

        /// Root of the base dataset
        #[arg(long, default_value = "./pascal_voc_seg/VOCdevkit/VOC2012")]
        original_folder: PathBuf,
    },

    /// Pair annotation layers with their backgrounds and write both lists
    ListPairs {
        /// Root of the labeling-tool export
        #[arg(long)]
        data_root: PathBuf,

        /// Directory receiving backgrounds.txt and segmentations.txt
        #[arg(long)]
        output_list_dir: PathBuf,
    },

    /// Copy listed backgrounds into a flat JPEG folder
    CopyBackgrounds {
        /// Background list written by list-pairs
        #[arg(long)]
        jpeg_list_path: PathBuf,

        /// Root the listed paths are relative to
        #[arg(long)]
        data_root: PathBuf,

        /// Destination folder
        #[arg(long)]
        jpeg_folder: PathBuf,
    },

    /// Split the JPEG folder into train/val lists
    Split {
        /// Folder holding the copied backgrounds
        #[arg(long)]
        jpeg_folder: PathBuf,

        /// Directory receiving trainval.txt, train.txt and val.txt
        #[arg(long)]
        separate_folder: PathBuf,

        /// Pool ordering: lexicographic or listing
        #[arg(long)]
        order: Option<SplitOrder>,

        /// Number of folds (validation gets one fold)
        #[arg(long)]
        folds: Option<usize>,

        /// Write split counts as JSON
        #[arg(long)]
        summary: Option<PathBuf>,
    },

    /// Quantize painted masks into indexed label PNGs
    Colorize {
        /// Annotation list written by list-pairs
        #[arg(long)]
        seg_list_path: PathBuf,

        /// Root the listed paths are relative to
        #[arg(long)]
        data_root: PathBuf,

        /// Destination folder
        #[arg(long)]
        seg_folder: PathBuf,

        /// Skip the 3x3 median filter
        #[arg(long)]
        no_denoise: bool,

        /// Number of parallel workers (default: num_cpus)
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Run copy-backgrounds, split and colorize in order
    CarSeg {
        #[arg(long)]
        jpeg_list_path: PathBuf,

        #[arg(long)]
        seg_list_path: PathBuf,

        #[arg(long)]
        data_root: PathBuf,

        #[arg(long)]
        jpeg_folder: PathBuf,

        #[arg(long)]
        separate_folder: PathBuf,

        #[arg(long)]
        seg_folder: PathBuf,

        #[arg(long)]
        order: Option<SplitOrder>,

        #[arg(long)]
        folds: Option<usize>,

        #[arg(long)]
        summary: Option<PathBuf>,

        #[arg(long)]
        no_denoise: bool,

        #[arg(short, long)]
        workers: Option<usize>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_cli_logging(cli.verbose).context("Failed to initialize logging")?;

    let mut config =
        load_prep_config(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::AddAug {
            aug_data_folder,
            original_folder,
        } => add_aug_dataset(&VocLayout::new(aug_data_folder, original_folder))?,

        Commands::ListPairs {
            data_root,
            output_list_dir,
        } => list_pairs(&config, &data_root, &output_list_dir)?,

        Commands::CopyBackgrounds {
            jpeg_list_path,
            data_root,
            jpeg_folder,
        } => copy_background_jpegs(&jpeg_list_path, &data_root, &jpeg_folder)?,

        Commands::Split {
            jpeg_folder,
            separate_folder,
            order,
            folds,
            summary,
        } => {
            apply_split_overrides(&mut config, order, folds)?;
            split_folds(&config, &jpeg_folder, &separate_folder, summary.as_deref())?;
        }

        Commands::Colorize {
            seg_list_path,
            data_root,
            seg_folder,
            no_denoise,
            workers,
        } => {
            if no_denoise {
                config.quantize.remove_salt_and_pepper_noise = false;
            }
            set_workers(workers)?;
            colorize_masks(&config, &seg_list_path, &data_root, &seg_folder)?;
        }

        Commands::CarSeg {
            jpeg_list_path,
            seg_list_path,
            data_root,
            jpeg_folder,
            separate_folder,
            seg_folder,
            order,
            folds,
            summary,
            no_denoise,
            workers,
        } => {
            apply_split_overrides(&mut config, order, folds)?;
            if no_denoise {
                config.quantize.remove_salt_and_pepper_noise = false;
            }
            set_workers(workers)?;

            copy_background_jpegs(&jpeg_list_path, &data_root, &jpeg_folder)?;
            split_folds(&config, &jpeg_folder, &separate_folder, summary.as_deref())?;
            colorize_masks(&config, &seg_list_path, &data_root, &seg_folder)?;
            println!("{}", "Car segmentation dataset ready!".green().bold());
        }
    }

    Ok(())
}

fn apply_split_overrides(
    config: &mut PrepConfig,
    order: Option<SplitOrder>,
    folds: Option<usize>,
) -> Result<()> {
    if let Some(order) = order {
        config.split.order = order;
    }
    if let Some(folds) = folds {
        config.split.num_folds = folds;
    }
    config.validate().context("Invalid split options")?;
    Ok(())
}

fn set_workers(workers: Option<usize>) -> Result<()> {
    if let Some(n) = workers {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .context("Failed to set thread pool size")?;
    }
    Ok(())
}

fn progress_bar(len: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("=>-"),
    );
    Ok(pb)
}

/// Merge the augmented set: filter duplicates, convert labels, write train_aug.txt
fn add_aug_dataset(layout: &VocLayout) -> Result<()> {
    info!(
        "Merging {:?} into {:?}",
        layout.aug_root, layout.base_root
    );

    let selection = select_aug_ids(layout).context("Failed to read ID lists")?;

    let pb = progress_bar(selection.len())?;
    copy_aug_annotations(layout, &selection, |_| pb.inc(1))
        .context("Failed to convert augmented annotations")?;
    pb.finish_with_message("Done");

    match build_train_aug(&layout.train_list(), &selection, &layout.train_aug_list())
        .context("Failed to write merged train list")?
    {
        Some(count) => info!("Wrote {} IDs to {:?}", count, layout.train_aug_list()),
        None => warn!(
            "No original train list at {:?}, merged list not written",
            layout.train_list()
        ),
    }

    println!(
        "{} {} augmented samples added",
        "Merge complete!".green().bold(),
        selection.len()
    );
    Ok(())
}

/// Walk an export tree and write the pair lists
fn list_pairs(config: &PrepConfig, data_root: &Path, output_list_dir: &Path) -> Result<()> {
    let discovery = discover_pairs(data_root, &config.layout)
        .with_context(|| format!("Failed to scan {}", data_root.display()))?;
    let (backgrounds, annotations) = write_pair_lists(&discovery, output_list_dir)
        .context("Failed to write pair lists")?;

    info!("Backgrounds: {:?}", backgrounds);
    info!("Annotations: {:?}", annotations);
    println!(
        "{} {} pairs, {} invalid annotations",
        "Listing complete!".green().bold(),
        discovery.pairs.len(),
        discovery.invalid.len()
    );
    Ok(())
}

/// Copy every listed background into the JPEG folder
fn copy_background_jpegs(
    jpeg_list_path: &Path,
    data_root: &Path,
    jpeg_folder: &Path,
) -> Result<()> {
    let backgrounds = read_manifest(jpeg_list_path)
        .with_context(|| format!("Failed to read {}", jpeg_list_path.display()))?;

    info!("Copying {} backgrounds to {:?}", backgrounds.len(), jpeg_folder);

    let pb = progress_bar(backgrounds.len())?;
    copy_backgrounds(&backgrounds, data_root, jpeg_folder, |_| pb.inc(1))
        .context("Failed to copy backgrounds")?;
    pb.finish_with_message("Done");
    Ok(())
}

/// Split the JPEG folder into trainval/train/val lists
fn split_folds(
    config: &PrepConfig,
    jpeg_folder: &Path,
    separate_folder: &Path,
    summary_path: Option<&Path>,
) -> Result<()> {
    let order = config.split.order;
    let pool = collect_pool(jpeg_folder, &config.layout.background_suffix, order)
        .context("Failed to collect split pool")?;
    if pool.is_empty() {
        warn!("No images found in {:?}", jpeg_folder);
    }

    let split = FoldSplit::from_pool(pool, config.split.num_folds)?;
    split
        .write_to(separate_folder)
        .context("Failed to write split lists")?;

    let summary = split.summary(order);
    if let Some(path) = summary_path {
        summary.save(path).context("Failed to write split summary")?;
        info!("Split summary saved to {:?}", path);
    }

    println!("{}", "Dataset Splits:".cyan().bold());
    for data_split in [DataSplit::Train, DataSplit::Validation, DataSplit::TrainVal] {
        println!("  {:<9} {}", data_split.to_string(), split.get(data_split).len());
    }
    Ok(())
}

/// Quantize every listed mask into an indexed label PNG
fn colorize_masks(
    config: &PrepConfig,
    seg_list_path: &Path,
    data_root: &Path,
    seg_folder: &Path,
) -> Result<()> {
    let masks = read_manifest(seg_list_path)
        .with_context(|| format!("Failed to read {}", seg_list_path.display()))?;
    let converter =
        MaskConverter::from_config(&config.quantize).context("Failed to build palette")?;

    info!(
        "Colorizing {} masks with {} classes (denoise: {})",
        masks.len(),
        converter.palette().num_classes(),
        config.quantize.remove_salt_and_pepper_noise
    );

    let pb = progress_bar(masks.len())?;
    let converted = converter
        .convert_all(&masks, data_root, seg_folder, |_| pb.inc(1))
        .context("Failed to convert masks")?;
    pb.finish_with_message("Done");

    let pixels: usize = converted.iter().map(|c| c.report.pixels).sum();
    let misses: usize = converted.iter().map(|c| c.report.misses).sum();
    if misses > 0 {
        info!(
            "{} of {} pixels matched no class and were set to {}",
            misses,
            pixels,
            converter.palette().class_names().first().map(String::as_str).unwrap_or("class 0")
        );
    }

    println!(
        "{} {} masks written to {}",
        "Colorize complete!".green().bold(),
        converted.len(),
        seg_folder.display()
    );
    Ok(())
}
