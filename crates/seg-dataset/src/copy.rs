//! File copies into flat dataset folders.

use std::fs;
use std::path::{Path, PathBuf};

use seg_core::{Error, Result};
use tracing::{debug, info};

use crate::manifest::flatten_relative;

/// Copies `src` to `dst`, carrying over permissions and timestamps
pub fn copy_preserving_times(src: &Path, dst: &Path) -> Result<u64> {
    let metadata = fs::metadata(src).map_err(|e| {
        Error::NotFound(format!("Failed to read {}: {e}", src.display()))
    })?;

    let bytes = fs::copy(src, dst).map_err(|e| {
        Error::Other(format!("Failed to copy {} to {}: {e}", src.display(), dst.display()))
    })?;

    let modified = metadata.modified()?;
    let accessed = metadata.accessed().unwrap_or(modified);
    let times = fs::FileTimes::new()
        .set_modified(modified)
        .set_accessed(accessed);
    fs::OpenOptions::new().write(true).open(dst)?.set_times(times)?;

    Ok(bytes)
}

/// Copies one background photo into `jpeg_folder` under its flattened name.
pub fn copy_background(path: &Path, data_root: &Path, jpeg_folder: &Path) -> Result<PathBuf> {
    let name = flatten_relative(path, data_root)?;
    let dst = jpeg_folder.join(name);
    fs::copy(path, &dst).map_err(|e| {
        Error::Other(format!("Failed to copy {} to {}: {e}", path.display(), dst.display()))
    })?;
    debug!("Copied {} -> {}", path.display(), dst.display());
    Ok(dst)
}

/// Copies every listed background; the first failure aborts.
///
/// `on_done` runs after each copy with the destination path.
pub fn copy_backgrounds<S, F>(
    backgrounds: &[S],
    data_root: &Path,
    jpeg_folder: &Path,
    mut on_done: F,
) -> Result<Vec<PathBuf>>
where
    S: AsRef<str>,
    F: FnMut(&Path),
{
    fs::create_dir_all(jpeg_folder)?;

    let copied = backgrounds
        .iter()
        .map(|p| {
            let dst = copy_background(Path::new(p.as_ref()), data_root, jpeg_folder)?;
            on_done(&dst);
            Ok::<_, Error>(dst)
        })
        .collect::<Result<Vec<_>>>()?;

    info!("Copied {} background images to {}", copied.len(), jpeg_folder.display());
    Ok(copied)
}
