//! Line-delimited ID manifests.
//!
//! A manifest is a plain text file with one identifier per line, no header
//! and no escaping. Writes always terminate every entry with `\n`.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Component, Path};

use seg_core::{Error, Result};
use tracing::debug;

/// Reads a manifest, failing if the file is missing
pub fn read_manifest(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            Error::NotFound(format!("Manifest not found: {}", path.display()))
        }
        _ => Error::Io(e),
    })?;

    Ok(content.lines().map(str::to_string).collect())
}

/// Reads a manifest, treating a missing file as an empty list
pub fn read_manifest_or_empty(path: &Path) -> Result<Vec<String>> {
    if !path.is_file() {
        debug!("Manifest {} is absent, using an empty list", path.display());
        return Ok(Vec::new());
    }
    read_manifest(path)
}

/// Writes `ids` one per line, replacing any existing file
pub fn write_manifest<S: AsRef<str>>(path: &Path, ids: &[S]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(fs::File::create(path)?);
    for id in ids {
        writer.write_all(id.as_ref().as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;

    debug!("Wrote {} entries to {}", ids.len(), path.display());
    Ok(())
}

/// Joins the components of `path` below `root` with `_`.
///
/// `root/car_01/front/img_0001_Background.jpg` becomes
/// `car_01_front_img_0001_Background.jpg`, so files from a nested export can
/// live side by side in one flat folder.
pub fn flatten_relative(path: &Path, root: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).map_err(|_| {
        Error::InvalidArgument(format!(
            "{} is not below data root {}",
            path.display(),
            root.display()
        ))
    })?;

    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        return Err(Error::InvalidArgument(format!(
            "{} names no file below {}",
            path.display(),
            root.display()
        )));
    }

    Ok(parts.join("_"))
}
