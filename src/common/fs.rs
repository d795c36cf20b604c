use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use zip::ZipArchive;

/// Create the directory if it doesn't exist; error if a non-directory exists there.
pub(crate) fn ensure_dir_exists(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            anyhow::bail!("Path exists but is not a directory: {}", path.display());
        }
    } else {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory {}", path.display()))?;
    }
    Ok(())
}

/// Extracts the given `.zip` file to the target directory. The archive is
/// left in place; for cached meshes it is the record of the download.
pub(crate) fn extract_zip(zip_path: &Path, dest_dir: &Path) -> Result<()> {
    let file = fs::File::open(zip_path)
        .map_err(|e| anyhow::anyhow!("failed to open {:?}: {}", zip_path, e))?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| anyhow::anyhow!("failed to read zip archive {:?}: {}", zip_path, e))?;
    archive
        .extract(dest_dir)
        .map_err(|e| anyhow::anyhow!("failed to extract {:?} to {:?}: {}", zip_path, dest_dir, e))?;
    Ok(())
}

/// First file with the given extension directly inside `dir`, if any.
/// Entries are sorted, so ties resolve the same way every run.
pub(crate) fn find_by_extension(dir: &Path, ext: &str) -> Result<Option<PathBuf>> {
    let mut matches: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(ext))
        .collect();
    matches.sort();
    Ok(matches.into_iter().next())
}
