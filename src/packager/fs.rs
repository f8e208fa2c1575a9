//! File system helpers for packaging.
//!
//! Directory copies preserve symlinks, which matters for `.app` bundles
//! (framework links) and for the Applications link in DMG staging.

use std::io;
use std::path::Path;

use crate::error::{PipelineError, Result};

/// Copies a regular file, creating parent directories of the destination
/// as necessary.
pub async fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if !from.is_file() {
        return Err(PipelineError::Generic(format!(
            "{} is not a file",
            from.display()
        )));
    }
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::copy(from, to).await?;
    Ok(())
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

/// Recursively copies a directory, preserving symlinks.
///
/// Walks the tree on the blocking pool; bundle trees can hold thousands
/// of entries.
pub async fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    if !from.is_dir() {
        return Err(PipelineError::Generic(format!(
            "{} is not a directory",
            from.display()
        )));
    }

    let from = from.to_path_buf();
    let to = to.to_path_buf();

    tokio::task::spawn_blocking(move || -> Result<()> {
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent)?;
        }

        for entry in walkdir::WalkDir::new(&from) {
            let entry =
                entry.map_err(|e| PipelineError::Generic(format!("walking {from:?}: {e}")))?;
            let rel = entry
                .path()
                .strip_prefix(&from)
                .map_err(|e| PipelineError::Generic(e.to_string()))?;
            let dest = to.join(rel);

            if entry.path_is_symlink() {
                let target = std::fs::read_link(entry.path())?;
                symlink(&target, &dest)?;
            } else if entry.file_type().is_dir() {
                std::fs::create_dir_all(&dest)?;
            } else {
                std::fs::copy(entry.path(), &dest)?;
            }
        }
        Ok(())
    })
    .await
    .map_err(|e| PipelineError::Generic(format!("directory copy task panicked: {e}")))?
}
