//! Directory traversal shared by both tools
//!
//! Excluded directories are pruned with `filter_entry`, so the walk never
//! descends into them at all instead of listing and discarding their contents.

use anyhow::Result;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

use crate::error_helpers;

/// Iterate over every non-directory entry below `root`, skipping directories
/// whose name appears in `exclude_dirs`.
///
/// Symlinks are yielded unless they resolve to a directory, so a dangling
/// link surfaces as a read error in the caller instead of vanishing. The
/// root itself is never pruned, even if its name is excluded. A missing
/// root yields nothing.
pub fn walk_files<'a>(
    root: &Path,
    exclude_dirs: &'a [String],
) -> impl Iterator<Item = Result<DirEntry>> + 'a {
    let exists = root.exists();
    if !exists {
        tracing::warn!("Root directory does not exist, skipping: {}", root.display());
    }

    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |entry| !is_pruned(entry, exclude_dirs))
        .filter(move |_| exists)
        .filter_map(|entry| match entry {
            Ok(entry) if is_file(&entry) => Some(Ok(entry)),
            Ok(_) => None,
            Err(err) => Some(Err(walk_error(err))),
        })
}

/// Regular files, plus symlinks that don't lead to a directory
fn is_file(entry: &DirEntry) -> bool {
    entry.file_type().is_file() || (entry.path_is_symlink() && !entry.path().is_dir())
}

fn is_pruned(entry: &DirEntry, exclude_dirs: &[String]) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }

    let pruned = entry
        .file_name()
        .to_str()
        .is_some_and(|name| exclude_dirs.iter().any(|excluded| excluded == name));

    if pruned {
        tracing::debug!("Pruning {}", entry.path().display());
    }
    pruned
}

fn walk_error(err: walkdir::Error) -> anyhow::Error {
    let denied = err.io_error().is_some_and(error_helpers::is_permission_denied);
    let message = match err.path() {
        Some(path) if denied => error_helpers::permission_error(path, "listing"),
        Some(path) => format!("Failed to walk directory: {}", path.display()),
        None => "Failed to walk directory tree".to_string(),
    };
    anyhow::Error::new(err).context(message)
}

/// True if `path` has one of `extensions` (given without the leading dot)
pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|wanted| wanted == ext))
}
