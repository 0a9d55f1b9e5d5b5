//! Error helper functions for creating actionable error messages

use std::io;
use std::path::Path;

/// Check if an IO error is a permission denied error
pub fn is_permission_denied(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::PermissionDenied
}

/// Check if an IO error is a "not found" error
pub fn is_not_found(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::NotFound
}

/// Create an enhanced error message for file permission issues
pub fn permission_error(path: &Path, operation: &str) -> String {
    let parent_dir = path
        .parent()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| ".".to_string());

    format!(
        "Permission denied when {} '{}'\n\n\
         Possible fixes:\n\
         1. Check file permissions: ls -l '{}'\n\
         2. Ensure write access to the directory: chmod u+w '{}'\n\
         3. If the file is read-only in version control, check it out for editing first",
        operation,
        path.display(),
        path.display(),
        parent_dir
    )
}

/// Create an enhanced error message for file not found issues
pub fn not_found_error(path: &Path, context: &str) -> String {
    format!(
        "File not found: '{}'\n\n\
         Context: {}\n\n\
         Possible fixes:\n\
         1. Check the root directory is correct (roots are relative to the working directory)\n\
         2. Use an absolute path if the relative path is ambiguous\n\
         3. Check the file was not removed while the tree was being walked",
        path.display(),
        context,
    )
}

/// Pick the most helpful message for an IO failure on `path`
pub fn io_error(path: &Path, operation: &str, err: &io::Error) -> String {
    if is_permission_denied(err) {
        permission_error(path, operation)
    } else if is_not_found(err) {
        not_found_error(path, operation)
    } else {
        format!("Failed {} '{}'", operation, path.display())
    }
}

/// Create an enhanced error message for directory creation failures
pub fn dir_create_error(path: &Path, underlying_err: &io::Error) -> String {
    let base = format!("Failed to create directory: '{}'", path.display());

    if is_permission_denied(underlying_err) {
        format!(
            "{}\n\n\
             Cause: Permission denied\n\n\
             Possible fixes:\n\
             1. Check write permissions on the parent directory\n\
             2. Pass --config to use a configuration file elsewhere",
            base
        )
    } else {
        format!(
            "{}\n\n\
             Underlying error: {}",
            base, underlying_err
        )
    }
}
