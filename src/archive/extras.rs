//! Extra files named with `--include` / `pack.include`.
//!
//! Extras bypass usage discovery and the trust boundary. Relative paths are
//! tried against the current directory first, then the project root.

use crate::{
    error::PackError,
    utils::path::{relative_to, resolve_path},
};
use jwalk::WalkDir;
use std::path::{Path, PathBuf};

/// Resolve `includes` to `(archive name, source)` pairs.
///
/// Inside `root` a file keeps its root-relative name; outside it is stored
/// at the top level under its file name (a directory under its own name).
pub fn resolve(includes: &[PathBuf], root: &Path) -> Result<Vec<(String, PathBuf)>, PackError> {
    let mut resolved = Vec::new();

    for include in includes {
        let path = resolve_path(include, root);
        if path.is_file() {
            resolved.extend(archive_name(&path, root, &path).map(|name| (name, path.clone())));
        } else if path.is_dir() {
            let base = if path.starts_with(root) { root } else { path.parent().unwrap_or(&path) };
            for file in walk_files(&path) {
                resolved.extend(archive_name(&file, root, base).map(|name| (name, file)));
            }
        } else {
            return Err(PackError::MissingExtraFile(include.clone()));
        }
    }

    Ok(resolved)
}

/// Point sources inside `root` at their staged copy under `staged`, so an
/// extra the compilation also read is recognized as the same file.
pub fn rebase(extras: Vec<(String, PathBuf)>, root: &Path, staged: &Path) -> Vec<(String, PathBuf)> {
    extras
        .into_iter()
        .map(|(name, source)| {
            let copy = source
                .strip_prefix(root)
                .ok()
                .map(|rel| staged.join(rel))
                .filter(|copy| copy.is_file());
            (name, copy.unwrap_or(source))
        })
        .collect()
}

fn archive_name(path: &Path, root: &Path, base: &Path) -> Option<String> {
    if let Some(name) = relative_to(path, root) {
        return Some(name);
    }
    if path == base {
        return path.file_name().map(|n| n.to_string_lossy().into_owned());
    }
    relative_to(path, base)
}

fn walk_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path())
        .collect()
}
