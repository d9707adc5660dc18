//! Path normalization utilities.
//!
//! Provides consistent path handling across the codebase:
//! - `normalize_path` - file system paths (canonicalize + fallback)
//! - `resolve_path` - resolve relative paths with fallback directory
//! - `is_within` / `relative_to` - trust-boundary containment and archive names

use std::path::{Component, Path, PathBuf};

/// Normalize a file system path to absolute, symlink-resolved form.
///
/// Tries `canonicalize()` first (resolves symlinks, `.`, `..`).
/// For paths that no longer exist, canonicalizes the nearest existing
/// ancestor and re-appends the remaining components, so a vanished file
/// still compares equal to the path it had while it existed.
#[inline]
pub fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };
    let absolute = lexical_clean(&absolute);

    let mut tail = Vec::new();
    let mut current = absolute.as_path();
    while let Some(parent) = current.parent() {
        if let Some(name) = current.file_name() {
            tail.push(name.to_owned());
        }
        if let Ok(mut canonical) = parent.canonicalize() {
            for name in tail.iter().rev() {
                canonical.push(name);
            }
            return canonical;
        }
        current = parent;
    }
    absolute
}

/// Resolve `.` and `..` without touching the filesystem.
fn lexical_clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolve a path that may be relative to cwd or a fallback directory.
///
/// Always returns an absolute path.
///
/// Tries in order:
/// 1. `~` expansion, then absolute paths as-is
/// 2. If exists relative to cwd, normalize to absolute
/// 3. Otherwise, resolve relative to fallback_dir
#[inline]
pub fn resolve_path(path: &Path, fallback_dir: &Path) -> PathBuf {
    let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
    let path = Path::new(&expanded);

    if path.is_absolute() {
        return normalize_path(path);
    }

    // cwd-relative first (`paper/figs/plot.pdf` typed from the shell)
    if path.exists() {
        return normalize_path(path);
    }

    // root-relative (`figs/plot.pdf` as written in arxify.toml)
    normalize_path(&fallback_dir.join(path))
}

/// Whether `path` lies strictly beneath `root`. Both must already be normalized.
#[inline]
pub fn is_within(path: &Path, root: &Path) -> bool {
    path != root && path.starts_with(root)
}

/// Archive-style relative name (`/`-separated) of `path` below `root`.
pub fn relative_to(path: &Path, root: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}
