//! Usage Resolver
//!
//! Reduces the raw access stream of all passes to the set of source files
//! the compilation actually consumed:
//!
//! ```text
//! events → canonicalize → inside root? → not an artifact? → set → still a file?
//! ```

use crate::{
    error::Warning,
    monitor::AccessEvent,
    utils::path::{is_within, normalize_path},
};
use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

/// Extensions the engine and bibliography tools write next to the root
/// document's basename.
pub const ARTIFACT_EXTENSIONS: &[&str] = &[
    "pdf", "dvi", "xdv", "aux", "log", "out", "toc", "lof", "lot", "bbl", "blg", "bcf", "run.xml",
    "fls", "fdb_latexmk", "synctex.gz", "synctex", "nav", "snm", "vrb", "idx", "ind", "ilg",
    "glo", "gls", "glg", "brf", "xwm",
];

/// Canonical paths of files consumed during compilation, ordered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequiredFileSet(BTreeSet<PathBuf>);

impl RequiredFileSet {
    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.0.iter().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[cfg(test)]
    pub fn contains(&self, path: &Path) -> bool {
        self.0.contains(path)
    }
}

/// Resolve `events` against the trust boundary `root`.
///
/// `root` and `main` must already be canonical. Returns the required set
/// and one [`Warning::VanishedFile`] per path that is gone. Directories
/// opened for listing are dropped silently.
pub fn resolve(events: &[AccessEvent], root: &Path, main: &Path) -> (RequiredFileSet, Vec<Warning>) {
    let stem = main.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    let main_dir = main.parent().unwrap_or(root);

    let candidates: BTreeSet<PathBuf> = events
        .iter()
        .map(|event| normalize_path(&event.path))
        .filter(|path| is_within(path, root))
        .filter(|path| !is_artifact(path, main_dir, stem))
        .collect();

    let mut warnings = Vec::new();
    let files: BTreeSet<PathBuf> = candidates
        .into_iter()
        .filter(|path| {
            if path.is_file() {
                return true;
            }
            if !path.is_dir() {
                warnings.push(Warning::VanishedFile(path.clone()));
            }
            false
        })
        .collect();

    crate::debug!("resolve"; "{} events → {} files", events.len(), files.len());
    (RequiredFileSet(files), warnings)
}

/// `{stem}.{ext}` next to the root document for a known output extension.
fn is_artifact(path: &Path, main_dir: &Path, stem: &str) -> bool {
    if path.parent() != Some(main_dir) {
        return false;
    }
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.strip_prefix(stem)
        .and_then(|rest| rest.strip_prefix('.'))
        .is_some_and(|ext| ARTIFACT_EXTENSIONS.contains(&ext))
}
