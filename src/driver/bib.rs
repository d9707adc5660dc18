//! Bibliography pass planning.
//!
//! The engine's output is only inspected here, to decide whether a
//! bibliography pass is warranted and on which control files.

use crate::config::BibTool;
use jwalk::WalkDir;
use regex::Regex;
use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
    sync::LazyLock,
};

/// `\bibdata{...}` / `\bibstyle{...}` lines written by `\bibliography` and
/// `\bibliographystyle`.
static BIBTEX_REQUEST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\\bib(?:data|style)\{").unwrap());

#[cfg(windows)]
const PATH_SEPARATOR: &str = ";";
#[cfg(not(windows))]
const PATH_SEPARATOR: &str = ":";

/// Control files in `out` the bibliography tool must process, relative to
/// `out` and sorted.
///
/// bibtex wants every `.aux` requesting a bibliography; biber every `.bcf`
/// written by biblatex.
pub(super) fn targets(tool: BibTool, out: &Path) -> Vec<PathBuf> {
    let extension = match tool {
        BibTool::Bibtex => "aux",
        BibTool::Biber => "bcf",
        BibTool::None => return Vec::new(),
    };

    let mut targets: Vec<PathBuf> = WalkDir::new(out)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == extension))
        .filter(|path| tool != BibTool::Bibtex || requests_bibliography(path))
        .filter_map(|path| path.strip_prefix(out).ok().map(Path::to_path_buf))
        .collect();
    targets.sort();
    targets
}

fn requests_bibliography(aux: &Path) -> bool {
    fs::read(aux)
        .map(|bytes| BIBTEX_REQUEST.is_match(&String::from_utf8_lossy(&bytes)))
        .unwrap_or(false)
}

/// kpathsea search path with `dir` first; the trailing separator keeps the
/// default search path in effect.
pub(super) fn search_path(dir: &Path, var: &str) -> OsString {
    let mut value = dir.as_os_str().to_owned();
    value.push(PATH_SEPARATOR);
    if let Some(existing) = std::env::var_os(var) {
        value.push(existing);
    }
    value
}
