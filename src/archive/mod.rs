//! Archive Assembler
//!
//! # Phases
//!
//! 1. **Collect** - required files, generated `.bbl`, extras → [`Manifest`]
//! 2. **Prepare** - read every entry, strip comments from text sources (parallel)
//! 3. **Write** - zip into a temporary sibling, then rename over the output
//!
//! Archive names are `/`-separated and relative to the project root.

pub mod extras;

use crate::{
    config::PackConfig,
    debug,
    error::{PackError, Warning},
    log,
    logger::ProgressLine,
    resolver::RequiredFileSet,
    strip::{Stripper, collect_definitions, paragraph_breaks},
    utils::path::relative_to,
};
use jwalk::WalkDir;
use parking_lot::Mutex;
use rayon::prelude::*;
use std::{
    collections::BTreeMap,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

/// Archive name → source file, ordered by name.
#[derive(Debug, Default, Clone)]
pub struct Manifest {
    entries: BTreeMap<String, PathBuf>,
}

impl Manifest {
    /// Required files under `root`, minus `.bib` sources unless kept.
    pub fn from_required(required: &RequiredFileSet, root: &Path, config: &PackConfig) -> Self {
        let mut manifest = Self::default();
        for path in required.iter() {
            if !config.keep_bib && has_extension(path, "bib") {
                debug!("pack"; "skipping bibliography source {}", path.display());
                continue;
            }
            if let Some(name) = relative_to(path, root) {
                manifest.add(name, path.to_path_buf());
            }
        }
        manifest
    }

    /// `.bbl` files produced in the output directory, named as their `.aux`.
    pub fn add_generated_bbl(&mut self, out: &Path) {
        let bbls = WalkDir::new(out)
            .sort(true)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path())
            .filter(|path| has_extension(path, "bbl"));

        for path in bbls {
            if let Some(name) = relative_to(&path, out) {
                self.add(name, path);
            }
        }
    }

    /// Add `(name, source)` pairs; names already present keep their source.
    pub fn add_extras(&mut self, extras: Vec<(String, PathBuf)>) {
        for (name, source) in extras {
            self.add(name, source);
        }
    }

    fn add(&mut self, name: String, source: PathBuf) {
        match self.entries.get(&name) {
            Some(existing) if *existing != source => {
                log!("warning"; "`{}` and `{}` both map to `{name}`, keeping the first",
                    existing.display(), source.display());
            }
            Some(_) => {}
            None => {
                self.entries.insert(name, source);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
impl Manifest {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }
}

/// One archive member, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prepared {
    pub name: String,
    pub content: Vec<u8>,
    pub stripped: bool,
}

/// Read every entry and strip the text sources.
///
/// Verbatim environments declared anywhere in the shipped sources apply to
/// every file. Files that cannot be stripped safely are shipped as-is with a
/// warning; unreadable ones are dropped as vanished.
pub fn prepare(manifest: &Manifest, config: &PackConfig) -> (Vec<Prepared>, Vec<Warning>) {
    let sources: Vec<(&String, &PathBuf, Option<Vec<u8>>)> = manifest
        .entries
        .iter()
        .map(|(name, path)| (name, path, fs::read(path).ok()))
        .collect();

    let mut environments = config.verbatim_environments.clone();
    let texts = sources
        .iter()
        .filter(|(_, path, _)| config.strips(path))
        .filter_map(|(_, _, content)| content.as_deref())
        .filter_map(|bytes| std::str::from_utf8(bytes).ok());
    for text in texts {
        environments.extend(collect_definitions(text));
    }
    let stripper = Stripper::with_environments(environments);

    let progress = ProgressLine::new("pack", &[("files", sources.len())]);
    let warnings = Mutex::new(Vec::new());

    let prepared: Vec<Prepared> = sources
        .into_par_iter()
        .filter_map(|(name, path, content)| {
            let Some(content) = content else {
                warnings.lock().push(Warning::VanishedFile(path.clone()));
                return None;
            };
            let (content, stripped) = if config.strips(path) {
                let (content, stripped, warning) = strip_file(&stripper, path, content);
                if let Some(warning) = warning {
                    warnings.lock().push(warning);
                }
                (content, stripped)
            } else {
                (content, false)
            };
            progress.inc("files");
            Some(Prepared {
                name: name.clone(),
                content,
                stripped,
            })
        })
        .collect();

    progress.finish();
    (prepared, warnings.into_inner())
}

/// Stripped content, or the original when stripping is refused.
fn strip_file(
    stripper: &Stripper,
    path: &Path,
    content: Vec<u8>,
) -> (Vec<u8>, bool, Option<Warning>) {
    let text = match String::from_utf8(content) {
        Ok(text) => text,
        Err(e) => return (e.into_bytes(), false, Some(Warning::NotUtf8(path.to_path_buf()))),
    };
    match stripper.strip(&text) {
        Ok(stripped) => {
            let lines = paragraph_breaks(&text, &stripped);
            let warning = (!lines.is_empty()).then(|| Warning::ParagraphBreaks {
                path: path.to_path_buf(),
                lines,
            });
            (stripped.into_bytes(), true, warning)
        }
        Err(e) => {
            let warning = Warning::UnbalancedVerbatimRegion {
                path: path.to_path_buf(),
                line: e.line,
            };
            (text.into_bytes(), false, Some(warning))
        }
    }
}

/// Log the archive contents.
pub fn list(prepared: &[Prepared]) {
    for entry in prepared {
        let marker = if entry.stripped { " (stripped)" } else { "" };
        log!("pack"; "+ {}{}", entry.name, marker);
    }
}

/// Write `prepared` as a zip at `output`.
///
/// The archive is built in a temporary file next to `output` and renamed
/// into place, so `output` is never left half-written.
pub fn write(prepared: &[Prepared], output: &Path) -> Result<u64, PackError> {
    let fail = |e: io::Error| PackError::OutputWriteFailure(output.to_path_buf(), e);
    let dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let temp = NamedTempFile::new_in(dir).map_err(fail)?;
    let mut zip = ZipWriter::new(temp);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    for entry in prepared {
        zip.start_file(entry.name.as_str(), options)
            .map_err(|e| fail(io::Error::other(e)))?;
        zip.write_all(&entry.content).map_err(fail)?;
    }

    let temp = zip.finish().map_err(|e| fail(io::Error::other(e)))?;
    let file = temp.persist(output).map_err(|e| fail(e.error))?;
    let size = file.metadata().map(|m| m.len()).unwrap_or_default();
    Ok(size)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

#[cfg(test)]
mod tests;
