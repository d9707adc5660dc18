//! Temporary working copy of the project.
//!
//! ```text
//! <tmp>/arxify-XXXX/
//! ├── root/   # staged copy of the project root (compiled and watched)
//! └── out/    # -output-directory: aux, log, pdf, bbl ...
//! ```
//!
//! The user's tree is only ever read. Compiler byproducts land in `out/`,
//! outside the watched root, so they never show up as accesses.
//!
//! Symlinks are resolved while staging. A link whose target lies inside the
//! project root is materialized (files copied, directories followed); a link
//! pointing outside stays a link to the canonical target, so reads through it
//! are reported outside the staged root and never ship.

use crate::{
    debug,
    utils::path::{is_within, normalize_path},
};
use anyhow::{Context, Result};
use jwalk::WalkDir;
use rayon::prelude::*;
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use tempfile::TempDir;

/// Version control directories never staged.
const SKIPPED_DIRS: &[&str] = &[".git", ".hg", ".svn"];

pub struct Workspace {
    dir: TempDir,
    root: PathBuf,
    out: PathBuf,
}

impl Workspace {
    /// Copy `source` into a fresh temporary directory.
    pub fn stage(source: &Path) -> Result<Self> {
        let dir = TempDir::with_prefix("arxify-").context("failed to create working directory")?;
        let base = normalize_path(dir.path());
        let root = base.join("root");
        let out = base.join("out");

        let tree = collect_tree(&normalize_path(source));
        fs::create_dir_all(&root).context("failed to create staged root")?;
        for rel in &tree.dirs {
            fs::create_dir_all(root.join(rel))
                .with_context(|| format!("failed to stage directory `{}`", rel.display()))?;
        }
        tree.files.par_iter().try_for_each(|(rel, from)| {
            fs::copy(from, root.join(rel))
                .map(|_| ())
                .with_context(|| format!("failed to stage `{}`", from.display()))
        })?;
        for (rel, target) in &tree.links {
            link(target, &root.join(rel))
                .with_context(|| format!("failed to link `{}`", target.display()))?;
        }

        let workspace = Self { dir, root, out };
        workspace.mirror_dirs(&tree)?;
        debug!(
            "stage";
            "{} files copied, {} linked outside the root, to {}",
            tree.files.len(),
            tree.links.len(),
            workspace.root.display()
        );
        Ok(workspace)
    }

    /// Staged project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Compiler output directory.
    pub fn out(&self) -> &Path {
        &self.out
    }

    /// Location of the whole working directory.
    #[cfg(test)]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Persist the working directory past this run and return its path.
    pub fn keep(self) -> PathBuf {
        self.dir.keep()
    }

    /// Recreate the root's directory skeleton under `out/` so that
    /// `\include{sub/file}` can write `sub/file.aux`.
    fn mirror_dirs(&self, tree: &Tree) -> Result<()> {
        fs::create_dir_all(&self.out).context("failed to create output directory")?;
        let linked_dirs = tree
            .links
            .iter()
            .filter(|(_, target)| target.is_dir())
            .map(|(rel, _)| rel);
        for rel in tree.dirs.iter().chain(linked_dirs) {
            fs::create_dir_all(self.out.join(rel))
                .with_context(|| format!("failed to mirror `{}`", rel.display()))?;
        }
        Ok(())
    }
}

/// What to stage, relative to the staged root.
#[derive(Debug, Default)]
struct Tree {
    dirs: Vec<PathBuf>,
    /// `(staged path, file to copy)`
    files: Vec<(PathBuf, PathBuf)>,
    /// `(staged path, canonical target outside the root)`
    links: Vec<(PathBuf, PathBuf)>,
}

/// Walk the canonical `source` root.
fn collect_tree(source: &Path) -> Tree {
    let mut tree = Tree::default();
    let mut followed = vec![source.to_path_buf()];
    collect_dir(source, source, Path::new(""), &mut followed, &mut tree);
    tree
}

/// Collect `dir` (canonical) into `tree` under `prefix`.
///
/// `followed` holds the directories currently being walked; a link back
/// into one of them is a cycle and is not followed again.
fn collect_dir(
    boundary: &Path,
    dir: &Path,
    prefix: &Path,
    followed: &mut Vec<PathBuf>,
    tree: &mut Tree,
) {
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .skip_hidden(false)
        .sort(true)
        .process_read_dir(|_, _, _, children| {
            children.retain(|entry| {
                entry.as_ref().map_or(true, |e| {
                    !(e.file_type().is_dir()
                        && e.file_name().to_str().is_some_and(|n| SKIPPED_DIRS.contains(&n)))
                })
            });
        });

    for entry in walker.into_iter().filter_map(Result::ok) {
        let path = entry.path();
        let Ok(rel) = path.strip_prefix(dir) else {
            continue;
        };
        let rel = prefix.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            tree.dirs.push(rel);
        } else if file_type.is_file() {
            tree.files.push((rel, path));
        } else if file_type.is_symlink() {
            let Ok(target) = fs::canonicalize(&path) else {
                debug!("stage"; "dangling link {} skipped", path.display());
                continue;
            };
            if target != boundary && !is_within(&target, boundary) {
                tree.links.push((rel, target));
            } else if target.is_file() {
                tree.files.push((rel, target));
            } else if target.is_dir() {
                let cycle = path.parent().is_some_and(|p| p.starts_with(&target))
                    || followed.iter().any(|d| d.starts_with(&target));
                if cycle {
                    debug!("stage"; "link cycle at {} not followed", path.display());
                    continue;
                }
                tree.dirs.push(rel.clone());
                followed.push(target.clone());
                collect_dir(boundary, &target, &rel, followed, tree);
                followed.pop();
            }
        }
    }
}

#[cfg(unix)]
fn link(target: &Path, at: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, at)
}

#[cfg(windows)]
fn link(target: &Path, at: &Path) -> io::Result<()> {
    if target.is_dir() {
        std::os::windows::fs::symlink_dir(target, at)
    } else {
        std::os::windows::fs::symlink_file(target, at)
    }
}

#[cfg(not(any(unix, windows)))]
fn link(_target: &Path, _at: &Path) -> io::Result<()> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "symbolic links are not supported"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{monitor::AccessEvent, resolver};
    use std::time::Instant;

    fn project() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("chapters/deep")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("main.tex"), "main").unwrap();
        fs::write(root.join("chapters/intro.tex"), "intro").unwrap();
        fs::write(root.join("chapters/deep/x.tex"), "x").unwrap();
        fs::write(root.join(".git/HEAD"), "ref").unwrap();
        fs::write(root.join(".latexmkrc"), "").unwrap();
        temp
    }

    #[test]
    fn test_stage_copies_tree() {
        let temp = project();
        let ws = Workspace::stage(temp.path()).unwrap();

        assert_eq!(fs::read_to_string(ws.root().join("main.tex")).unwrap(), "main");
        assert_eq!(
            fs::read_to_string(ws.root().join("chapters/deep/x.tex")).unwrap(),
            "x"
        );
        assert!(ws.root().join(".latexmkrc").is_file());
        assert!(!ws.root().join(".git").exists());
    }

    #[test]
    fn test_output_mirrors_directories() {
        let temp = project();
        let ws = Workspace::stage(temp.path()).unwrap();

        assert!(ws.out().join("chapters/deep").is_dir());
        assert!(!ws.out().join("main.tex").exists());
        assert!(!ws.out().starts_with(ws.root()));
    }

    #[test]
    fn test_removed_on_drop() {
        let temp = project();
        let ws = Workspace::stage(temp.path()).unwrap();
        let path = ws.path().to_path_buf();
        drop(ws);
        assert!(!path.exists());
    }

    #[test]
    fn test_keep_persists() {
        let temp = project();
        let ws = Workspace::stage(temp.path()).unwrap();
        let path = ws.keep();
        assert!(path.join("root/main.tex").is_file());
        fs::remove_dir_all(path).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_file_inside_root_is_copied() {
        let temp = project();
        std::os::unix::fs::symlink(
            temp.path().join("chapters/intro.tex"),
            temp.path().join("alias.tex"),
        )
        .unwrap();

        let ws = Workspace::stage(temp.path()).unwrap();
        let staged = ws.root().join("alias.tex");
        assert!(!fs::symlink_metadata(&staged).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(staged).unwrap(), "intro");
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_file_outside_root_never_required() {
        let temp = project();
        let shared = TempDir::new().unwrap();
        let secret = normalize_path(shared.path()).join("secret.sty");
        fs::write(&secret, "sty").unwrap();
        std::os::unix::fs::symlink(&secret, temp.path().join("secret.sty")).unwrap();

        let ws = Workspace::stage(temp.path()).unwrap();
        let staged = ws.root().join("secret.sty");
        assert_eq!(fs::read_link(&staged).unwrap(), secret);
        assert_eq!(fs::read_to_string(&staged).unwrap(), "sty");

        let at = Instant::now();
        let events = vec![
            AccessEvent::opened(ws.root().join("main.tex"), at),
            AccessEvent::opened(staged, at),
        ];
        let (set, _) = resolver::resolve(&events, ws.root(), &ws.root().join("main.tex"));
        let required: Vec<_> = set.iter().map(Path::to_path_buf).collect();
        assert_eq!(required, vec![ws.root().join("main.tex")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directory_inside_root_followed() {
        let temp = project();
        fs::create_dir_all(temp.path().join("real")).unwrap();
        fs::write(temp.path().join("real/sec.tex"), "sec").unwrap();
        std::os::unix::fs::symlink(temp.path().join("real"), temp.path().join("sections")).unwrap();

        let ws = Workspace::stage(temp.path()).unwrap();
        let sections = ws.root().join("sections");
        assert!(!fs::symlink_metadata(&sections).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(sections.join("sec.tex")).unwrap(), "sec");
        assert!(ws.root().join("real/sec.tex").is_file());
        assert!(ws.out().join("sections").is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directory_outside_root_linked() {
        let temp = project();
        let shared = TempDir::new().unwrap();
        let styles = normalize_path(shared.path()).join("styles");
        fs::create_dir_all(&styles).unwrap();
        fs::write(styles.join("x.sty"), "x").unwrap();
        std::os::unix::fs::symlink(&styles, temp.path().join("styles")).unwrap();

        let ws = Workspace::stage(temp.path()).unwrap();
        assert_eq!(fs::read_link(ws.root().join("styles")).unwrap(), styles);
        assert!(ws.root().join("styles/x.sty").is_file());

        let events = vec![AccessEvent::opened(ws.root().join("styles/x.sty"), Instant::now())];
        let (set, _) = resolver::resolve(&events, ws.root(), &ws.root().join("main.tex"));
        assert_eq!(set.len(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_cycle_not_followed() {
        let temp = project();
        std::os::unix::fs::symlink(temp.path(), temp.path().join("chapters/loop")).unwrap();
        std::os::unix::fs::symlink(
            temp.path().join("chapters"),
            temp.path().join("chapters/deep/up"),
        )
        .unwrap();

        let ws = Workspace::stage(temp.path()).unwrap();
        assert!(ws.root().join("chapters/intro.tex").is_file());
        assert!(!ws.root().join("chapters/loop").exists());
        assert!(!ws.root().join("chapters/deep/up").exists());
    }
}
