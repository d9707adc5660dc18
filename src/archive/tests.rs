use super::*;
use crate::{monitor::AccessEvent, resolver, utils::path::normalize_path};
use std::{io::Read, time::Instant};
use tempfile::TempDir;

fn tree(files: &[(&str, &[u8])]) -> (TempDir, PathBuf) {
    let temp = TempDir::new().unwrap();
    let base = normalize_path(temp.path());
    for (rel, content) in files {
        let path = base.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
    (temp, base)
}

fn required(root: &Path, rels: &[&str]) -> RequiredFileSet {
    let at = Instant::now();
    let events: Vec<_> = rels
        .iter()
        .map(|rel| AccessEvent::opened(root.join(rel), at))
        .collect();
    resolver::resolve(&events, root, &root.join("main.tex")).0
}

fn read_zip(path: &Path) -> Vec<(String, String)> {
    let mut archive = zip::ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut file = archive.by_index(i).unwrap();
            let mut content = String::new();
            file.read_to_string(&mut content).unwrap();
            (file.name().to_string(), content)
        })
        .collect()
}

fn find<'a>(prepared: &'a [Prepared], name: &str) -> &'a Prepared {
    prepared.iter().find(|p| p.name == name).unwrap()
}

#[test]
fn test_bib_dropped_unless_kept() {
    let (_t, root) = tree(&[("main.tex", b"x"), ("refs.bib", b"@book{}")]);
    let set = required(&root, &["main.tex", "refs.bib"]);

    let manifest = Manifest::from_required(&set, &root, &PackConfig::default());
    assert_eq!(manifest.names().collect::<Vec<_>>(), vec!["main.tex"]);

    let keep = PackConfig {
        keep_bib: true,
        ..Default::default()
    };
    let manifest = Manifest::from_required(&set, &root, &keep);
    assert!(manifest.contains("refs.bib"));
}

#[test]
fn test_generated_bbl_named_after_aux() {
    let (_t, out) = tree(&[
        ("main.bbl", b"bbl"),
        ("chapters/one.bbl", b"bbl"),
        ("main.aux", b"aux"),
    ]);
    let mut manifest = Manifest::default();
    manifest.add_generated_bbl(&out);
    assert_eq!(
        manifest.names().collect::<Vec<_>>(),
        vec!["chapters/one.bbl", "main.bbl"]
    );
}

#[test]
fn test_first_source_wins_on_name_clash() {
    let (_t, root) = tree(&[("main.tex", b"root"), ("other/main.tex", b"other")]);
    let mut manifest = Manifest::default();
    manifest.add_extras(vec![
        ("main.tex".into(), root.join("main.tex")),
        ("main.tex".into(), root.join("other/main.tex")),
    ]);
    assert_eq!(manifest.len(), 1);

    let (prepared, _) = prepare(&manifest, &PackConfig::default());
    assert_eq!(prepared[0].content, b"root");
}

#[test]
fn test_prepare_strips_only_text_sources() {
    let (_t, root) = tree(&[
        ("main.tex", b"Hello % greeting\n\\input{intro}\n"),
        ("intro.tex", b"% header\nBody.\n"),
        ("style.sty", b"\\def\\x{1} % kept in sty\n"),
        ("fig.pdf", b"%PDF-1.5 binary % bytes"),
    ]);
    let set = required(&root, &["main.tex", "intro.tex", "style.sty", "fig.pdf"]);
    let manifest = Manifest::from_required(&set, &root, &PackConfig::default());

    let (prepared, warnings) = prepare(&manifest, &PackConfig::default());
    assert!(warnings.is_empty());
    assert_eq!(find(&prepared, "main.tex").content, b"Hello\n\\input{intro}\n");
    assert_eq!(find(&prepared, "intro.tex").content, b"\nBody.\n");
    assert_eq!(find(&prepared, "style.sty").content, b"\\def\\x{1} % kept in sty\n");
    assert_eq!(find(&prepared, "fig.pdf").content, b"%PDF-1.5 binary % bytes");
    assert!(find(&prepared, "main.tex").stripped);
    assert!(!find(&prepared, "fig.pdf").stripped);
}

#[test]
fn test_configured_extensions_stripped() {
    let (_t, root) = tree(&[("main.tex", b"a\n"), ("style.sty", b"\\def\\x{1} % c\n")]);
    let config = PackConfig {
        strip_extensions: vec!["tex".into(), "STY".into()],
        ..Default::default()
    };
    let manifest = Manifest::from_required(&required(&root, &["main.tex", "style.sty"]), &root, &config);
    let (prepared, _) = prepare(&manifest, &config);
    assert_eq!(find(&prepared, "style.sty").content, b"\\def\\x{1}\n");
}

#[test]
fn test_unbalanced_verbatim_shipped_unstripped() {
    let original = b"a % c\n\\begin{verbatim}\n% never closed\n";
    let (_t, root) = tree(&[("main.tex", original)]);
    let manifest = Manifest::from_required(&required(&root, &["main.tex"]), &root, &PackConfig::default());

    let (prepared, warnings) = prepare(&manifest, &PackConfig::default());
    assert_eq!(prepared[0].content, original);
    assert!(!prepared[0].stripped);
    assert_eq!(
        warnings,
        vec![Warning::UnbalancedVerbatimRegion {
            path: root.join("main.tex"),
            line: 2,
        }]
    );
}

#[test]
fn test_non_utf8_shipped_unstripped() {
    let original: &[u8] = b"caf\xe9 % latin-1\n";
    let (_t, root) = tree(&[("main.tex", original)]);
    let manifest = Manifest::from_required(&required(&root, &["main.tex"]), &root, &PackConfig::default());

    let (prepared, warnings) = prepare(&manifest, &PackConfig::default());
    assert_eq!(prepared[0].content, original);
    assert_eq!(warnings, vec![Warning::NotUtf8(root.join("main.tex"))]);
}

#[test]
fn test_vanished_before_packing_dropped() {
    let (_t, root) = tree(&[("main.tex", b"x"), ("gone.tex", b"y")]);
    let manifest =
        Manifest::from_required(&required(&root, &["main.tex", "gone.tex"]), &root, &PackConfig::default());
    fs::remove_file(root.join("gone.tex")).unwrap();

    let (prepared, warnings) = prepare(&manifest, &PackConfig::default());
    assert_eq!(prepared.len(), 1);
    assert_eq!(warnings, vec![Warning::VanishedFile(root.join("gone.tex"))]);
}

#[test]
fn test_verbatim_environment_declared_in_other_file() {
    let (_t, root) = tree(&[
        ("main.tex", b"\\input{defs}\n\\begin{code}\n50% off\n\\end{code}\n"),
        ("defs.tex", b"\\lstnewenvironment{code}{}{}\n"),
    ]);
    let manifest =
        Manifest::from_required(&required(&root, &["main.tex", "defs.tex"]), &root, &PackConfig::default());

    let (prepared, warnings) = prepare(&manifest, &PackConfig::default());
    assert!(warnings.is_empty());
    assert_eq!(
        find(&prepared, "main.tex").content,
        b"\\input{defs}\n\\begin{code}\n50% off\n\\end{code}\n"
    );
}

#[test]
fn test_extra_outside_root_in_archive() {
    let (_t, root) = tree(&[("main.tex", b"\\input{used} % c\n"), ("used.tex", b"u\n"), ("unused.tex", b"n\n")]);
    let (_o, elsewhere) = tree(&[("shared/notes.tex", b"note % private\n"), ("shared/logo.png", b"png")]);

    let mut manifest =
        Manifest::from_required(&required(&root, &["main.tex", "used.tex"]), &root, &PackConfig::default());
    manifest.add_extras(
        extras::resolve(
            &[elsewhere.join("shared/notes.tex"), elsewhere.join("shared/logo.png")],
            &root,
        )
        .unwrap(),
    );

    let (prepared, _) = prepare(&manifest, &PackConfig::default());
    let output = root.join("submission.zip");
    let size = write(&prepared, &output).unwrap();
    assert!(size > 0);

    assert_eq!(
        read_zip(&output),
        vec![
            ("logo.png".to_string(), "png".to_string()),
            ("main.tex".to_string(), "\\input{used}\n".to_string()),
            ("notes.tex".to_string(), "note\n".to_string()),
            ("used.tex".to_string(), "u\n".to_string()),
        ]
    );
}

#[test]
fn test_write_replaces_existing_archive() {
    let (_t, dir) = tree(&[("out.zip", b"stale")]);
    let prepared = vec![Prepared {
        name: "a/b.tex".into(),
        content: b"x".to_vec(),
        stripped: false,
    }];
    write(&prepared, &dir.join("out.zip")).unwrap();
    assert_eq!(read_zip(&dir.join("out.zip")), vec![("a/b.tex".to_string(), "x".to_string())]);
}

#[test]
fn test_write_failure_leaves_nothing() {
    let (_t, dir) = tree(&[]);
    let output = dir.join("missing-dir/out.zip");
    let err = write(&[], &output).unwrap_err();
    assert!(matches!(err, PackError::OutputWriteFailure(ref p, _) if *p == output));
    assert!(!output.exists());
    assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
}

#[test]
fn test_comment_only_lines_in_paragraph_warned() {
    let (_t, root) = tree(&[(
        "main.tex",
        b"\\begin{document}\nOne\n% aside\ntwo.\n\n% section note\n\\section{A}\n",
    )]);
    let manifest = Manifest::from_required(&required(&root, &["main.tex"]), &root, &PackConfig::default());

    let (prepared, warnings) = prepare(&manifest, &PackConfig::default());
    assert!(prepared[0].stripped);
    assert_eq!(
        warnings,
        vec![Warning::ParagraphBreaks {
            path: root.join("main.tex"),
            lines: vec![3],
        }]
    );
}

#[test]
fn test_extra_already_required_kept_once() {
    let (_t, root) = tree(&[("main.tex", b"x"), ("used.tex", b"u")]);
    let mut manifest =
        Manifest::from_required(&required(&root, &["main.tex", "used.tex"]), &root, &PackConfig::default());
    manifest.add_extras(extras::resolve(&[root.join("used.tex")], &root).unwrap());
    assert_eq!(manifest.names().collect::<Vec<_>>(), vec!["main.tex", "used.tex"]);
}
