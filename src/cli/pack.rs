//! Packing pipeline.
//!
//! - **Extras** - resolve `--include` paths (fail fast on missing ones)
//! - **Stage** - copy the project into a temporary working directory
//! - **Compile** - monitored engine/bibliography passes
//! - **Resolve** - access events → required file set
//! - **Assemble** - manifest, comment stripping, zip

use crate::{
    archive::{self, Manifest, extras},
    config::ArxifyConfig,
    core::check_shutdown,
    debug,
    driver::{self, PassResult, PassStatus, Toolchain},
    error::log_warnings,
    log,
    resolver,
    utils::{plural::plural_count_with, plural_count},
    workspace::Workspace,
};
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Package the configured project into its archive.
///
/// The working directory is removed on success unless `--keep-workdir` is
/// set; after a failure it is always kept for inspection.
pub fn pack_project(config: &ArxifyConfig) -> Result<()> {
    let extras = extras::resolve(&config.pack.include, &config.root)?;
    let toolchain = Toolchain::locate(&config.compile)?;

    let workspace = Workspace::stage(&config.root)
        .with_context(|| format!("failed to stage `{}`", config.root.display()))?;

    let result = pack_staged(config, &workspace, toolchain, extras);

    if result.is_err() || config.keep_workdir {
        let kept = workspace.keep();
        log!("pack"; "working directory kept at {}", kept.display());
    }
    result
}

fn pack_staged(
    config: &ArxifyConfig,
    workspace: &Workspace,
    toolchain: Toolchain,
    extras: Vec<(String, PathBuf)>,
) -> Result<()> {
    let main = config.main_relative();
    log!("pack"; "compiling {} ({})", main.display(), config.compile.compiler.program());

    let compilation = driver::run(toolchain, &main, &config.compile, workspace)?;
    report_passes(&compilation.passes);
    check_shutdown()?;

    let (required, mut warnings) =
        resolver::resolve(&compilation.events, workspace.root(), &workspace.root().join(&main));
    log!("pack"; "{} used by the compilation", plural_count(required.len(), "file"));

    let mut manifest = Manifest::from_required(&required, workspace.root(), &config.pack);
    if config.pack.include_bbl {
        manifest.add_generated_bbl(workspace.out());
    }
    manifest.add_extras(extras::rebase(extras, &config.root, workspace.root()));
    debug!("pack"; "{} in the manifest", plural_count_with(manifest.len(), "entry", "entries"));

    let (prepared, strip_warnings) = archive::prepare(&manifest, &config.pack);
    warnings.extend(strip_warnings);
    log_warnings(&warnings);
    archive::list(&prepared);

    if config.dry_run {
        log!("pack"; "dry run, {} not written", config.output.display());
        return Ok(());
    }

    check_shutdown()?;
    let size = archive::write(&prepared, &config.output)?;
    log!(
        "pack";
        "wrote {} ({}, {} bytes{})",
        config.output.display(),
        plural_count(prepared.len(), "file"),
        size,
        if warnings.is_empty() { String::new() } else { format!(", {}", plural_count(warnings.len(), "warning")) }
    );
    Ok(())
}

/// Per-pass recap, plus a warning when the last pass did not succeed: the
/// files it would have read after failing are missing from the archive.
fn report_passes(passes: &[PassResult]) {
    for pass in passes {
        debug!(
            "compile";
            "pass {}: {} {} → {:?}, {}",
            pass.index,
            pass.tool,
            pass.target.display(),
            pass.status,
            plural_count_with(pass.events, "access", "accesses")
        );
    }

    let Some(last) = passes.last().filter(|p| p.status != PassStatus::Succeeded) else {
        return;
    };
    let hint = last
        .log
        .as_ref()
        .map(|p| format!(", see {}", p.display()))
        .unwrap_or_default();
    log!("warning"; "final {} pass did not succeed, the archive may be incomplete{hint}", last.tool);
}
