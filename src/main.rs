//! arxify - Package a LaTeX project into a minimal arXiv submission archive.

mod archive;
mod cli;
mod config;
mod core;
mod driver;
mod error;
mod logger;
mod monitor;
mod resolver;
mod strip;
mod utils;
mod workspace;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::Cli;
use config::ArxifyConfig;

fn main() {
    if let Err(err) = run() {
        log!("error"; "{err:#}");
        let code = if core::is_shutdown() { 130 } else { 1 };
        std::process::exit(code);
    }
}

fn run() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config = ArxifyConfig::load(&cli)?;
    debug!("config"; "root {}, output {}", config.root.display(), config.output.display());

    cli::pack::pack_project(&config)
}
