//! Command-line interface definitions.

use crate::config::{BibTool, Engine};
use clap::{ColorChoice, Parser};
use std::path::PathBuf;

/// Package a LaTeX project into a minimal arXiv submission archive
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Root document of the project
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub main_tex_file: PathBuf,

    /// Archive path (`.zip` is appended when missing)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub output: PathBuf,

    /// Project root; files outside it are never shipped (default: directory of the root document)
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub root: Option<PathBuf>,

    /// LaTeX engine
    #[arg(short, long, value_enum)]
    pub compiler: Option<Engine>,

    /// Bibliography processor
    #[arg(short, long, value_enum)]
    pub bibliography: Option<BibTool>,

    /// Extra files or directories to ship even if never read
    #[arg(short, long, num_args = 1.., value_hint = clap::ValueHint::AnyPath)]
    pub include: Vec<PathBuf>,

    /// Allow the engine to run external commands
    #[arg(long)]
    pub shell_escape: bool,

    /// Config file path (default: <root>/arxify.toml if present)
    #[arg(short = 'C', long, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Compile and list the archive contents without writing it
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Keep the temporary working copy and print its location
    #[arg(long)]
    pub keep_workdir: bool,

    /// Enable verbose output (engine output goes to the terminal)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Control colored output (auto, always, never)
    #[arg(long, default_value = "auto")]
    pub color: ColorChoice,
}
