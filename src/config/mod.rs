//! Run configuration: CLI arguments layered over an optional `arxify.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── compile    # [compile] engine, bibliography tool, passes
//! ├── pack       # [pack] extras, stripping, bbl/bib policy
//! ├── error      # ConfigError
//! └── mod.rs     # ArxifyConfig (this file)
//! ```
//!
//! Precedence: CLI flag > `arxify.toml` > built-in default.

mod compile;
mod error;
mod pack;

pub use compile::{BibTool, CompilerConfig, Engine};
pub use error::ConfigError;
pub use pack::PackConfig;

use crate::{cli::Cli, error::PackError, log, utils::path::normalize_path};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Config file looked up in the project root when `--config` is not given.
pub const CONFIG_FILE: &str = "arxify.toml";

/// Root configuration structure representing arxify.toml plus CLI state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArxifyConfig {
    /// Root document, normalized (internal use only)
    #[serde(skip)]
    pub main_file: PathBuf,

    /// Trust boundary, normalized (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Archive destination, always ending in `.zip` (internal use only)
    #[serde(skip)]
    pub output: PathBuf,

    /// Config file actually loaded, if any (internal use only)
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// List files instead of writing the archive (internal use only)
    #[serde(skip)]
    pub dry_run: bool,

    /// Keep the temporary workspace after success (internal use only)
    #[serde(skip)]
    pub keep_workdir: bool,

    #[serde(default)]
    pub compile: CompilerConfig,

    #[serde(default)]
    pub pack: PackConfig,
}

impl ArxifyConfig {
    /// Load configuration from CLI arguments.
    ///
    /// The root document must exist and lie inside the project root; both are
    /// fatal for the compilation driver otherwise.
    pub fn load(cli: &Cli) -> Result<Self> {
        let main_file = normalize_path(&cli.main_tex_file);
        if !main_file.is_file() {
            return Err(PackError::compilation(format!(
                "root document `{}` not found",
                cli.main_tex_file.display()
            ))
            .into());
        }
        if let Err(err) = fs::File::open(&main_file) {
            return Err(PackError::compilation(format!(
                "root document `{}` is not readable: {err}",
                cli.main_tex_file.display()
            ))
            .into());
        }

        let root = match &cli.root {
            Some(root) => normalize_path(root),
            None => main_file
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        };
        if !root.is_dir() {
            return Err(PackError::compilation(format!(
                "project root `{}` is not a directory",
                root.display()
            ))
            .into());
        }
        if !crate::utils::path::is_within(&main_file, &root) {
            return Err(PackError::compilation(format!(
                "root document `{}` is not inside project root `{}`",
                main_file.display(),
                root.display()
            ))
            .into());
        }

        let config_path = match &cli.config {
            Some(path) => Some(normalize_path(path)),
            None => Some(root.join(CONFIG_FILE)).filter(|p| p.is_file()),
        };
        let mut config = match &config_path {
            Some(path) => Self::from_path(path)?,
            None => Self::default(),
        };

        config.main_file = main_file;
        config.root = root;
        config.config_path = config_path;
        config.apply_command_options(cli);
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from TOML string
    #[cfg(test)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::from)?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            log!("warning"; "unknown fields in {} ignored: {}", path.display(), ignored.join(", "));
        }

        crate::debug!("config"; "loaded {}", path.display());
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>)> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })
        .map_err(ConfigError::from)?;
        Ok((config, ignored))
    }

    /// Apply CLI overrides on top of file values.
    fn apply_command_options(&mut self, cli: &Cli) {
        if let Some(compiler) = cli.compiler {
            self.compile.compiler = compiler;
        }
        if let Some(bibliography) = cli.bibliography {
            self.compile.bibliography = bibliography;
        }
        if cli.shell_escape {
            self.compile.shell_escape = true;
        }
        self.pack.include.extend(cli.include.iter().cloned());

        self.output = Self::archive_path(&cli.output);
        self.dry_run = cli.dry_run;
        self.keep_workdir = cli.keep_workdir;
    }

    /// Append `.zip` unless already present, and make absolute.
    fn archive_path(output: &Path) -> PathBuf {
        let has_zip = output
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
        let path = if has_zip {
            output.to_path_buf()
        } else {
            let mut name = output.as_os_str().to_owned();
            name.push(".zip");
            PathBuf::from(name)
        };
        normalize_path(&path)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.compile.validate()?;
        self.pack.validate()
    }

    /// Root document path relative to the project root.
    pub fn main_relative(&self) -> PathBuf {
        self.main_file
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| self.main_file.clone())
    }
}
