//! `[compile]` section: which toolchain the compilation driver runs.
//!
//! # Example
//!
//! ```toml
//! [compile]
//! compiler = "lualatex"
//! bibliography = "biber"
//! shell_escape = false
//! extra_passes = 2
//! grace_ms = 250
//! ```

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::monitor::DEFAULT_GRACE_MS;

/// LaTeX engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    #[default]
    Pdflatex,
    Lualatex,
}

impl Engine {
    pub const fn program(self) -> &'static str {
        match self {
            Self::Pdflatex => "pdflatex",
            Self::Lualatex => "lualatex",
        }
    }
}

/// Bibliography processor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BibTool {
    #[default]
    Bibtex,
    Biber,
    /// Never run a bibliography pass.
    None,
}

impl BibTool {
    pub const fn program(self) -> Option<&'static str> {
        match self {
            Self::Bibtex => Some("bibtex"),
            Self::Biber => Some("biber"),
            Self::None => None,
        }
    }
}

/// Compiler configuration, immutable for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub compiler: Engine,
    pub bibliography: BibTool,
    /// Pass `--shell-escape` to the engine.
    pub shell_escape: bool,
    /// Engine passes after the bibliography pass.
    pub extra_passes: u32,
    /// Event flush grace period after each pass, in milliseconds.
    pub grace_ms: u64,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            compiler: Engine::default(),
            bibliography: BibTool::default(),
            shell_escape: false,
            extra_passes: 2,
            grace_ms: DEFAULT_GRACE_MS,
        }
    }
}

impl CompilerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.extra_passes > 8 {
            return Err(ConfigError::Validation(format!(
                "compile.extra_passes = {} (at most 8)",
                self.extra_passes
            )));
        }
        if self.grace_ms > 10_000 {
            return Err(ConfigError::Validation(format!(
                "compile.grace_ms = {} (at most 10000)",
                self.grace_ms
            )));
        }
        Ok(())
    }

    pub fn grace(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.grace_ms)
    }
}
