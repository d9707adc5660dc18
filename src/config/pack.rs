//! `[pack]` section: what goes into the archive besides discovered files.
//!
//! # Example
//!
//! ```toml
//! [pack]
//! include = ["figures/teaser.png", "~/shared/macros.sty"]
//! strip_extensions = ["tex", "sty"]
//! verbatim_environments = ["pylisting"]
//! keep_bib = false
//! include_bbl = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackConfig {
    /// Extra files or directories, shipped whether read or not.
    pub include: Vec<PathBuf>,
    /// Extensions (without dot) of files whose comments are stripped.
    pub strip_extensions: Vec<String>,
    /// Additional environment names treated as verbatim.
    pub verbatim_environments: Vec<String>,
    /// Ship `.bib` sources alongside the generated `.bbl`.
    pub keep_bib: bool,
    /// Ship `.bbl` files produced by the bibliography pass.
    pub include_bbl: bool,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            strip_extensions: vec!["tex".into()],
            verbatim_environments: Vec::new(),
            keep_bib: false,
            include_bbl: true,
        }
    }
}

impl PackConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(bad) = self
            .strip_extensions
            .iter()
            .find(|ext| ext.is_empty() || ext.contains(['.', '/']))
        {
            return Err(ConfigError::Validation(format!(
                "pack.strip_extensions: `{bad}` is not a bare extension"
            )));
        }
        Ok(())
    }

    /// Whether `path` gets its comments stripped.
    pub fn strips(&self, path: &std::path::Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.strip_extensions.iter().any(|s| s.eq_ignore_ascii_case(ext)))
    }
}
