//! Packing error taxonomy.
//!
//! Fatal errors abort the run before any archive is written. Recoverable
//! conditions ([`Warning`]) are collected and logged instead of returned.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal packing errors. Each variant names the component that failed.
#[derive(Debug, Error)]
pub enum PackError {
    #[error("access monitor unavailable: {0}")]
    MonitorUnavailable(String),

    #[error("compilation driver: {0}")]
    CompilationUnrecoverable(String),

    #[error("archive assembler: cannot write `{0}`")]
    OutputWriteFailure(PathBuf, #[source] std::io::Error),

    #[error("included file `{0}` does not exist")]
    MissingExtraFile(PathBuf),

    #[error("interrupted")]
    Cancelled,
}

impl PackError {
    pub fn monitor(msg: impl Into<String>) -> Self {
        Self::MonitorUnavailable(msg.into())
    }

    pub fn compilation(msg: impl Into<String>) -> Self {
        Self::CompilationUnrecoverable(msg.into())
    }
}

/// Recoverable conditions met while resolving and packing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// Observed path no longer exists or is no longer a regular file.
    VanishedFile(PathBuf),
    /// Stripping refused; the file is shipped unstripped.
    UnbalancedVerbatimRegion { path: PathBuf, line: usize },
    /// Not valid UTF-8; the file is shipped unstripped.
    NotUtf8(PathBuf),
    /// Removed comment-only lines now read as paragraph breaks.
    ParagraphBreaks { path: PathBuf, lines: Vec<usize> },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VanishedFile(path) => {
                write!(f, "`{}` vanished after being read, skipped", path.display())
            }
            Self::UnbalancedVerbatimRegion { path, line } => write!(
                f,
                "unbalanced verbatim region at {}:{line}, included unstripped",
                path.display()
            ),
            Self::NotUtf8(path) => {
                write!(f, "`{}` is not UTF-8, included unstripped", path.display())
            }
            Self::ParagraphBreaks { path, lines } => write!(
                f,
                "{}: comment-only lines now break a paragraph at line {}",
                path.display(),
                lines
                    .iter()
                    .map(usize::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

/// Log collected warnings under the `warning` prefix.
pub fn log_warnings(warnings: &[Warning]) {
    for warning in warnings {
        crate::log!("warning"; "{}", warning);
    }
}
