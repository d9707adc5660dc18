//! Path utilities.
//!
//! - [`fs`]: Filesystem path normalization (`normalize_path`, `resolve_path`)
//!   and trust-boundary checks (`is_within`, `relative_to`)

pub mod fs;

pub use fs::{is_within, normalize_path, relative_to, resolve_path};
