//! Core types - pure abstractions shared across the codebase.

mod state;

pub use state::{check_shutdown, is_shutdown, setup_shutdown_handler};
