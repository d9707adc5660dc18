//! Command-line interface module.

mod args;
pub mod pack;

pub use args::Cli;
