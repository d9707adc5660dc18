//! Utility modules shared by the packing pipeline.

pub mod exec;
pub mod path;
pub mod plural;

pub use plural::plural_count;
