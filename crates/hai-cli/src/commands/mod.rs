//! CLI commands.

pub mod ask;
pub mod memory;
pub mod providers;
