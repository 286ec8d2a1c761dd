//! Subcommand implementations

pub mod catalog;
pub mod predict;
pub mod status;
