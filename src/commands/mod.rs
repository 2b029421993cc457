//! CLI command implementations

pub mod build;
