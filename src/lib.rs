//! gazette: a strict static blog generator
//!
//! Markdown documents with YAML front matter are validated against a
//! per-layout schema, rendered, and committed to the output directory in
//! one shot. Invalid content fails the whole build; nothing is written
//! until every page has rendered.

pub mod commands;
pub mod config;
pub mod content;
pub mod error;
pub mod helpers;
pub mod render;
pub mod server;
pub mod templates;

use std::path::{Path, PathBuf};

use error::BuildError;

/// The site being built: configuration plus resolved directories.
#[derive(Clone)]
pub struct Site {
    /// Site configuration
    pub config: config::SiteConfig,
    /// Base directory
    pub base_dir: PathBuf,
    /// Source directory
    pub source_dir: PathBuf,
    /// Public (output) directory
    pub public_dir: PathBuf,
    /// Site-local template directory, when configured
    pub template_dir: Option<PathBuf>,
}

impl Site {
    /// Create a site rooted at `base_dir`, reading `_config.yml` when
    /// present.
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, BuildError> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let config_path = base_dir.join("_config.yml");

        let config = if config_path.exists() {
            config::SiteConfig::load(&config_path)?
        } else {
            config::SiteConfig::default()
        };

        let source_dir = base_dir.join(&config.source_dir);
        let public_dir = base_dir.join(&config.public_dir);
        let template_dir = config.template_dir.as_ref().map(|d| base_dir.join(d));

        Ok(Self {
            config,
            base_dir,
            source_dir,
            public_dir,
            template_dir,
        })
    }

    /// Build the static site.
    pub fn build(&self) -> Result<(), BuildError> {
        commands::build::run(self)
    }
}
