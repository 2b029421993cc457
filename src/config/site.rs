//! Site configuration (_config.yml)

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::BuildError;

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,
    pub description: String,
    pub author: String,

    // URL
    pub url: String,
    pub root: String,
    /// Output path pattern for posts. Supports `:year`, `:month`, `:day`,
    /// `:title` (slugified) and `:category` placeholders.
    pub permalink: String,

    // Directory
    pub source_dir: String,
    pub public_dir: String,
    pub category_dir: String,
    /// When set, templates load from this directory instead of the
    /// built-in ones. Relative to the site root.
    pub template_dir: Option<String>,

    // Presentation
    /// Display format for dates, Moment.js style (e.g. `YYYY-MM-DD`).
    pub date_format: String,
    pub highlight: HighlightConfig,

    // Pagination
    pub per_page: usize,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Gazette".to_string(),
            description: String::new(),
            author: String::new(),

            url: "http://example.com".to_string(),
            root: "/".to_string(),
            permalink: ":year/:month/:day/:title/".to_string(),

            source_dir: "source".to_string(),
            public_dir: "public".to_string(),
            category_dir: "categories".to_string(),
            template_dir: None,

            date_format: "YYYY-MM-DD".to_string(),
            highlight: HighlightConfig::default(),

            per_page: 10,
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, BuildError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
        serde_yaml::from_str(&content).map_err(|e| BuildError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Site base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

/// Syntax highlighting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    pub theme: String,
    pub line_number: bool,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            theme: "base16-ocean.dark".to_string(),
            line_number: false,
        }
    }
}
