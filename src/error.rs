//! Build error types.
//!
//! Every error here is fatal to the run: the build reports the offending
//! file and aborts without publishing a partial output set.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, validating, or rendering a site.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The front-matter block is structurally broken: missing delimiter,
    /// unparseable YAML, an unknown `layout`, or an invalid date.
    #[error("{source_file}: malformed front matter: {reason}")]
    MalformedFrontMatter { source_file: String, reason: String },

    /// A document lacks a field its layout requires.
    #[error("{source_file}: missing required field `{field}` for layout `{layout}`")]
    MissingRequiredField {
        source_file: String,
        layout: &'static str,
        field: &'static str,
    },

    /// A layout referenced a template that is not registered.
    #[error("template `{name}` not found")]
    TemplateNotFound { name: String },

    /// Two documents resolved to the same output path.
    #[error("duplicate output path `{route}`: produced by both {first} and {second}")]
    DuplicatePath {
        route: String,
        first: String,
        second: String,
    },

    /// Template rendering failed for reasons other than a missing template.
    #[error("failed to render template `{name}`: {reason}")]
    Render { name: String, reason: String },

    /// Site configuration could not be read or parsed.
    #[error("invalid site config `{path}`: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("IO error on `{path}`")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BuildError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn malformed(source_file: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedFrontMatter {
            source_file: source_file.into(),
            reason: reason.into(),
        }
    }
}
