//! Content module - document parsing, validation, and markdown rendering

mod document;
mod frontmatter;
mod loader;
mod markdown;

pub use document::{Document, Page, Post};
pub use frontmatter::FrontMatter;
pub use loader::ContentStore;
pub(crate) use loader::{is_markdown_file, is_reserved};
pub use markdown::MarkdownRenderer;
