//! Content loading - collects every document under the source directory

use std::fs;
use std::path::Path;

use walkdir::{DirEntry, WalkDir};

use super::{Document, FrontMatter, MarkdownRenderer, Page, Post};
use crate::error::BuildError;

/// Every document of the site, loaded and validated in one pass. Any
/// malformed or incomplete document fails the load; there is no partially
/// loaded store.
#[derive(Debug)]
pub struct ContentStore {
    documents: Vec<Document>,
}

impl ContentStore {
    /// Load all markdown documents under `source_dir`.
    ///
    /// The walk is sorted and the result is ordered by source path, so the
    /// same tree always yields the same sequence. Entries named with a
    /// leading `_` or `.` are reserved and skipped.
    pub fn load_all(source_dir: &Path, markdown: &MarkdownRenderer) -> Result<Self, BuildError> {
        let mut documents = Vec::new();

        if !source_dir.exists() {
            return Ok(Self { documents });
        }

        let walk = WalkDir::new(source_dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_reserved(e));

        for entry in walk {
            let entry = entry.map_err(|e| {
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| source_dir.to_path_buf());
                BuildError::Io {
                    path,
                    source: e.into(),
                }
            })?;

            let path = entry.path();
            if !path.is_file() || !is_markdown_file(path) {
                continue;
            }

            let source = path
                .strip_prefix(source_dir)
                .unwrap_or(path)
                .to_string_lossy()
                .to_string();

            let content = fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
            let (fm, body) = FrontMatter::parse(&source, &content)?;
            documents.push(Document::assemble(&source, fm, body, markdown)?);
        }

        documents.sort_by(|a, b| a.source().cmp(b.source()));
        tracing::debug!("loaded {} documents from {:?}", documents.len(), source_dir);

        Ok(Self { documents })
    }

    /// All documents, ordered by source path.
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Posts ordered newest first; equal dates fall back to source order.
    pub fn posts(&self) -> Vec<&Post> {
        let mut posts: Vec<&Post> = self
            .documents
            .iter()
            .filter_map(|d| match d {
                Document::Post(p) => Some(p),
                Document::Page(_) => None,
            })
            .collect();
        posts.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.source.cmp(&b.source)));
        posts
    }

    /// Pages in source order.
    pub fn pages(&self) -> Vec<&Page> {
        self.documents
            .iter()
            .filter_map(|d| match d {
                Document::Page(p) => Some(p),
                Document::Post(_) => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Check if a file is a markdown file
pub(crate) fn is_markdown_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e == "md" || e == "markdown")
        .unwrap_or(false)
}

/// Names starting with `_` or `.` are reserved (drafts, editor droppings).
pub(crate) fn is_reserved(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|n| n.starts_with('_') || n.starts_with('.'))
        .unwrap_or(false)
}
