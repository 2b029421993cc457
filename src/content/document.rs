//! Document model
//!
//! A `Document` is one parsed content file. The `layout` front-matter key
//! selects the variant, and each variant validates its own required fields
//! at assembly time so malformed content fails the build instead of the
//! rendered output.

use std::path::Path;

use chrono::NaiveDateTime;

use crate::content::frontmatter::{parse_date, FrontMatter};
use crate::content::MarkdownRenderer;
use crate::error::BuildError;

/// A blog post (`layout: post`).
#[derive(Debug, Clone)]
pub struct Post {
    /// Post title
    pub title: String,

    /// Publication timestamp (timezone-naive, as written)
    pub date: NaiveDateTime,

    /// Categories: lowercase tokens, deduplicated and sorted
    pub categories: Vec<String>,

    /// URL-friendly name derived from the title, falling back to the
    /// source file stem
    pub slug: String,

    /// Source file path relative to the source directory (the document id)
    pub source: String,

    /// Raw markdown body
    pub raw: String,

    /// Rendered HTML body
    pub content: String,

    /// HTML rendered from the text above `<!-- more -->`, if present
    pub excerpt: Option<String>,
}

/// A standalone page (`layout: page`).
#[derive(Debug, Clone)]
pub struct Page {
    /// Page title
    pub title: String,

    /// Explicit output path override
    pub permalink: Option<String>,

    /// URL-friendly name derived from the title, falling back to the
    /// source file stem
    pub slug: String,

    /// Source file path relative to the source directory (the document id)
    pub source: String,

    /// Raw markdown body
    pub raw: String,

    /// Rendered HTML body
    pub content: String,
}

/// One content file, tagged by layout.
#[derive(Debug, Clone)]
pub enum Document {
    Post(Post),
    Page(Page),
}

impl Document {
    /// Validate raw front matter against its layout's schema and produce
    /// the rendered document.
    pub fn assemble(
        source: &str,
        fm: FrontMatter,
        body: &str,
        markdown: &MarkdownRenderer,
    ) -> Result<Self, BuildError> {
        let layout = match fm.layout.as_deref() {
            Some(layout) => layout,
            None => return Err(BuildError::malformed(source, "missing `layout` field")),
        };

        match layout {
            "post" => assemble_post(source, fm, body, markdown).map(Document::Post),
            "page" => assemble_page(source, fm, body, markdown).map(Document::Page),
            other => Err(BuildError::malformed(
                source,
                format!("unknown layout `{}`", other),
            )),
        }
    }

    /// Source file path relative to the source directory.
    pub fn source(&self) -> &str {
        match self {
            Document::Post(p) => &p.source,
            Document::Page(p) => &p.source,
        }
    }
}

fn assemble_post(
    source: &str,
    fm: FrontMatter,
    body: &str,
    markdown: &MarkdownRenderer,
) -> Result<Post, BuildError> {
    if fm.permalink.is_some() {
        return Err(BuildError::malformed(
            source,
            "`permalink` is not allowed for layout `post`",
        ));
    }

    let title = required_field(fm.title, source, "post", "title")?;

    let raw_date = match fm.date {
        Some(d) => d,
        None => {
            return Err(BuildError::MissingRequiredField {
                source_file: source.to_string(),
                layout: "post",
                field: "date",
            });
        }
    };
    let date = parse_date(&raw_date).ok_or_else(|| {
        BuildError::malformed(
            source,
            format!(
                "invalid date `{}` (expected `YYYY-MM-DD HH:MM` or `YYYY-MM-DD`)",
                raw_date
            ),
        )
    })?;

    let (excerpt_md, full_md) = MarkdownRenderer::split_excerpt(body);
    let content = markdown.render(&full_md);
    let excerpt = excerpt_md.map(|e| markdown.render(&e));

    Ok(Post {
        slug: derive_slug(&title, source),
        title,
        date,
        categories: normalize_categories(fm.categories),
        source: source.to_string(),
        raw: body.to_string(),
        content,
        excerpt,
    })
}

fn assemble_page(
    source: &str,
    fm: FrontMatter,
    body: &str,
    markdown: &MarkdownRenderer,
) -> Result<Page, BuildError> {
    if fm.date.is_some() {
        return Err(BuildError::malformed(
            source,
            "`date` is not allowed for layout `page`",
        ));
    }

    // permalinks become output paths, so they must stay inside the tree
    if let Some(permalink) = &fm.permalink {
        if permalink.split('/').any(|seg| seg == "..") {
            return Err(BuildError::malformed(
                source,
                "`permalink` may not contain `..`",
            ));
        }
    }

    let title = required_field(fm.title, source, "page", "title")?;

    Ok(Page {
        slug: derive_slug(&title, source),
        title,
        permalink: fm.permalink,
        source: source.to_string(),
        raw: body.to_string(),
        content: markdown.render(body),
    })
}

/// Slug for URLs: the slugified title, or the slugified source file stem
/// when the title has no sluggable characters (a non-blank title like
/// `!!!` passes validation but slugifies to nothing).
fn derive_slug(title: &str, source: &str) -> String {
    let slug = slug::slugify(title);
    if !slug.is_empty() {
        return slug;
    }
    let stem = Path::new(source)
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    slug::slugify(stem)
}

/// Unwrap a required string field, rejecting blank values.
fn required_field(
    value: Option<String>,
    source: &str,
    layout: &'static str,
    field: &'static str,
) -> Result<String, BuildError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(BuildError::MissingRequiredField {
            source_file: source.to_string(),
            layout,
            field,
        }),
    }
}

/// Lowercase, trim, deduplicate, and sort category tokens.
fn normalize_categories(raw: Vec<String>) -> Vec<String> {
    let mut categories: Vec<String> = raw
        .iter()
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty())
        .collect();
    categories.sort();
    categories.dedup();
    categories
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> MarkdownRenderer {
        MarkdownRenderer::new()
    }

    fn front_matter(yaml: &str) -> FrontMatter {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_assemble_post() {
        let fm = front_matter(
            "layout: post\ntitle: Why Rust\ndate: 2016-03-01 09:30\ncategories: [Rust, rust, Opinion]",
        );
        let doc = Document::assemble("why-rust.md", fm, "Body text.", &renderer()).unwrap();

        let post = match doc {
            Document::Post(p) => p,
            Document::Page(_) => panic!("expected a post"),
        };
        assert_eq!(post.title, "Why Rust");
        assert_eq!(post.slug, "why-rust");
        assert_eq!(post.date.to_string(), "2016-03-01 09:30:00");
        // normalized: lowercase, deduped, sorted
        assert_eq!(post.categories, vec!["opinion", "rust"]);
        assert!(post.content.contains("<p>Body text.</p>"));
    }

    #[test]
    fn test_post_without_date_is_missing_field() {
        let fm = front_matter("layout: post\ntitle: X");
        let err = Document::assemble("x.md", fm, "", &renderer()).unwrap_err();
        assert!(matches!(
            err,
            BuildError::MissingRequiredField { field: "date", .. }
        ));
    }

    #[test]
    fn test_post_without_title_is_missing_field() {
        let fm = front_matter("layout: post\ndate: 2016-03-01");
        let err = Document::assemble("x.md", fm, "", &renderer()).unwrap_err();
        assert!(matches!(
            err,
            BuildError::MissingRequiredField { field: "title", .. }
        ));
    }

    #[test]
    fn test_blank_title_is_missing_field() {
        let fm = front_matter("layout: post\ntitle: '  '\ndate: 2016-03-01");
        let err = Document::assemble("x.md", fm, "", &renderer()).unwrap_err();
        assert!(matches!(
            err,
            BuildError::MissingRequiredField { field: "title", .. }
        ));
    }

    #[test]
    fn test_post_with_permalink_is_malformed() {
        let fm = front_matter("layout: post\ntitle: X\ndate: 2016-03-01\npermalink: /x/");
        let err = Document::assemble("x.md", fm, "", &renderer()).unwrap_err();
        assert!(matches!(err, BuildError::MalformedFrontMatter { .. }));
    }

    #[test]
    fn test_post_with_bad_date_is_malformed() {
        let fm = front_matter("layout: post\ntitle: X\ndate: March 1st");
        let err = Document::assemble("x.md", fm, "", &renderer()).unwrap_err();
        assert!(matches!(err, BuildError::MalformedFrontMatter { .. }));
        assert!(err.to_string().contains("invalid date"));
    }

    #[test]
    fn test_symbol_only_title_takes_slug_from_file_stem() {
        let fm = front_matter("layout: page\ntitle: '!!!'");
        let doc = Document::assemble("pages/notes.md", fm, "", &renderer()).unwrap();
        match doc {
            Document::Page(p) => assert_eq!(p.slug, "notes"),
            _ => unreachable!(),
        }

        let fm = front_matter("layout: post\ntitle: '???'\ndate: 2016-03-01");
        let doc = Document::assemble("posts/japan-2016.md", fm, "", &renderer()).unwrap();
        match doc {
            Document::Post(p) => assert_eq!(p.slug, "japan-2016"),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_assemble_page_with_permalink() {
        let fm = front_matter("layout: page\ntitle: About Me\npermalink: /about/");
        let doc = Document::assemble("about.md", fm, "Hi.", &renderer()).unwrap();

        let page = match doc {
            Document::Page(p) => p,
            Document::Post(_) => panic!("expected a page"),
        };
        assert_eq!(page.title, "About Me");
        assert_eq!(page.slug, "about-me");
        assert_eq!(page.permalink.as_deref(), Some("/about/"));
    }

    #[test]
    fn test_page_permalink_may_not_traverse_upward() {
        let fm = front_matter("layout: page\ntitle: X\npermalink: ../../x/");
        let err = Document::assemble("x.md", fm, "", &renderer()).unwrap_err();
        assert!(err.to_string().contains("`..`"));
    }

    #[test]
    fn test_page_with_date_is_malformed() {
        let fm = front_matter("layout: page\ntitle: About\ndate: 2016-03-01");
        let err = Document::assemble("about.md", fm, "", &renderer()).unwrap_err();
        assert!(matches!(err, BuildError::MalformedFrontMatter { .. }));
    }

    #[test]
    fn test_unknown_layout_is_malformed() {
        let fm = front_matter("layout: gallery\ntitle: X");
        let err = Document::assemble("x.md", fm, "", &renderer()).unwrap_err();
        assert!(err.to_string().contains("unknown layout `gallery`"));
    }

    #[test]
    fn test_missing_layout_is_malformed() {
        let fm = front_matter("title: X");
        let err = Document::assemble("x.md", fm, "", &renderer()).unwrap_err();
        assert!(err.to_string().contains("missing `layout`"));
    }

    #[test]
    fn test_excerpt_split() {
        let fm = front_matter("layout: post\ntitle: X\ndate: 2016-03-01");
        let body = "Intro paragraph.\n\n<!-- more -->\n\nThe rest.";
        let doc = Document::assemble("x.md", fm, body, &renderer()).unwrap();

        let post = match doc {
            Document::Post(p) => p,
            _ => unreachable!(),
        };
        let excerpt = post.excerpt.unwrap();
        assert!(excerpt.contains("Intro paragraph."));
        assert!(!excerpt.contains("The rest."));
        assert!(post.content.contains("The rest."));
    }
}
