//! Template rendering with the Tera template engine
//!
//! The default theme is embedded directly in the binary. A site can replace
//! it wholesale by setting `template_dir` in `_config.yml`; the directory
//! then has to provide every template the renderer asks for.

use std::collections::HashMap;
use std::error::Error as _;
use std::path::Path;

use serde::Serialize;
use tera::{Context, Tera};

use crate::error::BuildError;

/// Template renderer backed by either the embedded theme or a site-local
/// template directory.
#[derive(Debug)]
pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    /// Create a renderer with the embedded default theme.
    pub fn embedded() -> Result<Self, BuildError> {
        let mut tera = Tera::default();

        // Autoescaping is off: document bodies are already HTML and hrefs
        // are encoded where they are built.
        tera.autoescape_on(vec![]);

        tera.add_raw_templates(vec![
            ("base.html", include_str!("builtin/base.html")),
            ("index.html", include_str!("builtin/index.html")),
            ("post.html", include_str!("builtin/post.html")),
            ("page.html", include_str!("builtin/page.html")),
            ("category.html", include_str!("builtin/category.html")),
            (
                "partials/head.html",
                include_str!("builtin/partials/head.html"),
            ),
            (
                "partials/footer.html",
                include_str!("builtin/partials/footer.html"),
            ),
            (
                "partials/pagination.html",
                include_str!("builtin/partials/pagination.html"),
            ),
        ])
        .map_err(|e| BuildError::Render {
            name: "builtin theme".to_string(),
            reason: error_reason(&e),
        })?;

        register_filters(&mut tera);
        Ok(Self { tera })
    }

    /// Create a renderer from a site-local template directory. The embedded
    /// theme is not merged in; the directory stands on its own.
    pub fn from_dir(dir: &Path) -> Result<Self, BuildError> {
        if !dir.is_dir() {
            return Err(BuildError::Config {
                path: dir.to_path_buf(),
                reason: "template_dir does not exist".to_string(),
            });
        }

        let pattern = format!("{}/**/*.html", dir.display());
        let mut tera = Tera::new(&pattern).map_err(|e| BuildError::Render {
            name: dir.display().to_string(),
            reason: error_reason(&e),
        })?;

        tera.autoescape_on(vec![]);
        register_filters(&mut tera);
        Ok(Self { tera })
    }

    /// Render a template with the given context.
    pub fn render(&self, template_name: &str, context: &Context) -> Result<String, BuildError> {
        self.tera.render(template_name, context).map_err(|e| {
            if let tera::ErrorKind::TemplateNotFound(missing) = &e.kind {
                BuildError::TemplateNotFound {
                    name: missing.clone(),
                }
            } else {
                BuildError::Render {
                    name: template_name.to_string(),
                    reason: error_reason(&e),
                }
            }
        })
    }
}

fn register_filters(tera: &mut Tera) {
    tera.register_filter("strip_html", strip_html_filter);
    tera.register_filter("truncate_chars", truncate_chars_filter);
}

/// Tera errors put the interesting part in the source chain.
fn error_reason(err: &tera::Error) -> String {
    let mut reason = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        reason.push_str(": ");
        reason.push_str(&cause.to_string());
        source = cause.source();
    }
    reason
}

/// Tera filter: strip HTML tags
fn strip_html_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("strip_html", "value", String, value);
    let mut result = String::with_capacity(s.len());
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(c),
            _ => {}
        }
    }
    Ok(tera::Value::String(result))
}

/// Tera filter: truncate by character count
fn truncate_chars_filter(
    value: &tera::Value,
    args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("truncate_chars", "value", String, value);
    let length = match args.get("length") {
        Some(val) => tera::try_get_value!("truncate_chars", "length", usize, val),
        None => 200,
    };

    if s.chars().count() <= length {
        Ok(tera::Value::String(s))
    } else {
        let truncated: String = s.chars().take(length).collect();
        Ok(tera::Value::String(format!(
            "{}...",
            truncated.trim_end()
        )))
    }
}

// Context payloads handed to the templates.

/// Site-wide values, inserted into every context as `site`.
#[derive(Debug, Clone, Serialize)]
pub struct SiteData {
    pub title: String,
    pub description: String,
    pub author: String,
    pub url: String,
    pub root: String,
    pub feed_href: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostData {
    pub title: String,
    /// Display string in the site's configured date format
    pub date: String,
    /// Machine-readable timestamp for `<time datetime>`
    pub date_iso: String,
    pub href: String,
    pub categories: Vec<CategoryRef>,
    pub content: String,
    pub excerpt: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryRef {
    pub name: String,
    pub href: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageData {
    pub title: String,
    pub href: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaginationData {
    pub current: usize,
    pub total: usize,
    pub prev_href: Option<String>,
    pub next_href: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_site() -> SiteData {
        SiteData {
            title: "Blog".to_string(),
            description: "A blog".to_string(),
            author: "me".to_string(),
            url: "http://example.com".to_string(),
            root: "/".to_string(),
            feed_href: "/atom.xml".to_string(),
        }
    }

    fn sample_post() -> PostData {
        PostData {
            title: "Hello".to_string(),
            date: "2015-10-18".to_string(),
            date_iso: "2015-10-18T12:00:00".to_string(),
            href: "/2015/10/18/hello/".to_string(),
            categories: vec![CategoryRef {
                name: "intro".to_string(),
                href: "/categories/intro/".to_string(),
            }],
            content: "<p>Body</p>".to_string(),
            excerpt: None,
        }
    }

    #[test]
    fn test_render_embedded_post_template() {
        let renderer = TemplateRenderer::embedded().unwrap();
        let mut context = Context::new();
        context.insert("site", &sample_site());
        context.insert("page_title", "Hello - Blog");
        context.insert("post", &sample_post());

        let html = renderer.render("post.html", &context).unwrap();
        assert!(html.contains("<title>Hello - Blog</title>"));
        assert!(html.contains(r#"<h1 class="post-title">Hello</h1>"#));
        assert!(html.contains("<p>Body</p>"));
        assert!(html.contains(r#"href="/categories/intro/""#));
    }

    #[test]
    fn test_missing_template_is_not_found() {
        let renderer = TemplateRenderer::embedded().unwrap();
        let err = renderer
            .render("gallery.html", &Context::new())
            .unwrap_err();
        assert!(matches!(
            err,
            BuildError::TemplateNotFound { name } if name == "gallery.html"
        ));
    }

    #[test]
    fn test_from_dir_replaces_builtin_theme() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("post.html"), "custom {{ post.title }}").unwrap();

        let renderer = TemplateRenderer::from_dir(dir.path()).unwrap();
        let mut context = Context::new();
        context.insert("post", &sample_post());

        let html = renderer.render("post.html", &context).unwrap();
        assert_eq!(html, "custom Hello");

        // the embedded theme must not leak through
        let err = renderer.render("index.html", &Context::new()).unwrap_err();
        assert!(matches!(err, BuildError::TemplateNotFound { .. }));
    }

    #[test]
    fn test_from_dir_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = TemplateRenderer::from_dir(&dir.path().join("themes")).unwrap_err();
        assert!(matches!(err, BuildError::Config { .. }));
    }

    #[test]
    fn test_strip_html_filter() {
        let value = tera::Value::String("<p>Hi <b>there</b></p>".to_string());
        let out = strip_html_filter(&value, &HashMap::new()).unwrap();
        assert_eq!(out, tera::Value::String("Hi there".to_string()));
    }

    #[test]
    fn test_truncate_chars_filter() {
        let value = tera::Value::String("abcdef".to_string());
        let mut args = HashMap::new();
        args.insert("length".to_string(), tera::Value::from(4));
        let out = truncate_chars_filter(&value, &args).unwrap();
        assert_eq!(out, tera::Value::String("abcd...".to_string()));
    }
}
