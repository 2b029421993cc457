//! Markdown rendering with syntax highlighting

use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

use crate::config::HighlightConfig;

const EXCERPT_MARK: &str = "<!-- more -->";

/// Markdown renderer with syntax highlighting
pub struct MarkdownRenderer {
    syntax_set: SyntaxSet,
    theme: Theme,
    line_numbers: bool,
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self::from_config(&HighlightConfig::default())
    }

    /// Create a renderer honoring the site's `highlight` settings. An
    /// unknown theme name falls back to the default theme.
    pub fn from_config(config: &HighlightConfig) -> Self {
        let mut theme_set = ThemeSet::load_defaults();
        let theme = theme_set
            .themes
            .remove(&config.theme)
            .or_else(|| theme_set.themes.remove("base16-ocean.dark"))
            .unwrap_or_default();

        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme,
            line_numbers: config.line_number,
        }
    }

    /// Render markdown to HTML. Fenced and indented code blocks are
    /// replaced with highlighted markup; the embedded code is treated as
    /// opaque text.
    pub fn render(&self, markdown: &str) -> String {
        // YAML metadata blocks stay disabled; front matter is stripped
        // before the body reaches the renderer.
        let options = Options::ENABLE_TABLES
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
            | Options::ENABLE_HEADING_ATTRIBUTES
            | Options::ENABLE_GFM;
        let parser = Parser::new_ext(markdown, options);

        let mut events: Vec<Event> = Vec::new();
        let mut code_lang: Option<String> = None;
        let mut code_buf = String::new();
        let mut in_code_block = false;

        for event in parser {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    in_code_block = true;
                    code_buf.clear();
                    code_lang = match kind {
                        CodeBlockKind::Fenced(lang) if !lang.is_empty() => Some(lang.to_string()),
                        _ => None,
                    };
                }
                Event::End(TagEnd::CodeBlock) => {
                    let highlighted = self.highlight_code(&code_buf, code_lang.take().as_deref());
                    events.push(Event::Html(CowStr::from(highlighted)));
                    in_code_block = false;
                }
                Event::Text(text) if in_code_block => {
                    code_buf.push_str(&text);
                }
                other => events.push(other),
            }
        }

        let mut html_output = String::new();
        html::push_html(&mut html_output, events.into_iter());
        html_output
    }

    /// Highlight one code block
    fn highlight_code(&self, code: &str, lang: Option<&str>) -> String {
        let lang = lang.unwrap_or("text");

        let syntax = self
            .syntax_set
            .find_syntax_by_token(lang)
            .or_else(|| self.syntax_set.find_syntax_by_extension(lang))
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());

        match highlighted_html_for_string(code, &self.syntax_set, syntax, &self.theme) {
            Ok(highlighted) => {
                if self.line_numbers {
                    self.with_line_numbers(&highlighted, code, lang)
                } else {
                    format!(r#"<figure class="highlight {}">{}</figure>"#, lang, highlighted)
                }
            }
            // Fallback to a plain escaped code block
            Err(_) => format!(
                r#"<pre><code class="language-{}">{}</code></pre>"#,
                lang,
                html_escape(code)
            ),
        }
    }

    /// Wrap highlighted markup in a gutter table. The gutter is counted
    /// from the raw code so wrapper markup never shifts the numbering.
    fn with_line_numbers(&self, highlighted: &str, code: &str, lang: &str) -> String {
        let count = code.lines().count().max(1);
        let gutter = (1..=count)
            .map(|n| format!(r#"<span class="line-number">{}</span>"#, n))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"<figure class="highlight {}"><table><tr><td class="gutter"><pre>{}</pre></td><td class="code">{}</td></tr></table></figure>"#,
            lang, gutter, highlighted
        )
    }

    /// Split content on `<!-- more -->`. Returns the text above the marker
    /// (if any) and the full body with the marker removed.
    pub fn split_excerpt(content: &str) -> (Option<String>, String) {
        if let Some(pos) = content.find(EXCERPT_MARK) {
            let excerpt = content[..pos].trim().to_string();
            let remaining = content[pos + EXCERPT_MARK.len()..].trim().to_string();
            let full = format!("{}\n\n{}", excerpt, remaining);
            (Some(excerpt), full)
        } else {
            (None, content.to_string())
        }
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_basic_markdown() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("# Hello World\n\nThis is a test.");
        assert!(html.contains("<h1>Hello World</h1>"));
        assert!(html.contains("<p>This is a test.</p>"));
    }

    #[test]
    fn test_render_fenced_code_block() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("```rust\nfn main() {}\n```");
        assert!(html.contains(r#"<figure class="highlight rust">"#));
        assert!(!html.contains("```"));
    }

    #[test]
    fn test_unknown_language_falls_back_to_plain_text() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("```solidity\npragma solidity ^0.4.0;\n```");
        assert!(html.contains("highlight solidity"));
        assert!(html.contains("pragma solidity"));
    }

    #[test]
    fn test_indented_code_block() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("para\n\n    let x = 1;\n");
        assert!(html.contains("highlight text"));
        assert!(html.contains("let x = 1;"));
    }

    #[test]
    fn test_line_numbers_gutter() {
        let config = HighlightConfig {
            theme: "base16-ocean.dark".to_string(),
            line_number: true,
        };
        let renderer = MarkdownRenderer::from_config(&config);
        let html = renderer.render("```rust\nlet a = 1;\nlet b = 2;\n```");
        assert!(html.contains(r#"<td class="gutter">"#));
        assert!(html.contains(r#"<span class="line-number">2</span>"#));
        assert!(!html.contains(r#"<span class="line-number">3</span>"#));
    }

    #[test]
    fn test_unknown_theme_falls_back() {
        let config = HighlightConfig {
            theme: "no-such-theme".to_string(),
            line_number: false,
        };
        let renderer = MarkdownRenderer::from_config(&config);
        let html = renderer.render("```rust\nfn main() {}\n```");
        assert!(html.contains("highlight rust"));
    }

    #[test]
    fn test_split_excerpt() {
        let content = "This is excerpt.\n<!-- more -->\nThis is more content.";
        let (excerpt, full) = MarkdownRenderer::split_excerpt(content);
        assert_eq!(excerpt, Some("This is excerpt.".to_string()));
        assert!(full.contains("This is excerpt."));
        assert!(full.contains("This is more content."));
        assert!(!full.contains(EXCERPT_MARK));
    }

    #[test]
    fn test_split_excerpt_without_marker() {
        let (excerpt, full) = MarkdownRenderer::split_excerpt("Just a body.");
        assert_eq!(excerpt, None);
        assert_eq!(full, "Just a body.");
    }

    #[test]
    fn test_html_escape() {
        let escaped = html_escape(r#"<a href="x">&'</a>"#);
        assert_eq!(escaped, "&lt;a href=&quot;x&quot;&gt;&amp;&#39;&lt;/a&gt;");
    }
}
