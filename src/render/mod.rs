//! Site rendering - turns the content store into the full output page set
//!
//! Rendering is pure: every page is produced in memory and nothing touches
//! the output directory here. The build command commits the returned set,
//! so a failing render leaves the previous output intact.

use std::collections::BTreeMap;

use rayon::prelude::*;
use tera::Context;

use crate::config::SiteConfig;
use crate::content::{ContentStore, Page, Post};
use crate::error::BuildError;
use crate::helpers::{date_rfc3339, format_date, full_url_for, route_to_href, strip_index};
use crate::templates::{
    CategoryRef, PageData, PaginationData, PostData, SiteData, TemplateRenderer,
};

const FEED_ROUTE: &str = "atom.xml";
const FEED_ENTRY_LIMIT: usize = 20;

/// One rendered output file. `route` is relative to the output directory.
#[derive(Debug, Clone)]
pub struct OutputPage {
    pub route: String,
    pub html: String,
    /// What produced this page, for duplicate-route reporting
    pub origin: String,
}

/// Renders documents and derived listings against the template set.
pub struct SiteRenderer {
    config: SiteConfig,
    templates: TemplateRenderer,
}

impl SiteRenderer {
    /// Create a renderer. `template_dir` replaces the embedded theme when
    /// set.
    pub fn new(
        config: &SiteConfig,
        template_dir: Option<&std::path::Path>,
    ) -> Result<Self, BuildError> {
        let templates = match template_dir {
            Some(dir) => TemplateRenderer::from_dir(dir)?,
            None => TemplateRenderer::embedded()?,
        };
        Ok(Self {
            config: config.clone(),
            templates,
        })
    }

    /// Render every page of the site: one per document, the paginated
    /// index, one listing per category, and the feed. Fails on the first
    /// render error or on any route produced twice.
    pub fn render_site(&self, store: &ContentStore) -> Result<Vec<OutputPage>, BuildError> {
        let posts = store.posts();
        let pages = store.pages();

        // documents render independently of each other
        let mut output: Vec<OutputPage> = posts
            .par_iter()
            .map(|post| self.render_post(post))
            .chain(pages.par_iter().map(|page| self.render_page(page)))
            .collect::<Result<_, _>>()?;

        output.extend(self.build_index(&posts)?);
        output.extend(self.build_category_pages(&posts)?);
        output.push(self.build_feed(&posts));

        check_unique_routes(&output)?;

        tracing::debug!("rendered {} pages", output.len());
        Ok(output)
    }

    /// Render a single post against the post template.
    pub fn render_post(&self, post: &Post) -> Result<OutputPage, BuildError> {
        let mut context = Context::new();
        context.insert("site", &self.site_data());
        context.insert(
            "page_title",
            &format!("{} - {}", post.title, self.config.title),
        );
        context.insert("post", &self.post_data(post));

        let html = self.templates.render("post.html", &context)?;
        Ok(OutputPage {
            route: self.post_route(post),
            html,
            origin: post.source.clone(),
        })
    }

    /// Render a single page against the page template.
    pub fn render_page(&self, page: &Page) -> Result<OutputPage, BuildError> {
        let route = self.page_route(page);
        let data = PageData {
            title: page.title.clone(),
            href: route_to_href(&self.config, &route),
            content: page.content.clone(),
        };

        let mut context = Context::new();
        context.insert("site", &self.site_data());
        context.insert(
            "page_title",
            &format!("{} - {}", page.title, self.config.title),
        );
        context.insert("page", &data);

        let html = self.templates.render("page.html", &context)?;
        Ok(OutputPage {
            route,
            html,
            origin: page.source.clone(),
        })
    }

    /// Build the date-descending home index, split into pages of
    /// `per_page` posts. Page 1 lands at the site root, later pages under
    /// `page/<n>/`. A site with no posts still gets an index.
    pub fn build_index(&self, posts: &[&Post]) -> Result<Vec<OutputPage>, BuildError> {
        let per_page = self.config.per_page.max(1);
        let total_pages = posts.len().div_ceil(per_page).max(1);

        let mut pages = Vec::with_capacity(total_pages);
        for page_num in 1..=total_pages {
            let start = (page_num - 1) * per_page;
            let end = (start + per_page).min(posts.len());
            let page_posts: Vec<PostData> =
                posts[start..end].iter().map(|p| self.post_data(p)).collect();

            let pagination = PaginationData {
                current: page_num,
                total: total_pages,
                prev_href: (page_num > 1).then(|| self.index_href(page_num - 1)),
                next_href: (page_num < total_pages).then(|| self.index_href(page_num + 1)),
            };

            let mut context = Context::new();
            context.insert("site", &self.site_data());
            context.insert("page_title", &self.config.title);
            context.insert("posts", &page_posts);
            context.insert("pagination", &pagination);

            let html = self.templates.render("index.html", &context)?;
            pages.push(OutputPage {
                route: index_route(page_num),
                html,
                origin: if page_num == 1 {
                    "home index".to_string()
                } else {
                    format!("home index page {}", page_num)
                },
            });
        }

        Ok(pages)
    }

    /// One listing page per category, every post of that category newest
    /// first. BTreeMap keeps the category order stable across runs.
    fn build_category_pages(&self, posts: &[&Post]) -> Result<Vec<OutputPage>, BuildError> {
        let mut by_category: BTreeMap<&str, Vec<&Post>> = BTreeMap::new();
        for &post in posts {
            for category in &post.categories {
                by_category.entry(category.as_str()).or_default().push(post);
            }
        }

        let mut pages = Vec::with_capacity(by_category.len());
        for (name, members) in &by_category {
            let post_data: Vec<PostData> = members.iter().map(|p| self.post_data(p)).collect();

            let mut context = Context::new();
            context.insert("site", &self.site_data());
            context.insert("page_title", &format!("{} - {}", name, self.config.title));
            context.insert("category", name);
            context.insert("posts", &post_data);

            let html = self.templates.render("category.html", &context)?;
            pages.push(OutputPage {
                route: self.category_route(name),
                html,
                origin: format!("category listing `{}`", name),
            });
        }

        Ok(pages)
    }

    /// Atom feed over the newest posts. `<updated>` comes from the newest
    /// post so unchanged input keeps producing identical bytes.
    fn build_feed(&self, posts: &[&Post]) -> OutputPage {
        let updated = posts
            .first()
            .map(|p| date_rfc3339(&p.date))
            .unwrap_or_else(|| "1970-01-01T00:00:00Z".to_string());

        let mut feed = String::new();
        feed.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        feed.push_str("<feed xmlns=\"http://www.w3.org/2005/Atom\">\n");
        feed.push_str(&format!(
            "  <title>{}</title>\n",
            escape_xml(&self.config.title)
        ));
        feed.push_str(&format!(
            "  <link href=\"{}\" rel=\"self\"/>\n",
            full_url_for(&self.config, FEED_ROUTE)
        ));
        feed.push_str(&format!(
            "  <link href=\"{}\"/>\n",
            full_url_for(&self.config, "")
        ));
        feed.push_str(&format!("  <updated>{}</updated>\n", updated));
        feed.push_str(&format!("  <id>{}</id>\n", full_url_for(&self.config, "")));
        feed.push_str(&format!(
            "  <author><name>{}</name></author>\n",
            escape_xml(&self.config.author)
        ));

        for post in posts.iter().take(FEED_ENTRY_LIMIT) {
            let route = self.post_route(post);
            let href = full_url_for(&self.config, strip_index(&route));

            feed.push_str("  <entry>\n");
            feed.push_str(&format!("    <title>{}</title>\n", escape_xml(&post.title)));
            feed.push_str(&format!("    <link href=\"{}\"/>\n", href));
            feed.push_str(&format!("    <id>{}</id>\n", href));
            feed.push_str(&format!(
                "    <published>{}</published>\n",
                date_rfc3339(&post.date)
            ));
            feed.push_str(&format!(
                "    <updated>{}</updated>\n",
                date_rfc3339(&post.date)
            ));

            let content = post.excerpt.as_ref().unwrap_or(&post.content);
            let content = absolute_urls(content, self.config.base_url());
            let content = strip_invalid_xml_chars(&content);
            feed.push_str(&format!(
                "    <content type=\"html\"><![CDATA[{}]]></content>\n",
                content.replace("]]>", "]]]]><![CDATA[>")
            ));
            feed.push_str("  </entry>\n");
        }

        feed.push_str("</feed>\n");

        OutputPage {
            route: FEED_ROUTE.to_string(),
            html: feed,
            origin: "atom feed".to_string(),
        }
    }

    /// Output route of a post, derived from the configured permalink
    /// pattern. A pattern ending in `.html` names the file itself,
    /// anything else becomes a directory index.
    pub fn post_route(&self, post: &Post) -> String {
        let category = post
            .categories
            .first()
            .map(|c| slug::slugify(c))
            .unwrap_or_default();

        let path = self
            .config
            .permalink
            .replace(":year", &post.date.format("%Y").to_string())
            .replace(":month", &post.date.format("%m").to_string())
            .replace(":day", &post.date.format("%d").to_string())
            .replace(":i_month", &post.date.format("%-m").to_string())
            .replace(":i_day", &post.date.format("%-d").to_string())
            .replace(":title", &post.slug)
            .replace(":category", &category);

        normalize_route(&path)
    }

    /// Output route of a page: its permalink when set, otherwise the
    /// slugified title. Both arms normalize, so the route is always
    /// relative to the output directory.
    pub fn page_route(&self, page: &Page) -> String {
        match &page.permalink {
            Some(permalink) => normalize_route(permalink),
            None => normalize_route(&format!("{}/index.html", page.slug)),
        }
    }

    fn category_route(&self, name: &str) -> String {
        format!(
            "{}/{}/index.html",
            self.config.category_dir.trim_matches('/'),
            slug::slugify(name)
        )
    }

    fn index_href(&self, page_num: usize) -> String {
        route_to_href(&self.config, &index_route(page_num))
    }

    fn site_data(&self) -> SiteData {
        SiteData {
            title: self.config.title.clone(),
            description: self.config.description.clone(),
            author: self.config.author.clone(),
            url: self.config.url.clone(),
            root: self.config.root.clone(),
            feed_href: route_to_href(&self.config, FEED_ROUTE),
        }
    }

    fn post_data(&self, post: &Post) -> PostData {
        PostData {
            title: post.title.clone(),
            date: format_date(&post.date, &self.config.date_format),
            date_iso: post.date.format("%Y-%m-%dT%H:%M:%S").to_string(),
            href: route_to_href(&self.config, &self.post_route(post)),
            categories: post
                .categories
                .iter()
                .map(|c| CategoryRef {
                    name: c.clone(),
                    href: route_to_href(&self.config, &self.category_route(c)),
                })
                .collect(),
            content: post.content.clone(),
            excerpt: post.excerpt.clone(),
        }
    }
}

fn index_route(page_num: usize) -> String {
    if page_num == 1 {
        "index.html".to_string()
    } else {
        format!("page/{}/index.html", page_num)
    }
}

/// Collapse a permalink or pattern result into an output-relative route.
fn normalize_route(path: &str) -> String {
    let trimmed = path.trim_start_matches('/');
    if trimmed.ends_with(".html") {
        trimmed.to_string()
    } else {
        let dir = trimmed.trim_end_matches('/');
        if dir.is_empty() {
            "index.html".to_string()
        } else {
            format!("{}/index.html", dir)
        }
    }
}

/// Every route may be produced by exactly one page.
fn check_unique_routes(pages: &[OutputPage]) -> Result<(), BuildError> {
    let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
    for page in pages {
        if let Some(first) = seen.insert(page.route.as_str(), page.origin.as_str()) {
            return Err(BuildError::DuplicatePath {
                route: page.route.clone(),
                first: first.to_string(),
                second: page.origin.clone(),
            });
        }
    }
    Ok(())
}

/// Escape XML special characters
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Rewrite root-relative hrefs and srcs to absolute URLs for feed readers.
fn absolute_urls(content: &str, base_url: &str) -> String {
    content
        .replace("href=\"/", &format!("href=\"{}/", base_url))
        .replace("src=\"/", &format!("src=\"{}/", base_url))
        .replace("href='/", &format!("href='{}/", base_url))
        .replace("src='/", &format!("src='{}/", base_url))
}

/// Strip control characters XML 1.0 forbids (tab, newline, and carriage
/// return stay).
fn strip_invalid_xml_chars(s: &str) -> String {
    s.chars()
        .filter(|&c| {
            c == '\t'
                || c == '\n'
                || c == '\r'
                || ('\u{0020}'..='\u{D7FF}').contains(&c)
                || ('\u{E000}'..='\u{FFFD}').contains(&c)
                || ('\u{10000}'..='\u{10FFFF}').contains(&c)
        })
        .collect()
}
