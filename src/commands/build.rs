//! Build the site into the output directory

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::content::{is_markdown_file, is_reserved, ContentStore, MarkdownRenderer};
use crate::error::BuildError;
use crate::render::{OutputPage, SiteRenderer};
use crate::Site;

/// Build the whole site.
///
/// Load and render run first and never touch the output directory; only
/// when every page has rendered is the directory replaced. A failed build
/// leaves the previous output exactly as it was.
pub fn run(site: &Site) -> Result<(), BuildError> {
    let start = std::time::Instant::now();

    let markdown = MarkdownRenderer::from_config(&site.config.highlight);
    let store = ContentStore::load_all(&site.source_dir, &markdown)?;
    tracing::info!(
        "loaded {} posts and {} pages",
        store.posts().len(),
        store.pages().len()
    );

    let renderer = SiteRenderer::new(&site.config, site.template_dir.as_deref())?;
    let pages = renderer.render_site(&store)?;

    let assets = collect_assets(&site.source_dir)?;
    check_asset_collisions(&pages, &assets)?;

    commit(site, &pages, &assets)?;

    tracing::info!(
        "built {} pages and {} assets in {:.2}s",
        pages.len(),
        assets.len(),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

/// Non-markdown files under the source tree, passed through verbatim.
/// Sorted walk, reserved names skipped, same rules as the loader.
fn collect_assets(source_dir: &Path) -> Result<Vec<(PathBuf, String)>, BuildError> {
    let mut assets = Vec::new();

    if !source_dir.exists() {
        return Ok(assets);
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
        if !path.is_file() || is_markdown_file(path) {
            continue;
        }

        let relative = path
            .strip_prefix(source_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string();
        assets.push((path.to_path_buf(), relative));
    }

    Ok(assets)
}

/// An asset may not land on a route a rendered page claims.
fn check_asset_collisions(
    pages: &[OutputPage],
    assets: &[(PathBuf, String)],
) -> Result<(), BuildError> {
    for (_, relative) in assets {
        if let Some(page) = pages.iter().find(|p| &p.route == relative) {
            return Err(BuildError::DuplicatePath {
                route: relative.clone(),
                first: page.origin.clone(),
                second: format!("asset `{}`", relative),
            });
        }
    }
    Ok(())
}

/// Replace the output directory with the rendered pages and copied assets.
fn commit(
    site: &Site,
    pages: &[OutputPage],
    assets: &[(PathBuf, String)],
) -> Result<(), BuildError> {
    if site.public_dir.exists() {
        fs::remove_dir_all(&site.public_dir)
            .map_err(|e| BuildError::io(&site.public_dir, e))?;
    }
    fs::create_dir_all(&site.public_dir).map_err(|e| BuildError::io(&site.public_dir, e))?;

    for page in pages {
        let path = site.public_dir.join(&page.route);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
        }
        fs::write(&path, &page.html).map_err(|e| BuildError::io(&path, e))?;
    }

    for (source, relative) in assets {
        let dest = site.public_dir.join(relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
        }
        fs::copy(source, &dest).map_err(|e| BuildError::io(source.as_path(), e))?;
    }

    Ok(())
}
