//! URL helper functions

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::config::SiteConfig;

/// Characters that must not appear raw inside an href attribute.
const HREF_SET: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'<').add(b'>').add(b'`');

/// Generate a URL with the root path
///
/// # Examples
/// ```ignore
/// url_for(&config, "/css/style.css") // -> "/blog/css/style.css"
/// ```
pub fn url_for(config: &SiteConfig, path: &str) -> String {
    let root = config.root.trim_end_matches('/');
    let path = path.trim_start_matches('/');

    if path.is_empty() {
        format!("{}/", root)
    } else {
        format!("{}/{}", root, path)
    }
}

/// Generate a full URL including the domain
///
/// # Examples
/// ```ignore
/// full_url_for(&config, "/about/") // -> "https://example.com/blog/about/"
/// ```
pub fn full_url_for(config: &SiteConfig, path: &str) -> String {
    let base = config.url.trim_end_matches('/');
    format!("{}{}", base, url_for(config, path))
}

/// Map an output route to the href visitors follow. Directory indexes are
/// served by the bare directory URL.
///
/// # Examples
/// ```ignore
/// route_to_href(&config, "2015/10/18/hello/index.html") // -> "/2015/10/18/hello/"
/// ```
pub fn route_to_href(config: &SiteConfig, route: &str) -> String {
    encode_path(&url_for(config, strip_index(route)))
}

/// Trim a trailing `index.html` file name so a route reads as its
/// directory URL. A last segment that merely ends with the name, like
/// `photoindex.html`, is kept whole.
pub fn strip_index(route: &str) -> &str {
    match route.strip_suffix("index.html") {
        Some(dir) if dir.is_empty() || dir.ends_with('/') => dir,
        _ => route,
    }
}

/// Percent-encode a path for use inside href attributes.
pub fn encode_path(path: &str) -> String {
    utf8_percent_encode(path, HREF_SET).to_string()
}
