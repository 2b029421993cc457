//! Shared helpers for URL building and date formatting

mod date;
mod url;

pub use date::{date_rfc3339, format_date};
pub use url::{encode_path, full_url_for, route_to_href, strip_index, url_for};
