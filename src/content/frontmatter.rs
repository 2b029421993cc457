//! Front-matter parsing
//!
//! A content file must open with a `---` line, carry a YAML key/value
//! block, and close with another `---` line. Anything else is a fatal
//! `MalformedFrontMatter` error; the build never guesses.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer};

use crate::error::BuildError;

/// Custom deserializer that handles both a single string and a list of strings
fn string_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, SeqAccess, Visitor};
    use std::fmt;

    struct StringOrVec;

    impl<'de> Visitor<'de> for StringOrVec {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or a list of strings")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(vec![value.to_string()])
        }

        fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(vec![value])
        }

        fn visit_seq<S>(self, mut seq: S) -> Result<Self::Value, S::Error>
        where
            S: SeqAccess<'de>,
        {
            let mut vec = Vec::new();
            while let Some(item) = seq.next_element::<String>()? {
                vec.push(item);
            }
            Ok(vec)
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Vec::new())
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Vec::new())
        }
    }

    deserializer.deserialize_any(StringOrVec)
}

/// Raw front-matter fields as written in the file, before layout
/// validation turns them into a `Document`.
///
/// Keys outside this schema are tolerated and ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FrontMatter {
    pub layout: Option<String>,
    pub title: Option<String>,
    pub date: Option<String>,
    #[serde(deserialize_with = "string_or_vec")]
    pub categories: Vec<String>,
    pub permalink: Option<String>,
}

impl FrontMatter {
    /// Split a content file into its metadata block and body.
    ///
    /// `source_file` is only used for error reporting.
    pub fn parse<'a>(
        source_file: &str,
        content: &'a str,
    ) -> Result<(Self, &'a str), BuildError> {
        let mut lines = content.split_inclusive('\n');

        let first = match lines.next() {
            Some(line) if is_delimiter(line) => line,
            _ => {
                return Err(BuildError::malformed(
                    source_file,
                    "missing opening `---` delimiter",
                ));
            }
        };

        let block_start = first.len();
        let mut offset = block_start;
        for line in lines {
            if is_delimiter(line) {
                let yaml = &content[block_start..offset];
                let body = &content[offset + line.len()..];
                let fm = Self::parse_yaml(source_file, yaml)?;
                return Ok((fm, body));
            }
            offset += line.len();
        }

        Err(BuildError::malformed(
            source_file,
            "missing closing `---` delimiter",
        ))
    }

    fn parse_yaml(source_file: &str, yaml: &str) -> Result<Self, BuildError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(|e| BuildError::malformed(source_file, e.to_string()))
    }
}

/// A line consisting of exactly `---` (tolerating CRLF).
fn is_delimiter(line: &str) -> bool {
    line.trim_end_matches(['\n', '\r']) == "---"
}

/// Parse a front-matter date.
///
/// Accepted forms: `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD HH:MM`, and
/// `YYYY-MM-DD` (midnight). Anything else is rejected by the caller as
/// malformed front matter.
pub fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();

    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_post_front_matter() {
        let content = r#"---
layout: post
title: Hello World
date: 2015-10-18 14:00
categories: ethereum
---

This is the content.
"#;

        let (fm, body) = FrontMatter::parse("a.md", content).unwrap();
        assert_eq!(fm.layout.as_deref(), Some("post"));
        assert_eq!(fm.title.as_deref(), Some("Hello World"));
        assert_eq!(fm.date.as_deref(), Some("2015-10-18 14:00"));
        assert_eq!(fm.categories, vec!["ethereum"]);
        assert!(body.contains("This is the content."));
    }

    #[test]
    fn test_parse_category_list() {
        let content = "---\nlayout: post\ncategories:\n  - rust\n  - wasm\n---\nbody\n";
        let (fm, _) = FrontMatter::parse("a.md", content).unwrap();
        assert_eq!(fm.categories, vec!["rust", "wasm"]);
    }

    #[test]
    fn test_missing_opening_delimiter() {
        let err = FrontMatter::parse("a.md", "layout: post\n---\nbody\n").unwrap_err();
        assert!(matches!(err, BuildError::MalformedFrontMatter { .. }));
        assert!(err.to_string().contains("opening"));
    }

    #[test]
    fn test_missing_closing_delimiter() {
        let err = FrontMatter::parse("a.md", "---\nlayout: post\ntitle: X\n").unwrap_err();
        assert!(matches!(err, BuildError::MalformedFrontMatter { .. }));
        assert!(err.to_string().contains("closing"));
    }

    #[test]
    fn test_invalid_yaml_is_malformed() {
        let content = "---\nlayout: [unclosed\n---\nbody\n";
        let err = FrontMatter::parse("a.md", content).unwrap_err();
        assert!(matches!(err, BuildError::MalformedFrontMatter { .. }));
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let content = "---\nlayout: page\ntitle: About\nauthor_note: hi\n---\n";
        let (fm, _) = FrontMatter::parse("about.md", content).unwrap();
        assert_eq!(fm.layout.as_deref(), Some("page"));
        assert_eq!(fm.title.as_deref(), Some("About"));
    }

    #[test]
    fn test_crlf_delimiters() {
        let content = "---\r\nlayout: page\r\ntitle: About\r\n---\r\nbody\r\n";
        let (fm, body) = FrontMatter::parse("about.md", content).unwrap();
        assert_eq!(fm.title.as_deref(), Some("About"));
        assert_eq!(body, "body\r\n");
    }

    #[test]
    fn test_empty_block_parses_to_defaults() {
        let (fm, body) = FrontMatter::parse("a.md", "---\n---\nbody\n").unwrap();
        assert!(fm.layout.is_none());
        assert_eq!(body, "body\n");
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(
            parse_date("2015-10-18 14:30:05").unwrap().to_string(),
            "2015-10-18 14:30:05"
        );
        assert_eq!(
            parse_date("2015-10-18 14:30").unwrap().to_string(),
            "2015-10-18 14:30:00"
        );
        assert_eq!(
            parse_date("2015-10-18").unwrap().to_string(),
            "2015-10-18 00:00:00"
        );
        assert!(parse_date("18/10/2015").is_none());
        assert!(parse_date("2015-13-01").is_none());
        assert!(parse_date("yesterday").is_none());
    }
}
