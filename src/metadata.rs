//! Standard and Open Graph metadata extracted from captured markup.

use std::collections::BTreeMap;

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use crate::{Result, SnapError};

/// Keys already represented by a named field; matching `<meta>` tags are not
/// repeated in [`PageMetadata::tags`].
const RESERVED_KEYS: &[&str] = &[
    "url",
    "canonical",
    "title",
    "description",
    "keywords",
    "author",
    "lang",
    "charset",
    "favicons",
    "jsonld",
];

const ICON_RELS: &[&str] = &[
    "icon",
    "apple-touch-icon",
    "apple-touch-icon-precomposed",
    "mask-icon",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favicon {
    pub rel: String,
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sizes: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl Favicon {
    pub fn new(rel: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            rel: rel.into(),
            href: href.into(),
            sizes: None,
            mime_type: None,
        }
    }
}

/// Flat metadata mapping: named fields plus every other `<meta>` tag by key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    /// The URL that was requested.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charset: Option<String>,
    #[serde(default)]
    pub favicons: Vec<Favicon>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub json_ld: Vec<serde_json::Value>,
    /// `og:*`, `twitter:*` and any other named/property meta tag.
    #[serde(flatten)]
    pub tags: BTreeMap<String, String>,
}

impl PageMetadata {
    /// Parse metadata out of an HTML document captured for `url`.
    pub fn parse(html: &str, url: &str) -> Result<Self> {
        let document = Html::parse_document(html);
        let mut metadata = PageMetadata {
            url: url.to_string(),
            ..PageMetadata::default()
        };

        metadata.title = document
            .select(&selector("title")?)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|title| !title.is_empty());

        metadata.lang = first_attr(&document, "html[lang]", "lang")?;
        metadata.charset = first_attr(&document, "meta[charset]", "charset")?;

        for link in document.select(&selector("link[rel][href]")?) {
            let rel = link.value().attr("rel").unwrap_or_default();
            let href = link.value().attr("href").unwrap_or_default().trim();
            if href.is_empty() {
                continue;
            }
            let tokens: Vec<String> = rel
                .split_ascii_whitespace()
                .map(|t| t.to_ascii_lowercase())
                .collect();
            if tokens.iter().any(|t| t == "canonical") && metadata.canonical.is_none() {
                metadata.canonical = Some(href.to_string());
            }
            if tokens.iter().any(|t| ICON_RELS.contains(&t.as_str())) {
                metadata.favicons.push(favicon(link, rel, href));
            }
        }

        for meta in document.select(&selector("meta[content]")?) {
            let Some(key) = meta
                .value()
                .attr("property")
                .or_else(|| meta.value().attr("name"))
                .or_else(|| meta.value().attr("itemprop"))
            else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let content = meta.value().attr("content").unwrap_or_default().to_string();
            match key.as_str() {
                "description" => set_once(&mut metadata.description, content),
                "keywords" => set_once(&mut metadata.keywords, content),
                "author" => set_once(&mut metadata.author, content),
                _ if key.is_empty() || RESERVED_KEYS.contains(&key.as_str()) => {}
                _ => {
                    metadata.tags.entry(key).or_insert(content);
                }
            }
        }

        for script in document.select(&selector(r#"script[type="application/ld+json"]"#)?) {
            let raw = script.text().collect::<String>();
            match serde_json::from_str::<serde_json::Value>(raw.trim()) {
                Ok(value) => metadata.json_ld.push(value),
                Err(err) => tracing::debug!(error = %err, "skipping unparsable JSON-LD block"),
            }
        }

        Ok(metadata)
    }

    /// Value of a meta tag such as `og:title`, if present.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| SnapError::processing(format!("bad selector {css}: {e}")))
}

fn first_attr(document: &Html, css: &str, attr: &str) -> Result<Option<String>> {
    Ok(document
        .select(&selector(css)?)
        .filter_map(|el| el.value().attr(attr))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty()))
}

fn favicon(link: ElementRef<'_>, rel: &str, href: &str) -> Favicon {
    Favicon {
        rel: rel.trim().to_string(),
        href: href.to_string(),
        sizes: link.value().attr("sizes").map(str::to_string),
        mime_type: link.value().attr("type").map(str::to_string),
    }
}

fn set_once(field: &mut Option<String>, value: String) {
    if field.is_none() {
        *field = Some(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!doctype html>
<html lang="en-US">
<head>
  <meta charset="utf-8">
  <title> Example Domain </title>
  <meta name="description" content="An example page">
  <meta name="keywords" content="example, test">
  <meta property="og:title" content="OG Example">
  <meta property="og:type" content="article">
  <meta property="og:image" content="">
  <meta property="og:site_name" content="Example">
  <meta property="og:title" content="second og title is ignored">
  <meta name="twitter:card" content="summary">
  <link rel="canonical" href="https://example.com/">
  <link rel="icon" href="/favicon.ico" type="image/x-icon">
  <link rel="apple-touch-icon" sizes="180x180" href="https://cdn.example.com/touch.png">
  <link rel="stylesheet" href="/site.css">
  <script type="application/ld+json">{"@type": "WebPage", "name": "Example"}</script>
  <script type="application/ld+json">{not json</script>
</head>
<body><h1>Hello</h1></body>
</html>"#;

    #[test]
    fn extracts_standard_fields() {
        let meta = PageMetadata::parse(PAGE, "https://example.com").unwrap();
        assert_eq!(meta.url, "https://example.com");
        assert_eq!(meta.title.as_deref(), Some("Example Domain"));
        assert_eq!(meta.description.as_deref(), Some("An example page"));
        assert_eq!(meta.keywords.as_deref(), Some("example, test"));
        assert_eq!(meta.lang.as_deref(), Some("en-US"));
        assert_eq!(meta.charset.as_deref(), Some("utf-8"));
        assert_eq!(meta.canonical.as_deref(), Some("https://example.com/"));
    }

    #[test]
    fn keeps_first_occurrence_of_open_graph_tags() {
        let meta = PageMetadata::parse(PAGE, "https://example.com").unwrap();
        assert_eq!(meta.tag("og:title"), Some("OG Example"));
        assert_eq!(meta.tag("og:type"), Some("article"));
        assert_eq!(meta.tag("og:image"), Some(""));
        assert_eq!(meta.tag("og:site_name"), Some("Example"));
        assert_eq!(meta.tag("twitter:card"), Some("summary"));
        assert!(meta.tag("description").is_none());
    }

    #[test]
    fn collects_icon_links_only() {
        let meta = PageMetadata::parse(PAGE, "https://example.com").unwrap();
        assert_eq!(meta.favicons.len(), 2);
        assert_eq!(meta.favicons[0].href, "/favicon.ico");
        assert_eq!(meta.favicons[0].mime_type.as_deref(), Some("image/x-icon"));
        assert_eq!(meta.favicons[1].rel, "apple-touch-icon");
        assert_eq!(meta.favicons[1].sizes.as_deref(), Some("180x180"));
    }

    #[test]
    fn parses_valid_json_ld_and_skips_broken_blocks() {
        let meta = PageMetadata::parse(PAGE, "https://example.com").unwrap();
        assert_eq!(meta.json_ld.len(), 1);
        assert_eq!(meta.json_ld[0]["name"], "Example");
    }

    #[test]
    fn serializes_flat_with_tag_keys() {
        let meta = PageMetadata::parse(PAGE, "https://example.com").unwrap();
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["og:type"], "article");
        assert_eq!(json["title"], "Example Domain");
        assert!(json["favicons"].is_array());
        assert!(json.get("tags").is_none());
    }

    #[test]
    fn empty_document_yields_only_url() {
        let meta = PageMetadata::parse("", "https://example.com/x").unwrap();
        assert_eq!(meta.url, "https://example.com/x");
        assert!(meta.title.is_none());
        assert!(meta.favicons.is_empty());
        assert!(meta.tags.is_empty());
    }
}
