//! Link-preview records derived from page metadata.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::metadata::{Favicon, PageMetadata};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_image: Option<String>,
    pub url: String,
    #[serde(default)]
    pub favicons: Vec<Favicon>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

impl PreviewRecord {
    pub fn from_metadata(metadata: &PageMetadata, requested_url: &str) -> Self {
        let url = present(metadata.canonical.as_deref())
            .or_else(|| present(metadata.tag("og:url")))
            .map(|href| resolve_href(requested_url, href))
            .unwrap_or_else(|| requested_url.to_string());

        Self {
            title: present(metadata.title.as_deref())
                .or_else(|| present(metadata.tag("og:title")))
                .map(str::to_string),
            description: present(metadata.description.as_deref())
                .or_else(|| present(metadata.tag("og:description")))
                .map(str::to_string),
            site_name: significant(metadata.tag("og:site_name")),
            kind: significant(metadata.tag("og:type")),
            preview_image: significant(metadata.tag("og:image")),
            favicons: absolutize_favicons(&metadata.favicons, &url),
            locale: significant(metadata.tag("og:locale")),
            url,
        }
    }
}

/// `Some` only when the value has non-whitespace content.
pub fn significant(value: Option<&str>) -> Option<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Absolute hrefs are kept verbatim; relative ones are joined onto `base`.
fn resolve_href(base: &str, href: &str) -> String {
    if Url::parse(href).is_ok() {
        return href.to_string();
    }
    match Url::parse(base).and_then(|base| base.join(href)) {
        Ok(joined) => joined.to_string(),
        Err(err) => {
            tracing::debug!(base, href, error = %err, "cannot resolve relative URL");
            href.to_string()
        }
    }
}

/// Rewrite root-relative favicon hrefs against the origin of `base`.
///
/// Hrefs that do not start with `/` are returned unchanged, so applying this
/// twice gives the same result as applying it once.
pub fn absolutize_favicons(favicons: &[Favicon], base: &str) -> Vec<Favicon> {
    let origin = site_origin(base);
    favicons
        .iter()
        .map(|favicon| match (&origin, favicon.href.starts_with('/')) {
            (Some(origin), true) => Favicon {
                href: format!("{}{}", origin, favicon.href),
                ..favicon.clone()
            },
            _ => favicon.clone(),
        })
        .collect()
}

/// `scheme://host[:port]` of `base`, ignoring one trailing slash.
pub fn site_origin(base: &str) -> Option<String> {
    let trimmed = base.strip_suffix('/').unwrap_or(base);
    let parsed = match Url::parse(trimmed) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::debug!(base, error = %err, "cannot resolve favicons against base URL");
            return None;
        }
    };
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
        None => format!("{}://{}", parsed.scheme(), host),
    })
}
