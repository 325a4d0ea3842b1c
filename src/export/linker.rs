//! Rewrite article links so the exported documents work offline.
//!
//! Internal post links become local `{slug}.html` references; image sources
//! map through the [`ImageMap`] to the locally stored copies; everything
//! else is left as an absolute URL.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use url::Url;

use crate::pipeline::ImageMap;

static ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(href|src)="([^"]*)""#).expect("valid regex"));

/// Local filename for an article slug.
///
/// Slugs with path separators (nested permalinks) flatten to one segment.
#[must_use]
pub fn slug_filename(slug: &str) -> String {
    format!("{}.html", slug.replace('/', "-"))
}

/// Rewrite `href` and `src` attributes in an HTML fragment.
///
/// `base_url` absolutizes relative links and marks internal ones; links to
/// a known post slug become local files, image sources map through
/// `image_map` into `image_prefix`, and everything else stays absolute.
#[must_use]
pub fn rewrite_links(
    html: &str,
    base_url: &str,
    slugs: &HashSet<String>,
    image_map: &ImageMap,
    image_prefix: &str,
) -> String {
    let base = Url::parse(base_url).ok();

    ATTR_RE
        .replace_all(html, |caps: &Captures<'_>| {
            let attr = &caps[1];
            let value = &caps[2];
            let rewritten = match attr {
                "href" => rewrite_href(value, base.as_ref(), slugs),
                _ => rewrite_src(value, base.as_ref(), image_map, image_prefix),
            };
            format!(r#"{attr}="{rewritten}""#)
        })
        .into_owned()
}

fn rewrite_href(value: &str, base: Option<&Url>, slugs: &HashSet<String>) -> String {
    if value.starts_with('#') || value.starts_with("mailto:") {
        return value.to_string();
    }

    let Some(base) = base else {
        return value.to_string();
    };
    let Ok(absolute) = base.join(value) else {
        return value.to_string();
    };

    // Only links to the blog itself can become local.
    if absolute.host_str() != base.host_str() {
        return absolute.to_string();
    }

    if let Some(slug) = match_slug(&absolute, slugs) {
        return slug_filename(&slug);
    }

    absolute.to_string()
}

/// Try the slug spellings the platforms produce: the full path, the path
/// without a Substack `p/` prefix, and the last segment with any `.html`
/// suffix dropped.
fn match_slug(url: &Url, slugs: &HashSet<String>) -> Option<String> {
    let path = url.path().trim_matches('/').to_string();
    if path.is_empty() {
        return None;
    }

    let mut candidates = vec![path.clone()];
    if let Some(stripped) = path.strip_prefix("p/") {
        candidates.push(stripped.to_string());
    }
    if let Some(last) = path.rsplit('/').next() {
        let last = last.strip_suffix(".html").unwrap_or(last);
        candidates.push(last.to_string());
    }

    candidates.into_iter().find(|c| slugs.contains(c))
}

fn rewrite_src(
    value: &str,
    base: Option<&Url>,
    image_map: &ImageMap,
    image_prefix: &str,
) -> String {
    let absolute = base
        .and_then(|b| b.join(value).ok())
        .map_or_else(|| value.to_string(), |u| u.to_string());

    let stored = image_map.get(value).or_else(|| image_map.get(&absolute));

    stored.map_or(absolute, |path| {
        let filename = path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_default();
        format!("{image_prefix}/{filename}")
    })
}
