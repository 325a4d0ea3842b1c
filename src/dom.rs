//! Small DOM helpers shared by the platform extractors and the exporters.
//!
//! `scraper` parses but does not mutate, so element removal is done by
//! re-serializing a parsed tree while skipping unwanted nodes.

use chrono::{DateTime, NaiveDateTime, Utc};
use scraper::{ElementRef, Html, Selector};

/// Elements that never take a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Attributes dropped when cleaning content for export (tracking and
/// scripting hooks; inline styles that break the reader layout).
const STRIPPED_ATTRS: &[&str] = &["onclick", "onload", "onerror", "style", "class", "id"];

/// Content of a `<meta name="...">` tag.
#[must_use]
pub fn meta_content(doc: &Html, name: &str) -> Option<String> {
    let selector = Selector::parse(&format!("meta[name='{name}']")).ok()?;
    doc.select(&selector)
        .find_map(|el| el.value().attr("content"))
        .filter(|c| !c.is_empty())
        .map(ToString::to_string)
}

/// Content of a `<meta property="...">` tag (Open Graph style).
#[must_use]
pub fn meta_property(doc: &Html, property: &str) -> Option<String> {
    let selector = Selector::parse(&format!("meta[property='{property}']")).ok()?;
    doc.select(&selector)
        .find_map(|el| el.value().attr("content"))
        .filter(|c| !c.is_empty())
        .map(ToString::to_string)
}

/// Text of the first element matching any of `selectors`, tried in order.
#[must_use]
pub fn select_first_text(doc: &Html, selectors: &[&str]) -> Option<String> {
    for sel in selectors {
        let Ok(selector) = Selector::parse(sel) else {
            continue;
        };
        if let Some(el) = doc.select(&selector).next() {
            let text: String = el.text().collect();
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

/// First element matching any of `selectors`, tried in order.
#[must_use]
pub fn select_first<'a>(doc: &'a Html, selectors: &[&str]) -> Option<ElementRef<'a>> {
    for sel in selectors {
        let Ok(selector) = Selector::parse(sel) else {
            continue;
        };
        if let Some(el) = doc.select(&selector).next() {
            return Some(el);
        }
    }
    None
}

/// Parse an ISO-8601 timestamp, tolerating a missing timezone (WordPress
/// REST emits naive local timestamps).
#[must_use]
pub fn parse_iso_datetime(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Inner HTML of `el` with any descendant matching `skip` removed.
///
/// Attributes are preserved; comments are dropped.
#[must_use]
pub fn inner_html_without(el: ElementRef<'_>, skip: &[Selector]) -> String {
    let mut out = String::new();
    serialize_children(el, skip, false, &mut out);
    out
}

/// Clean an HTML fragment for export: remove scripts, styles, iframes and
/// noscript blocks, and drop scripting/tracking attributes.
#[must_use]
pub fn clean_article_html(fragment: &str) -> String {
    let skip: Vec<Selector> = ["script", "style", "iframe", "noscript"]
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect();

    let doc = Html::parse_fragment(fragment);
    let mut out = String::new();
    serialize_children(doc.root_element(), &skip, true, &mut out);
    out
}

/// Image URLs referenced inside `el`, absolutized against `base_url`, in
/// document order. Skips data/blob URLs and obvious tracking pixels.
#[must_use]
pub fn collect_image_urls(el: ElementRef<'_>, base_url: &str) -> Vec<String> {
    let Ok(img_selector) = Selector::parse("img") else {
        return Vec::new();
    };
    let base = url::Url::parse(base_url).ok();

    let mut images = Vec::new();
    for img in el.select(&img_selector) {
        let src = img
            .value()
            .attr("src")
            .or_else(|| img.value().attr("data-src"))
            .or_else(|| img.value().attr("data-lazy-src"));
        let Some(src) = src else { continue };
        if src.starts_with("data:") || src.starts_with("blob:") {
            continue;
        }
        let lower = src.to_lowercase();
        if lower.contains("tracking") || lower.contains("pixel") {
            continue;
        }
        let absolute = match &base {
            Some(b) => match b.join(src) {
                Ok(u) => u.to_string(),
                Err(_) => continue,
            },
            None => src.to_string(),
        };
        if !images.contains(&absolute) {
            images.push(absolute);
        }
    }
    images
}

fn serialize_children(el: ElementRef<'_>, skip: &[Selector], strip_attrs: bool, out: &mut String) {
    for child in el.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            if skip.iter().any(|s| s.matches(&child_el)) {
                continue;
            }
            serialize_element(child_el, skip, strip_attrs, out);
        } else if let Some(text) = child.value().as_text() {
            push_escaped_text(text, out);
        }
        // Comments and processing instructions are dropped.
    }
}

fn serialize_element(el: ElementRef<'_>, skip: &[Selector], strip_attrs: bool, out: &mut String) {
    let name = el.value().name();
    out.push('<');
    out.push_str(name);
    for (attr, value) in el.value().attrs() {
        if strip_attrs && STRIPPED_ATTRS.contains(&attr) {
            continue;
        }
        out.push(' ');
        out.push_str(attr);
        out.push_str("=\"");
        push_escaped_attr(value, out);
        out.push('"');
    }

    // Self-close void elements so the output is valid XHTML as well,
    // which the EPUB chapters require.
    if VOID_ELEMENTS.contains(&name) {
        out.push_str("/>");
        return;
    }
    out.push('>');

    serialize_children(el, skip, strip_attrs, out);
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn push_escaped_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn push_escaped_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            _ => out.push(c),
        }
    }
}
