//! Ghost platform support.
//!
//! Ghost publishes a dedicated `/sitemap-posts.xml` containing every post,
//! so enumeration needs no fallback sources.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use super::sitemap::parse_sitemap;
use super::traits::{Article, BlogPlatform, PostInfo, RateLimits};
use crate::dom;

const DETECT_MARKERS: &[&str] = &[
    "powered by ghost",
    "content=\"ghost\"",
    "ghost.org",
    "generator\" content=\"ghost",
];

const TITLE_SELECTORS: &[&str] = &[
    "h1.post-full-title",
    "h1.article-title",
    "h1.post-title",
    "article h1",
    "h1",
];

const CONTENT_SELECTORS: &[&str] = &[
    "div.single-content",
    "div.gh-content",
    "section.post-full-content .post-content",
    "section.post-full-content",
    "div.post-content",
    "article .post-content",
    "article .content",
    "article",
];

/// Boilerplate stripped out of the extracted content.
const STRIP_SELECTORS: &[&str] = &[
    "script",
    "style",
    "nav",
    "header",
    "footer",
    ".subscribe-form",
    ".post-full-byline",
    ".post-full-meta",
    ".kg-signup-card",
    ".related-posts",
    ".comments",
    ".share-buttons",
    ".social-links",
    ".post-full-header",
];

pub struct GhostPlatform;

impl GhostPlatform {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for GhostPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlogPlatform for GhostPlatform {
    fn name(&self) -> &'static str {
        "ghost"
    }

    fn detect(&self, homepage_html: &str) -> bool {
        let html_lower = homepage_html.to_lowercase();
        DETECT_MARKERS.iter().any(|m| html_lower.contains(m))
    }

    async fn enumerate_posts(
        &self,
        base_url: &str,
        client: &reqwest::Client,
    ) -> Result<Vec<PostInfo>> {
        let base = Url::parse(base_url).context("Invalid base URL")?;
        let sitemap_url = base
            .join("/sitemap-posts.xml")
            .context("Failed to build sitemap URL")?;

        let response = client
            .get(sitemap_url)
            .send()
            .await
            .context("Failed to fetch post sitemap")?;
        if !response.status().is_success() {
            return Ok(Vec::new());
        }

        let body = response.text().await.context("Failed to read sitemap")?;
        let posts = parse_sitemap(&body)
            .entries
            .into_iter()
            .map(|entry| {
                let slug = url_to_slug(&entry.loc);
                PostInfo {
                    url: entry.loc,
                    slug,
                    last_modified: entry.last_modified,
                }
            })
            .collect();

        Ok(posts)
    }

    fn extract_article(&self, html: &str, url: &str) -> Option<Article> {
        let doc = Html::parse_document(html);

        let title = extract_title(&doc);
        let author = extract_author(&doc);
        let date = extract_date(&doc);
        let content_el = dom::select_first(&doc, CONTENT_SELECTORS)?;

        let skip: Vec<Selector> = STRIP_SELECTORS
            .iter()
            .filter_map(|s| Selector::parse(s).ok())
            .collect();
        let content_html = dom::inner_html_without(content_el, &skip);
        let image_urls = dom::collect_image_urls(content_el, url);

        Some(Article {
            url: url.to_string(),
            slug: url_to_slug(url),
            title,
            author,
            date,
            content_html,
            image_urls,
        })
    }

    fn rate_limits(&self) -> RateLimits {
        RateLimits {
            max_concurrent: 5,
            request_delay: Duration::from_millis(100),
        }
    }
}

/// Slug is the URL path with surrounding slashes stripped.
fn url_to_slug(url: &str) -> String {
    let path = Url::parse(url)
        .map(|u| u.path().trim_matches('/').to_string())
        .unwrap_or_default();
    if path.is_empty() {
        "index".to_string()
    } else {
        path
    }
}

fn extract_title(doc: &Html) -> String {
    if let Some(title) = dom::select_first_text(doc, TITLE_SELECTORS) {
        return title;
    }
    if let Some(og) = dom::meta_property(doc, "og:title") {
        return og;
    }
    dom::select_first_text(doc, &["title"])
        .map(|t| t.split('|').next().unwrap_or(&t).trim().to_string())
        .unwrap_or_else(|| "Untitled".to_string())
}

fn extract_author(doc: &Html) -> String {
    if let Some(author) = dom::meta_content(doc, "author") {
        return author;
    }
    if let Some(creator) = dom::meta_content(doc, "twitter:creator") {
        return creator.trim_start_matches('@').to_string();
    }
    dom::select_first_text(
        doc,
        &[
            "[rel='author']",
            ".byline-name",
            ".author-name",
            ".post-full-byline-content",
        ],
    )
    .unwrap_or_else(|| "Unknown".to_string())
}

fn extract_date(doc: &Html) -> Option<chrono::DateTime<chrono::Utc>> {
    let time_selector = Selector::parse("time[datetime]").ok()?;
    if let Some(el) = doc.select(&time_selector).next() {
        if let Some(dt) = el.value().attr("datetime").and_then(dom::parse_iso_datetime) {
            return Some(dt);
        }
    }
    dom::meta_property(doc, "article:published_time")
        .as_deref()
        .and_then(dom::parse_iso_datetime)
}
