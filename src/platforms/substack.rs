//! Substack platform support.
//!
//! Enumeration prefers `/sitemap.xml` (a sitemap index on larger
//! publications) and falls back to `/feed`, which only carries the most
//! recent posts. Premium posts are detected and skipped at extraction time.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use super::sitemap::{parse_feed_links, parse_sitemap, SitemapEntry};
use super::traits::{Article, BlogPlatform, PostInfo, RateLimits};
use crate::dom;

const DETECT_MARKERS: &[&str] = &[
    "substack.com",
    "substackcdn.com",
    "content=\"substack\"",
    "substack-post",
];

/// URLs containing these keywords are not posts.
const FILTER_KEYWORDS: &[&str] = &["about", "archive", "podcast", "subscribe", "recommendations"];

const PAYWALL_TEXT_MARKERS: &[&str] = &[
    "subscribe to continue",
    "this post is for paid subscribers",
    "upgrade to paid",
    "become a paid subscriber",
];

const STRIP_SELECTORS: &[&str] = &[
    "script",
    "style",
    ".subscription-widget",
    ".subscribe-widget",
    ".post-ufi",
    ".post-footer",
    ".comments-section",
    ".share-dialog",
];

pub struct SubstackPlatform;

impl SubstackPlatform {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for SubstackPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlogPlatform for SubstackPlatform {
    fn name(&self) -> &'static str {
        "substack"
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

        let mut posts = fetch_from_sitemap(&base, client).await;
        if posts.is_empty() {
            posts = fetch_from_feed(&base, client).await;
        }

        Ok(filter_posts(posts))
    }

    fn extract_article(&self, html: &str, url: &str) -> Option<Article> {
        let doc = Html::parse_document(html);

        if is_paywalled(&doc) {
            return None;
        }

        let json_ld = extract_json_ld(&doc);

        let title = json_ld
            .title
            .or_else(|| dom::select_first_text(&doc, &["h1.post-title", "h2.post-title", "h1"]))
            .or_else(|| dom::meta_property(&doc, "og:title"))
            .unwrap_or_else(|| "Untitled".to_string());

        let author = json_ld
            .author
            .or_else(|| dom::meta_content(&doc, "author"))
            .unwrap_or_else(|| "Unknown".to_string());

        let date = json_ld.date.or_else(|| extract_time_datetime(&doc));

        let subtitle = dom::select_first_text(&doc, &["h3.subtitle"]);

        let content_el =
            dom::select_first(&doc, &["div.available-content", "div.body", "article"])?;

        let skip: Vec<Selector> = STRIP_SELECTORS
            .iter()
            .filter_map(|s| Selector::parse(s).ok())
            .collect();
        let mut content_html = String::new();
        if let Some(subtitle) = subtitle {
            content_html.push_str(&format!("<p><em>{subtitle}</em></p>\n"));
        }
        content_html.push_str(&dom::inner_html_without(content_el, &skip));

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
        // Substack throttles aggressively; keep this conservative.
        RateLimits {
            max_concurrent: 2,
            request_delay: Duration::from_secs(1),
        }
    }
}

async fn fetch_from_sitemap(base: &Url, client: &reqwest::Client) -> Vec<PostInfo> {
    let Ok(sitemap_url) = base.join("/sitemap.xml") else {
        return Vec::new();
    };
    let Some(body) = fetch_text(client, sitemap_url.as_str()).await else {
        return Vec::new();
    };

    let file = parse_sitemap(&body);
    if file.nested.is_empty() {
        return entries_to_posts(file.entries);
    }

    // Sitemap index: only the post sitemaps are interesting.
    let mut posts = Vec::new();
    for nested in file
        .nested
        .iter()
        .filter(|loc| loc.to_lowercase().contains("posts"))
    {
        if let Some(body) = fetch_text(client, nested).await {
            posts.extend(entries_to_posts(parse_sitemap(&body).entries));
        }
    }
    posts
}

async fn fetch_from_feed(base: &Url, client: &reqwest::Client) -> Vec<PostInfo> {
    let Ok(feed_url) = base.join("/feed") else {
        return Vec::new();
    };
    let Some(body) = fetch_text(client, feed_url.as_str()).await else {
        return Vec::new();
    };

    parse_feed_links(&body)
        .into_iter()
        .map(|url| {
            let slug = url_to_slug(&url);
            PostInfo {
                url,
                slug,
                last_modified: None,
            }
        })
        .collect()
}

async fn fetch_text(client: &reqwest::Client, url: &str) -> Option<String> {
    let response = client.get(url).send().await.ok()?;
    if !response.status().is_success() {
        return None;
    }
    response.text().await.ok()
}

fn entries_to_posts(entries: Vec<SitemapEntry>) -> Vec<PostInfo> {
    entries
        .into_iter()
        .map(|entry| {
            let slug = url_to_slug(&entry.loc);
            PostInfo {
                url: entry.loc,
                slug,
                last_modified: entry.last_modified,
            }
        })
        .collect()
}

/// Keep only real posts: Substack post URLs carry a `/p/` segment.
fn filter_posts(posts: Vec<PostInfo>) -> Vec<PostInfo> {
    posts
        .into_iter()
        .filter(|post| {
            let url_lower = post.url.to_lowercase();
            url_lower.contains("/p/") && !FILTER_KEYWORDS.iter().any(|kw| url_lower.contains(kw))
        })
        .collect()
}

/// Slug is the path with the `p/` prefix removed.
fn url_to_slug(url: &str) -> String {
    let path = Url::parse(url)
        .map(|u| u.path().trim_matches('/').to_string())
        .unwrap_or_default();
    let path = path.strip_prefix("p/").unwrap_or(&path).to_string();
    if path.is_empty() {
        "index".to_string()
    } else {
        path
    }
}

fn is_paywalled(doc: &Html) -> bool {
    if dom::select_first(doc, &["h2.paywall-title", "div.paywall"]).is_some() {
        return true;
    }

    // Only check the content area, not the whole page.
    if let Some(content) = dom::select_first(doc, &["div.available-content"]) {
        let text: String = content.text().collect::<String>().to_lowercase();
        if PAYWALL_TEXT_MARKERS.iter().any(|m| text.contains(m)) {
            return true;
        }
    }

    false
}

fn extract_time_datetime(doc: &Html) -> Option<chrono::DateTime<chrono::Utc>> {
    let selector = Selector::parse("time[datetime]").ok()?;
    doc.select(&selector)
        .next()
        .and_then(|el| el.value().attr("datetime"))
        .and_then(dom::parse_iso_datetime)
}

#[derive(Default)]
struct JsonLdMeta {
    title: Option<String>,
    author: Option<String>,
    date: Option<chrono::DateTime<chrono::Utc>>,
}

/// Metadata from the JSON-LD script tag, the most reliable source on
/// Substack pages.
fn extract_json_ld(doc: &Html) -> JsonLdMeta {
    let Ok(selector) = Selector::parse("script[type='application/ld+json']") else {
        return JsonLdMeta::default();
    };

    for script in doc.select(&selector) {
        let raw: String = script.text().collect();
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) else {
            continue;
        };
        if let Some(meta) = json_ld_from_value(&value) {
            return meta;
        }
    }

    JsonLdMeta::default()
}

fn json_ld_from_value(value: &serde_json::Value) -> Option<JsonLdMeta> {
    const ARTICLE_TYPES: &[&str] = &["Article", "NewsArticle", "BlogPosting"];

    let object = match value {
        serde_json::Value::Array(items) => items.iter().find(|item| {
            item.get("@type")
                .and_then(serde_json::Value::as_str)
                .is_some_and(|t| ARTICLE_TYPES.contains(&t))
        })?,
        other => other,
    };

    let title = object
        .get("headline")
        .or_else(|| object.get("name"))
        .and_then(serde_json::Value::as_str)
        .map(ToString::to_string);

    let author = match object.get("author") {
        Some(serde_json::Value::Object(map)) => map
            .get("name")
            .and_then(serde_json::Value::as_str)
            .map(ToString::to_string),
        Some(serde_json::Value::Array(items)) => items.first().and_then(|first| match first {
            serde_json::Value::Object(map) => map
                .get("name")
                .and_then(serde_json::Value::as_str)
                .map(ToString::to_string),
            serde_json::Value::String(s) => Some(s.clone()),
            _ => None,
        }),
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        _ => None,
    };

    let date = object
        .get("datePublished")
        .or_else(|| object.get("dateCreated"))
        .and_then(serde_json::Value::as_str)
        .and_then(dom::parse_iso_datetime);

    if title.is_none() && author.is_none() && date.is_none() {
        return None;
    }

    Some(JsonLdMeta {
        title,
        author,
        date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_substack_markers() {
        let platform = SubstackPlatform::new();
        assert!(platform.detect(r#"<img src="https://substackcdn.com/image.png">"#));
        assert!(!platform.detect("<p>nothing here</p>"));
    }

    #[test]
    fn test_url_to_slug_strips_p_prefix() {
        assert_eq!(
            url_to_slug("https://example.substack.com/p/my-post"),
            "my-post"
        );
        assert_eq!(url_to_slug("https://example.substack.com/"), "index");
    }

    #[test]
    fn test_filter_posts_keeps_only_post_urls() {
        let posts = vec![
            PostInfo {
                url: "https://x.substack.com/p/real-post".to_string(),
                slug: "real-post".to_string(),
                last_modified: None,
            },
            PostInfo {
                url: "https://x.substack.com/about".to_string(),
                slug: "about".to_string(),
                last_modified: None,
            },
            PostInfo {
                url: "https://x.substack.com/p/the-podcast-episode".to_string(),
                slug: "the-podcast-episode".to_string(),
                last_modified: None,
            },
        ];
        let filtered = filter_posts(posts);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].slug, "real-post");
    }

    #[test]
    fn test_extract_skips_paywalled_post() {
        let html = r#"<html><body>
            <h1 class="post-title">Premium Post</h1>
            <h2 class="paywall-title">This post is for paid subscribers</h2>
        </body></html>"#;
        let platform = SubstackPlatform::new();
        assert!(platform
            .extract_article(html, "https://x.substack.com/p/premium")
            .is_none());
    }

    #[test]
    fn test_extract_prefers_json_ld_metadata() {
        let html = r#"<html><head>
            <script type="application/ld+json">
            {"@type": "NewsArticle", "headline": "LD Title",
             "author": {"name": "LD Author"},
             "datePublished": "2024-03-01T12:00:00Z"}
            </script>
        </head><body>
            <h1 class="post-title">DOM Title</h1>
            <div class="available-content"><p>Free content.</p></div>
        </body></html>"#;
        let platform = SubstackPlatform::new();
        let article = platform
            .extract_article(html, "https://x.substack.com/p/ld-post")
            .expect("article");
        assert_eq!(article.title, "LD Title");
        assert_eq!(article.author, "LD Author");
        assert!(article.date.is_some());
        assert!(article.content_html.contains("Free content."));
    }
}
