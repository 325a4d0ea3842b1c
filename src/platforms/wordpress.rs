//! WordPress platform support.
//!
//! Enumeration tries the REST API first (complete and paginated), then
//! sitemaps, then RSS feeds. Each source degrades gracefully: whatever
//! subset can be recovered is returned.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::Deserialize;
use url::Url;

use super::sitemap::{parse_feed_links, parse_sitemap};
use super::traits::{Article, BlogPlatform, PostInfo, RateLimits};
use crate::dom;

const DETECT_MARKERS: &[&str] = &[
    "/wp-content/",
    "/wp-includes/",
    "wp-json",
    "generator\" content=\"wordpress",
    "wordpress.org",
    "wp-block-",
    "wp-embed",
];

/// URLs containing these keywords are not posts.
const FILTER_KEYWORDS: &[&str] = &[
    "wp-admin",
    "wp-login",
    "wp-content",
    "attachment",
    "page",
    "author",
    "category",
    "tag",
];

const CONTENT_SELECTORS: &[&str] = &[
    "article .entry-content",
    "div.entry-content",
    "div.post-content",
    "article .post-body",
    "div.single-content",
    ".content-area article",
    "article",
];

const TITLE_SELECTORS: &[&str] = &[
    "h1.entry-title",
    "h1.post-title",
    "article h1",
    ".post-title",
    "h1",
];

const STRIP_SELECTORS: &[&str] = &[
    "script",
    "style",
    "nav",
    "header",
    "footer",
    ".sidebar",
    ".widget",
    ".ad",
    ".advertisement",
    ".share-buttons",
    ".social-share",
    ".related-posts",
    ".comments",
    ".comment-form",
    ".author-bio",
    ".post-navigation",
    ".pagination",
    ".breadcrumbs",
    "form",
];

const PAYWALL_CLASS_MARKERS: &[&str] = &[
    "members-only",
    "protected-content",
    "paywall",
    "subscriber-only",
    "premium-content",
    "restricted-content",
];

/// Maximum page size the WordPress REST API allows.
const REST_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct WpRestPost {
    link: String,
    slug: String,
    modified: Option<String>,
}

pub struct WordPressPlatform;

impl WordPressPlatform {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for WordPressPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlogPlatform for WordPressPlatform {
    fn name(&self) -> &'static str {
        "wordpress"
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

        let posts = fetch_from_rest_api(&base, client).await;
        if !posts.is_empty() {
            return Ok(posts);
        }

        let posts = fetch_from_sitemap(&base, client).await;
        if !posts.is_empty() {
            return Ok(filter_posts(posts));
        }

        Ok(filter_posts(fetch_from_feed(&base, client).await))
    }

    fn extract_article(&self, html: &str, url: &str) -> Option<Article> {
        let doc = Html::parse_document(html);

        if is_paywalled(&doc) {
            return None;
        }

        let title = dom::select_first_text(&doc, TITLE_SELECTORS)
            .or_else(|| dom::meta_property(&doc, "og:title"))
            .or_else(|| page_title(&doc))
            .unwrap_or_else(|| "Untitled".to_string());

        let author = dom::meta_content(&doc, "author")
            .or_else(|| {
                dom::select_first_text(
                    &doc,
                    &[
                        ".author-name",
                        ".entry-author-name",
                        ".post-author-name",
                        "a[rel='author']",
                        ".byline a",
                        ".author a",
                    ],
                )
            })
            .unwrap_or_else(|| "Unknown".to_string());

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
            max_concurrent: 3,
            request_delay: Duration::from_millis(500),
        }
    }
}

/// Fetch all posts via the REST API, following `X-WP-TotalPages`.
async fn fetch_from_rest_api(base: &Url, client: &reqwest::Client) -> Vec<PostInfo> {
    let mut posts = Vec::new();
    let mut page = 1usize;

    loop {
        let api_path = format!(
            "wp-json/wp/v2/posts?per_page={REST_PAGE_SIZE}&page={page}&_fields=link,slug,modified"
        );
        let Ok(api_url) = base.join(&api_path) else {
            return posts;
        };

        let response = match client.get(api_url).send().await {
            Ok(r) => r,
            Err(_) => return posts,
        };

        // 400 = past the last page, 404 = API not available.
        let status = response.status().as_u16();
        if status == 400 || status == 404 {
            break;
        }
        if !response.status().is_success() {
            return posts;
        }

        let total_pages = response
            .headers()
            .get("X-WP-TotalPages")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(1);

        let batch: Vec<WpRestPost> = match response.json().await {
            Ok(b) => b,
            Err(_) => return posts,
        };
        if batch.is_empty() {
            break;
        }

        posts.extend(batch.into_iter().map(|post| PostInfo {
            last_modified: post.modified.as_deref().and_then(dom::parse_iso_datetime),
            url: post.link,
            slug: post.slug,
        }));

        if page >= total_pages {
            break;
        }
        page += 1;
    }

    posts
}

async fn fetch_from_sitemap(base: &Url, client: &reqwest::Client) -> Vec<PostInfo> {
    let candidates = ["/sitemap.xml", "/sitemap_index.xml", "/post-sitemap.xml"];

    for candidate in candidates {
        let Ok(sitemap_url) = base.join(candidate) else {
            continue;
        };
        let Some(body) = fetch_text(client, sitemap_url.as_str()).await else {
            continue;
        };

        let file = parse_sitemap(&body);

        if !file.nested.is_empty() {
            let mut posts = Vec::new();
            for nested in file
                .nested
                .iter()
                .filter(|loc| loc.to_lowercase().contains("post"))
            {
                if let Some(body) = fetch_text(client, nested).await {
                    posts.extend(parse_sitemap(&body).entries.into_iter().map(|entry| {
                        let slug = url_to_slug(&entry.loc);
                        PostInfo {
                            url: entry.loc,
                            slug,
                            last_modified: entry.last_modified,
                        }
                    }));
                }
            }
            if !posts.is_empty() {
                return posts;
            }
        }

        if !file.entries.is_empty() {
            return file
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
        }
    }

    Vec::new()
}

async fn fetch_from_feed(base: &Url, client: &reqwest::Client) -> Vec<PostInfo> {
    let candidates = ["/feed/", "/feed", "/rss"];

    for candidate in candidates {
        let Ok(feed_url) = base.join(candidate) else {
            continue;
        };
        let Some(body) = fetch_text(client, feed_url.as_str()).await else {
            continue;
        };

        let links = parse_feed_links(&body);
        if !links.is_empty() {
            return links
                .into_iter()
                .map(|url| {
                    let slug = url_to_slug(&url);
                    PostInfo {
                        url,
                        slug,
                        last_modified: None,
                    }
                })
                .collect();
        }
    }

    Vec::new()
}

async fn fetch_text(client: &reqwest::Client, url: &str) -> Option<String> {
    let response = client.get(url).send().await.ok()?;
    if !response.status().is_success() {
        return None;
    }
    response.text().await.ok()
}

fn filter_posts(posts: Vec<PostInfo>) -> Vec<PostInfo> {
    posts
        .into_iter()
        .filter(|post| {
            let url_lower = post.url.to_lowercase();
            if FILTER_KEYWORDS.iter().any(|kw| url_lower.contains(kw)) {
                return false;
            }
            // Skip the homepage itself.
            Url::parse(&post.url).map_or(false, |u| u.path() != "/" && !u.path().is_empty())
        })
        .collect()
}

/// Slug is the last path segment; permalink structures vary
/// (`/year/month/slug`, `/slug`, `/slug.html`).
fn url_to_slug(url: &str) -> String {
    let path = Url::parse(url)
        .map(|u| u.path().trim_matches('/').to_string())
        .unwrap_or_default();
    let slug = path.rsplit('/').next().unwrap_or("").to_string();
    let slug = slug.strip_suffix(".html").unwrap_or(&slug).to_string();
    if slug.is_empty() {
        "index".to_string()
    } else {
        slug
    }
}

fn is_paywalled(doc: &Html) -> bool {
    for marker in PAYWALL_CLASS_MARKERS {
        if let Ok(selector) = Selector::parse(&format!("[class*='{marker}']")) {
            if doc.select(&selector).next().is_some() {
                return true;
            }
        }
    }

    // Login prompts inside the main content area.
    if let Some(content) = dom::select_first(doc, &CONTENT_SELECTORS[..3]) {
        let text = content.text().collect::<String>().to_lowercase();
        const LOGIN_MARKERS: &[&str] = &[
            "log in to view",
            "members only",
            "subscribe to read",
            "premium members",
            "login to continue",
        ];
        if LOGIN_MARKERS.iter().any(|m| text.contains(m)) {
            return true;
        }
    }

    false
}

fn page_title(doc: &Html) -> Option<String> {
    let title = dom::select_first_text(doc, &["title"])?;
    // Remove the site name (usually after | or -).
    for sep in [" | ", " - ", " :: "] {
        if let Some(prefix) = title.split(sep).next() {
            if prefix.len() < title.len() {
                return Some(prefix.trim().to_string());
            }
        }
    }
    Some(title)
}

fn extract_date(doc: &Html) -> Option<chrono::DateTime<chrono::Utc>> {
    let selector = Selector::parse("time[datetime]").ok()?;
    if let Some(dt) = doc
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("datetime"))
        .and_then(dom::parse_iso_datetime)
    {
        return Some(dt);
    }
    dom::meta_property(doc, "article:published_time")
        .as_deref()
        .and_then(dom::parse_iso_datetime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_wordpress_markers() {
        let platform = WordPressPlatform::new();
        assert!(platform.detect(r#"<link href="/wp-content/themes/x/style.css">"#));
        assert!(platform.detect(r#"<meta name="generator" content="WordPress 6.4">"#));
        assert!(!platform.detect("<p>plain page</p>"));
    }

    #[test]
    fn test_url_to_slug_takes_last_segment() {
        assert_eq!(
            url_to_slug("https://example.com/2015/01/the-post/"),
            "the-post"
        );
        assert_eq!(url_to_slug("https://example.com/the-post.html"), "the-post");
        assert_eq!(url_to_slug("https://example.com/"), "index");
    }

    #[test]
    fn test_filter_posts_drops_admin_and_homepage() {
        let make = |url: &str| PostInfo {
            url: url.to_string(),
            slug: url_to_slug(url),
            last_modified: None,
        };
        let posts = vec![
            make("https://example.com/a-real-post/"),
            make("https://example.com/wp-admin/options.php"),
            make("https://example.com/category/news/"),
            make("https://example.com/"),
        ];
        let filtered = filter_posts(posts);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].slug, "a-real-post");
    }

    #[test]
    fn test_extract_article_paywalled() {
        let html = r#"<html><body>
            <article><div class="entry-content premium-content">Locked</div></article>
        </body></html>"#;
        let platform = WordPressPlatform::new();
        assert!(platform
            .extract_article(html, "https://example.com/locked-post/")
            .is_none());
    }

    #[test]
    fn test_extract_article_basic() {
        let html = r#"<html><head><title>My Post | Example Site</title></head><body>
            <article>
              <h1 class="entry-title">My Post</h1>
              <time datetime="2024-05-01T09:30:00Z">May 1</time>
              <div class="entry-content">
                <p>Hello world.</p>
                <div class="share-buttons">share</div>
              </div>
            </article>
        </body></html>"#;
        let platform = WordPressPlatform::new();
        let article = platform
            .extract_article(html, "https://example.com/2024/05/my-post/")
            .expect("article");
        assert_eq!(article.title, "My Post");
        assert_eq!(article.slug, "my-post");
        assert!(article.date.is_some());
        assert!(article.content_html.contains("Hello world."));
        assert!(!article.content_html.contains("share"));
    }
}
