use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Basic info about a post discovered from a sitemap/feed/REST index.
#[derive(Debug, Clone)]
pub struct PostInfo {
    /// Absolute URL of the post.
    pub url: String,
    /// Slug derived from the URL path; stable across runs and used as both
    /// the de-duplication key and the output filename stem.
    pub slug: String,
    /// Last-modified timestamp, when the index provides one.
    pub last_modified: Option<DateTime<Utc>>,
}

/// A fully extracted blog article.
#[derive(Debug, Clone)]
pub struct Article {
    pub url: String,
    pub slug: String,
    pub title: String,
    pub author: String,
    pub date: Option<DateTime<Utc>>,
    pub content_html: String,
    /// Image URLs referenced by the content, in document order.
    pub image_urls: Vec<String>,
}

/// Politeness limits applied by the fetch engine for one platform.
#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    /// Maximum concurrently outstanding requests.
    pub max_concurrent: usize,
    /// Fixed delay inserted before every request.
    pub request_delay: Duration,
}

impl Default for RateLimits {
    /// Defaults applied to unrecognized platforms.
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            request_delay: Duration::from_millis(100),
        }
    }
}

/// Capability contract for one blogging platform.
///
/// Any implementation satisfying these operations can be registered without
/// touching the pipeline; selection runs `detect` over the registered
/// variants in fixed priority order, first match wins.
#[async_trait]
pub trait BlogPlatform: Send + Sync {
    /// Unique identifier for this platform.
    fn name(&self) -> &'static str;

    /// Pure signature match against the homepage HTML.
    fn detect(&self, homepage_html: &str) -> bool;

    /// Fetch all post URLs from the platform's index, with internal
    /// fallbacks in priority order.
    ///
    /// Must tolerate partial or missing sources and return whatever subset
    /// it can recover; an empty vector (not an error) means nothing was
    /// found.
    ///
    /// # Errors
    ///
    /// Returns an error only on transport failure reaching the index.
    async fn enumerate_posts(
        &self,
        base_url: &str,
        client: &reqwest::Client,
    ) -> Result<Vec<PostInfo>>;

    /// Extract clean article content from already-fetched post HTML.
    ///
    /// Returns `None` to skip the post (paywalled or unparsable) rather
    /// than raising.
    fn extract_article(&self, html: &str, url: &str) -> Option<Article>;

    /// Politeness limits for this platform.
    fn rate_limits(&self) -> RateLimits {
        RateLimits::default()
    }
}
