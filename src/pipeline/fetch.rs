//! Rate-limited fetch engine.
//!
//! Turns a sequence of [`PostInfo`] into a filtered sequence of [`Article`]
//! plus an [`ImageMap`], respecting per-platform politeness limits and
//! tolerating transient throttling.
//!
//! A post's lifecycle is `pending -> (fetching -> [throttled -> waiting]*
//! -> fetching) -> {extracted | dropped}`; throttling is the only
//! retry-inducing state, bounded by the attempt cap. Item-level failures
//! are absorbed here and never escape to the caller.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use rand::Rng;
use reqwest::StatusCode;
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use url::Url;

use crate::constants::{INITIAL_BACKOFF_SECS, MAX_RETRIES};
use crate::platforms::{Article, BlogPlatform, PostInfo};

/// Mapping from original image URL to local storage path.
///
/// Entries are deduplicated by content hash: two distinct URLs serving
/// identical bytes collapse to one stored file.
pub type ImageMap = HashMap<String, PathBuf>;

/// Result of one engine run. Articles preserve enumeration order.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub articles: Vec<Article>,
    pub image_map: ImageMap,
}

/// Throttling retry policy.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum retry attempts after the initial try.
    pub max_retries: u32,
    /// Backoff before the first retry; doubles per attempt.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            initial_backoff: Duration::from_secs_f64(INITIAL_BACKOFF_SECS),
        }
    }
}

/// Download all posts and, optionally, their images, under the default
/// retry policy.
///
/// # Errors
///
/// See [`download_posts_with_policy`].
pub async fn download_posts(
    client: &reqwest::Client,
    platform: &dyn BlogPlatform,
    posts: &[PostInfo],
    images_dir: Option<&Path>,
) -> Result<FetchOutcome> {
    download_posts_with_policy(client, platform, posts, images_dir, RetryPolicy::default()).await
}

/// Download all posts and, optionally, their images.
///
/// Completes only after every submitted post and every discovered image has
/// reached a terminal outcome; there is no partial delivery.
///
/// # Errors
///
/// Returns an error only when the images directory cannot be created;
/// per-item fetch failures are dropped, not propagated.
pub async fn download_posts_with_policy(
    client: &reqwest::Client,
    platform: &dyn BlogPlatform,
    posts: &[PostInfo],
    images_dir: Option<&Path>,
    policy: RetryPolicy,
) -> Result<FetchOutcome> {
    let limits = platform.rate_limits();
    debug!(
        platform = platform.name(),
        max_concurrent = limits.max_concurrent,
        delay_ms = limits.request_delay.as_millis() as u64,
        "Using platform rate limits"
    );

    // The admission gate. A permit is held for a full request-attempt
    // cycle, including the politeness delay and any backoff waits, so the
    // configured width is a true ceiling on outstanding requests.
    let gate = Semaphore::new(limits.max_concurrent);
    let paywalled = AtomicUsize::new(0);

    let results = futures::future::join_all(posts.iter().map(|post| {
        let gate = &gate;
        let paywalled = &paywalled;
        async move {
            let bytes =
                fetch_bytes_with_backoff(client, gate, &post.url, limits.request_delay, policy)
                    .await?;
            let body = String::from_utf8_lossy(&bytes);
            let article = platform.extract_article(&body, &post.url);
            if article.is_none() {
                paywalled.fetch_add(1, Ordering::Relaxed);
                debug!(url = %post.url, "Extraction declined, skipping post");
            }
            article
        }
    }))
    .await;

    // join_all preserves input order, so the surviving articles keep the
    // platform's enumeration order.
    let articles: Vec<Article> = results.into_iter().flatten().collect();

    let skipped = paywalled.load(Ordering::Relaxed);
    if skipped > 0 {
        info!(count = skipped, "Skipped premium/unextractable posts");
    }
    info!(
        downloaded = articles.len(),
        requested = posts.len(),
        "Post downloads finished"
    );

    let image_map = match images_dir {
        Some(dir) => {
            download_images(client, &gate, &articles, dir, limits.request_delay, policy).await?
        }
        None => ImageMap::new(),
    };

    Ok(FetchOutcome {
        articles,
        image_map,
    })
}

/// Fetch every referenced image exactly once and store it keyed by content
/// hash.
async fn download_images(
    client: &reqwest::Client,
    gate: &Semaphore,
    articles: &[Article],
    images_dir: &Path,
    delay: Duration,
    policy: RetryPolicy,
) -> Result<ImageMap> {
    let urls = image_url_union(articles);
    if urls.is_empty() {
        return Ok(ImageMap::new());
    }

    tokio::fs::create_dir_all(images_dir)
        .await
        .with_context(|| format!("Failed to create images dir: {}", images_dir.display()))?;

    info!(count = urls.len(), "Downloading images");

    let results = futures::future::join_all(urls.iter().map(|url| async move {
        let bytes = fetch_bytes_with_backoff(client, gate, url, delay, policy).await?;
        let filename = image_filename(url, &bytes);
        let path = images_dir.join(&filename);
        // Identical bytes from different URLs share a filename; a repeat
        // write is the same content.
        if let Err(e) = tokio::fs::write(&path, &bytes).await {
            warn!(url = %url, "Failed to store image: {e}");
            return None;
        }
        Some((url.clone(), path))
    }))
    .await;

    Ok(results.into_iter().flatten().collect())
}

/// Union of all articles' image URLs, first-seen order.
fn image_url_union(articles: &[Article]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();
    for article in articles {
        for url in &article.image_urls {
            if seen.insert(url.clone()) {
                urls.push(url.clone());
            }
        }
    }
    urls
}

/// Local filename for an image: content hash plus the URL's extension.
///
/// Keying by the hash of the downloaded bytes (not the URL) collapses
/// mirrored copies to one stored file.
fn image_filename(url: &str, bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hex::encode(hasher.finalize());

    let ext = Url::parse(url)
        .ok()
        .and_then(|u| {
            Path::new(u.path())
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
        })
        .filter(|e| e.len() <= 5 && e.chars().all(char::is_alphanumeric))
        .unwrap_or_else(|| "jpg".to_string());

    format!("{}.{ext}", &digest[..16])
}

/// GET a URL under the admission gate, retrying on throttling.
///
/// Waits `initial_backoff * 2^attempt * jitter` between 429 retries, with
/// jitter drawn uniformly from [0.5, 1.5) to avoid synchronized retry
/// storms across concurrent workers. Any other failure (transport error,
/// timeout, non-2xx) drops the item immediately.
async fn fetch_bytes_with_backoff(
    client: &reqwest::Client,
    gate: &Semaphore,
    url: &str,
    delay: Duration,
    policy: RetryPolicy,
) -> Option<Vec<u8>> {
    let _permit = gate.acquire().await.ok()?;

    let mut backoff = policy.initial_backoff;
    for attempt in 0..=policy.max_retries {
        tokio::time::sleep(delay).await;

        let response = match client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(url = %url, "Request failed: {e}");
                return None;
            }
        };

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            if attempt == policy.max_retries {
                warn!(url = %url, "Rate limited, max retries reached");
                return None;
            }
            let jitter = rand::thread_rng().gen_range(0.5..1.5);
            let wait = backoff.mul_f64(jitter);
            debug!(
                url = %url,
                wait_secs = wait.as_secs_f64(),
                attempt = attempt + 1,
                "Rate limited, backing off"
            );
            tokio::time::sleep(wait).await;
            backoff *= 2;
            continue;
        }

        if !response.status().is_success() {
            warn!(url = %url, status = %response.status(), "Dropping item");
            return None;
        }

        return match response.bytes().await {
            Ok(bytes) => Some(bytes.to_vec()),
            Err(e) => {
                warn!(url = %url, "Failed to read body: {e}");
                None
            }
        };
    }

    None
}
