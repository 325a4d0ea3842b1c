//! Post discovery: homepage fetch, platform detection, index enumeration.

use anyhow::Context;
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::platforms::{BlogPlatform, PlatformRegistry, PostInfo, PLATFORMS};

/// Discover the posts of a blog.
///
/// Fetches the homepage once and runs detection over the registered
/// platforms in priority order, unless `forced_platform` names a variant
/// (which bypasses detection and the homepage fetch entirely). The result
/// is truncated to `max_posts`; callers are responsible for clamping that
/// bound to the server ceiling before calling.
///
/// # Errors
///
/// Transport failures here are fatal to discovery: there is no per-item
/// recovery at this stage.
pub async fn discover_posts(
    client: &reqwest::Client,
    base_url: &str,
    forced_platform: Option<&str>,
    max_posts: usize,
) -> Result<(&'static dyn BlogPlatform, Vec<PostInfo>), PipelineError> {
    let registry: &'static PlatformRegistry = &PLATFORMS;

    let platform = match forced_platform {
        Some(name) => registry
            .by_name(name)
            .ok_or_else(|| PipelineError::NoSuchPlatform(name.to_string()))?,
        None => {
            debug!(url = %base_url, "Fetching homepage to detect platform");
            let homepage = fetch_homepage(client, base_url)
                .await
                .map_err(PipelineError::Discovery)?;
            registry
                .detect(&homepage)
                .ok_or_else(|| PipelineError::PlatformUnknown {
                    supported: registry.names().join(", "),
                })?
        }
    };

    info!(platform = platform.name(), url = %base_url, "Detected platform");

    let mut posts = platform
        .enumerate_posts(base_url, client)
        .await
        .map_err(PipelineError::Discovery)?;

    if posts.len() > max_posts {
        debug!(
            found = posts.len(),
            limit = max_posts,
            "Truncating discovered posts"
        );
        posts.truncate(max_posts);
    }

    info!(count = posts.len(), "Discovered posts");

    Ok((platform, posts))
}

async fn fetch_homepage(client: &reqwest::Client, base_url: &str) -> anyhow::Result<String> {
    let response = client
        .get(base_url)
        .send()
        .await
        .context("Failed to fetch homepage")?;

    if !response.status().is_success() {
        anyhow::bail!("homepage returned status {}", response.status());
    }

    response.text().await.context("Failed to read homepage")
}
