pub mod discovery;
pub mod fetch;

pub use discovery::discover_posts;
pub use fetch::{
    download_posts, download_posts_with_policy, FetchOutcome, ImageMap, RetryPolicy,
};

use std::time::Duration;

use anyhow::{Context, Result};

use crate::constants::FETCH_USER_AGENT;

/// Build the HTTP client shared by one pipeline run.
///
/// # Errors
///
/// Returns an error if the TLS backend fails to initialize.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(FETCH_USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .context("Failed to build HTTP client")
}
