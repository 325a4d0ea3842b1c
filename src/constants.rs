//! Shared constants used across the application.

/// User agent string sent with every outbound HTTP request.
///
/// Identifies the tool honestly so blog operators can tell archival traffic
/// apart from readers.
pub const FETCH_USER_AGENT: &str = "blogpack/0.1.0 (offline reader)";

/// Hard server-side ceiling on posts per job when no configuration is given.
pub const DEFAULT_MAX_POSTS: usize = 50;

/// Maximum retry attempts for a rate-limited (HTTP 429) request.
pub const MAX_RETRIES: u32 = 5;

/// Initial backoff before the first 429 retry; doubles on each attempt.
pub const INITIAL_BACKOFF_SECS: f64 = 2.0;
