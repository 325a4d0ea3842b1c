use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::constants::DEFAULT_MAX_POSTS;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Web Server
    pub web_host: String,
    pub web_port: u16,

    // Job Queue
    pub max_concurrent_jobs: usize,
    pub queue_depth: usize,
    pub job_expiry: Duration,

    // Pipeline
    pub max_posts: usize,
    pub request_timeout: Duration,
    pub work_dir: PathBuf,

    // PDF rendering
    pub chrome_path: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable has an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Web Server
            web_host: env_or_default("WEB_HOST", "0.0.0.0"),
            web_port: parse_env_u16("WEB_PORT", 8080)?,

            // Job Queue
            max_concurrent_jobs: parse_env_usize("MAX_CONCURRENT_JOBS", 1)?,
            queue_depth: parse_env_usize("QUEUE_DEPTH", 100)?,
            job_expiry: Duration::from_secs(parse_env_u64("JOB_EXPIRY_SECS", 3600)?),

            // Pipeline
            max_posts: parse_env_usize("MAX_POSTS", DEFAULT_MAX_POSTS)?,
            request_timeout: Duration::from_secs(parse_env_u64("REQUEST_TIMEOUT_SECS", 30)?),
            work_dir: PathBuf::from(env_or_default("WORK_DIR", "/tmp/blogpack")),

            // PDF rendering
            chrome_path: optional_env("CHROME_PATH"),
        })
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_jobs == 0 {
            return Err(ConfigError::InvalidValue {
                name: "MAX_CONCURRENT_JOBS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.max_posts == 0 {
            return Err(ConfigError::InvalidValue {
                name: "MAX_POSTS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Configuration with fixed defaults for tests (ignores the environment).
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            web_host: "127.0.0.1".to_string(),
            web_port: 0,
            max_concurrent_jobs: 1,
            queue_depth: 100,
            job_expiry: Duration::from_secs(3600),
            max_posts: DEFAULT_MAX_POSTS,
            request_timeout: Duration::from_secs(10),
            work_dir: std::env::temp_dir().join("blogpack-test"),
            chrome_path: None,
        }
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u16(name: &str, default: u16) -> Result<u16, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_usize(name: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}
