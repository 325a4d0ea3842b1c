use thiserror::Error;

/// Job-level pipeline failures.
///
/// Item-level failures (a single post or image that cannot be fetched) are
/// absorbed inside the fetch engine and never surface here. Every variant
/// below is fatal to its own job only; the hosting process and the queue
/// keep running.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("could not detect blog platform; supported platforms: {supported}")]
    PlatformUnknown { supported: String },

    #[error("unknown platform: {0}")]
    NoSuchPlatform(String),

    #[error("failed to discover posts: {0:#}")]
    Discovery(anyhow::Error),

    #[error("no articles could be downloaded")]
    NoContent,

    #[error("no output formats could be produced")]
    NoFormats,

    #[error("internal error: {0:#}")]
    Internal(anyhow::Error),
}
