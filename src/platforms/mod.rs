mod registry;
pub mod sitemap;
mod traits;

// Platform variants
pub mod ghost;
pub mod substack;
pub mod wordpress;

pub use registry::PlatformRegistry;
pub use traits::{Article, BlogPlatform, PostInfo, RateLimits};

/// Global platform registry.
///
/// Registration order is detection priority; adding a platform means
/// appending an implementation here, not modifying the pipeline.
pub static PLATFORMS: std::sync::LazyLock<PlatformRegistry> = std::sync::LazyLock::new(|| {
    let mut registry = PlatformRegistry::new();
    registry.register(Box::new(ghost::GhostPlatform::new()));
    registry.register(Box::new(substack::SubstackPlatform::new()));
    registry.register(Box::new(wordpress::WordPressPlatform::new()));
    registry
});
