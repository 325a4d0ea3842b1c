use super::traits::BlogPlatform;

/// Ordered registry of platform implementations.
///
/// Registration order is the detection priority: `detect` is evaluated over
/// the variants in insertion order and the first match wins. Order is a
/// tie-break policy, not a ranking.
pub struct PlatformRegistry {
    platforms: Vec<Box<dyn BlogPlatform>>,
}

impl PlatformRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            platforms: Vec::new(),
        }
    }

    /// Register a platform at the end of the priority list.
    pub fn register(&mut self, platform: Box<dyn BlogPlatform>) {
        self.platforms.push(platform);
    }

    /// Detect the platform for a homepage, first match wins.
    #[must_use]
    pub fn detect(&self, homepage_html: &str) -> Option<&dyn BlogPlatform> {
        self.platforms
            .iter()
            .find(|p| p.detect(homepage_html))
            .map(AsRef::as_ref)
    }

    /// Look up a platform by name (used when the caller forces a variant).
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&dyn BlogPlatform> {
        self.platforms
            .iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
            .map(AsRef::as_ref)
    }

    /// Names of all registered platforms, in priority order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.platforms.iter().map(|p| p.name()).collect()
    }
}

impl Default for PlatformRegistry {
    fn default() -> Self {
        Self::new()
    }
}
