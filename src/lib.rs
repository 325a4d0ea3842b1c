//! Blogpack library.
//!
//! A service that archives a blog for offline reading: it discovers every
//! post via platform-provided indexes, fetches content and images under
//! per-platform politeness limits, and packages the result into
//! reader-friendly HTML/EPUB/PDF bundles.

pub mod config;
pub mod constants;
pub mod dom;
pub mod error;
pub mod export;
pub mod jobs;
pub mod pipeline;
pub mod platforms;
pub mod web;
