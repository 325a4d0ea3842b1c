//! Document exporters.
//!
//! Every exporter consumes the same input: the article sequence, the image
//! map, and the blog title/author. The return contract is
//! `Result<Option<PathBuf>>`: `Ok(None)` means "not produced" (a missing
//! optional runtime dependency) and skips that one output format; only an
//! `Err` is a real exporter failure, and the pipeline still treats it as a
//! skip provided another requested format succeeds.

pub mod bundle;
pub mod epub;
pub mod html;
pub mod linker;
pub mod pdf;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::pipeline::ImageMap;
use crate::platforms::Article;

/// A requested output kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Html,
    Epub,
    Pdf,
}

impl ExportFormat {
    /// All supported formats.
    pub const ALL: &'static [Self] = &[Self::Html, Self::Epub, Self::Pdf];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Epub => "epub",
            Self::Pdf => "pdf",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "html" => Ok(Self::Html),
            "epub" => Ok(Self::Epub),
            "pdf" => Ok(Self::Pdf),
            other => Err(format!("unknown format: {other}")),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input shared by all exporters.
#[derive(Debug)]
pub struct ExportInput<'a> {
    pub articles: &'a [Article],
    pub image_map: &'a ImageMap,
    pub base_url: &'a str,
    pub blog_title: &'a str,
    pub blog_author: &'a str,
    pub output_dir: &'a Path,
}

/// Run one exporter.
///
/// # Errors
///
/// Propagates the exporter's own failure; callers treat it as a skip of
/// that format.
pub async fn export_format(
    format: ExportFormat,
    input: &ExportInput<'_>,
    chrome_path: Option<&str>,
) -> Result<Option<PathBuf>> {
    match format {
        ExportFormat::Html => html::export_html(input).await,
        ExportFormat::Epub => epub::export_epub(input),
        ExportFormat::Pdf => pdf::export_pdf(input, chrome_path).await,
    }
}

/// Filesystem-safe stem for output filenames, derived from the blog title.
#[must_use]
pub fn output_stem(blog_title: &str) -> String {
    let stem: String = blog_title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect();
    let stem = stem.trim_matches('-').to_string();
    let mut collapsed = String::with_capacity(stem.len());
    for c in stem.chars() {
        if c == '-' && collapsed.ends_with('-') {
            continue;
        }
        collapsed.push(c);
    }
    if collapsed.is_empty() {
        "blog".to_string()
    } else {
        collapsed
    }
}
