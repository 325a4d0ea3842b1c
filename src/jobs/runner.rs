//! Runs one admitted job end to end.
//!
//! Discovery feeds the fetch engine, the surviving articles feed the
//! exporters, and the job directory is bundled for download. Whatever the
//! outcome, finishing triggers exactly one admission check so the queue
//! keeps advancing.

use anyhow::anyhow;
use tracing::{error, info, warn};

use super::{JobId, JobStore};
use crate::error::PipelineError;
use crate::export::{bundle, export_format, ExportInput};
use crate::pipeline::{discover_posts, download_posts, http_client};
use crate::platforms::Article;

/// Spawn the pipeline for an admitted job.
pub fn spawn(store: JobStore, id: JobId) {
    tokio::spawn(run_job(store, id));
}

async fn run_job(store: JobStore, id: JobId) {
    let outcome = run_job_inner(&store, id).await;

    if let Err(ref e) = outcome {
        error!(job_id = %id, "Job failed: {e}");
    } else {
        info!(job_id = %id, "Job complete");
    }

    // The only mechanism that advances the queue.
    let next = store.finish(id, outcome.map_err(|e| e.to_string()));
    if let Some(next_id) = next {
        info!(job_id = %next_id, "Admitting next queued job");
        spawn(store.clone(), next_id);
    }
}

async fn run_job_inner(store: &JobStore, id: JobId) -> Result<(), PipelineError> {
    let (url, formats, max_posts) = store
        .params(id)
        .ok_or_else(|| PipelineError::Internal(anyhow!("job disappeared from registry")))?;

    let job_dir = store.job_dir(id);
    tokio::fs::create_dir_all(&job_dir)
        .await
        .map_err(|e| PipelineError::Internal(anyhow!("failed to create job directory: {e}")))?;

    let client =
        http_client(store.config().request_timeout).map_err(PipelineError::Internal)?;

    store.set_progress(id, "Discovering posts...");
    let (platform, posts) = discover_posts(&client, &url, None, max_posts).await?;

    store.set_progress(id, &format!("Downloading {} posts...", posts.len()));
    let images_dir = job_dir.join("html").join("images");
    let outcome = download_posts(&client, platform, &posts, Some(&images_dir))
        .await
        .map_err(PipelineError::Internal)?;

    if outcome.articles.is_empty() {
        return Err(PipelineError::NoContent);
    }

    let blog_title = blog_title_from_url(&url);
    let blog_author = pick_blog_author(&outcome.articles);

    let input = ExportInput {
        articles: &outcome.articles,
        image_map: &outcome.image_map,
        base_url: &url,
        blog_title: &blog_title,
        blog_author: &blog_author,
        output_dir: &job_dir,
    };

    let mut produced = 0usize;
    for format in &formats {
        store.set_progress(
            id,
            &format!("Generating {}...", format.as_str().to_uppercase()),
        );
        match export_format(*format, &input, store.config().chrome_path.as_deref()).await {
            Ok(Some(path)) => {
                info!(job_id = %id, format = %format, path = %path.display(), "Format produced");
                produced += 1;
            }
            Ok(None) => {
                info!(job_id = %id, format = %format, "Format skipped (renderer unavailable)");
            }
            Err(e) => {
                warn!(job_id = %id, format = %format, "Export failed, skipping format: {e:#}");
            }
        }
    }

    if produced == 0 {
        return Err(PipelineError::NoFormats);
    }

    store.set_progress(id, "Creating download package...");
    bundle::create_download_zip(job_dir)
        .await
        .map_err(PipelineError::Internal)?;

    Ok(())
}

/// Readable blog title derived from the host name.
#[must_use]
pub fn blog_title_from_url(url: &str) -> String {
    let host = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(ToString::to_string))
        .unwrap_or_else(|| url.to_string());

    let mut domain = host.as_str();
    for prefix in ["www.", "blog.", "blogs."] {
        if let Some(stripped) = domain.strip_prefix(prefix) {
            domain = stripped;
            break;
        }
    }

    domain
        .split('.')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().collect::<String>() + chars.as_str()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Most common non-"Unknown" article author, falling back to "Unknown".
#[must_use]
pub fn pick_blog_author(articles: &[Article]) -> String {
    let mut counts: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    for article in articles {
        if article.author != "Unknown" {
            *counts.entry(article.author.as_str()).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map_or_else(|| "Unknown".to_string(), |(author, _)| author.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article_by(author: &str) -> Article {
        Article {
            url: "https://blog.example.com/p".to_string(),
            slug: "p".to_string(),
            title: "P".to_string(),
            author: author.to_string(),
            date: None,
            content_html: String::new(),
            image_urls: Vec::new(),
        }
    }

    #[test]
    fn test_blog_title_from_url() {
        assert_eq!(
            blog_title_from_url("https://www.cold-takes.com/"),
            "Cold-takes Com"
        );
        assert_eq!(
            blog_title_from_url("https://blog.acme.io/"),
            "Acme Io"
        );
    }

    #[test]
    fn test_pick_blog_author_majority() {
        let articles = vec![
            article_by("Jane"),
            article_by("Jane"),
            article_by("Guest"),
            article_by("Unknown"),
        ];
        assert_eq!(pick_blog_author(&articles), "Jane");
    }

    #[test]
    fn test_pick_blog_author_all_unknown() {
        let articles = vec![article_by("Unknown")];
        assert_eq!(pick_blog_author(&articles), "Unknown");
    }
}
