//! PDF export via headless Chrome.
//!
//! The articles are combined into one print-oriented HTML document which a
//! headless browser renders to PDF. Chrome is an optional runtime
//! dependency: when no usable browser is found the exporter reports "not
//! produced" and the format is skipped, never failing the job.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use futures_util::StreamExt;
use tracing::{debug, info, warn};
use url::Url;

use super::html::READER_CSS;
use super::linker::rewrite_links;
use super::{output_stem, ExportInput};
use crate::dom::clean_article_html;
use crate::platforms::Article;

/// Page load timeout for the local print document.
const PAGE_TIMEOUT: Duration = Duration::from_secs(60);

/// Export articles to a single PDF.
///
/// Returns `Ok(None)` when headless Chrome is unavailable.
///
/// # Errors
///
/// Returns an error if the intermediate document cannot be written or the
/// browser fails mid-render.
pub async fn export_pdf(
    input: &ExportInput<'_>,
    chrome_path: Option<&str>,
) -> Result<Option<PathBuf>> {
    let source_path = input.output_dir.join("pdf-source.html");
    let combined = combined_document(input);
    tokio::fs::write(&source_path, combined)
        .await
        .context("Failed to write PDF source document")?;

    let Some((mut browser, handler_task)) = launch_browser(chrome_path).await else {
        return Ok(None);
    };

    // file:// URLs need an absolute path.
    let absolute = std::fs::canonicalize(&source_path).unwrap_or_else(|_| source_path.clone());
    let source_url = Url::from_file_path(&absolute)
        .map_or_else(|()| absolute.display().to_string(), |u| u.to_string());

    let result = render_pdf(&browser, &source_url).await;

    if let Err(e) = browser.close().await {
        debug!("Failed to close browser: {e}");
    }
    handler_task.abort();

    let pdf_data = result?;
    let pdf_path = input
        .output_dir
        .join(format!("{}.pdf", output_stem(input.blog_title)));
    tokio::fs::write(&pdf_path, &pdf_data)
        .await
        .with_context(|| format!("Failed to write {}", pdf_path.display()))?;

    // The intermediate document is not part of the bundle.
    let _ = tokio::fs::remove_file(&source_path).await;

    info!(path = %pdf_path.display(), size = pdf_data.len(), "PDF generated");

    Ok(Some(pdf_path))
}

/// Launch headless Chrome, or `None` when it is not installed.
async fn launch_browser(
    chrome_path: Option<&str>,
) -> Option<(Browser, tokio::task::JoinHandle<()>)> {
    let mut builder = BrowserConfig::builder()
        .request_timeout(PAGE_TIMEOUT)
        .no_sandbox()
        .arg("--headless=new")
        .arg("--disable-gpu")
        .arg("--disable-dev-shm-usage")
        .arg("--mute-audio")
        .arg("--hide-scrollbars");

    if let Some(path) = chrome_path {
        builder = builder.chrome_executable(path);
    }

    let config = match builder.build() {
        Ok(c) => c,
        Err(e) => {
            warn!("Headless Chrome unavailable, skipping PDF: {e}");
            return None;
        }
    };

    match Browser::launch(config).await {
        Ok((browser, mut handler)) => {
            let handler_task = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if let Err(e) = event {
                        debug!("Browser handler error: {e}");
                    }
                }
            });
            Some((browser, handler_task))
        }
        Err(e) => {
            warn!("Failed to launch headless Chrome, skipping PDF: {e}");
            None
        }
    }
}

async fn render_pdf(browser: &Browser, url: &str) -> Result<Vec<u8>> {
    let page = browser
        .new_page(url)
        .await
        .context("Failed to open print document")?;

    page.wait_for_navigation()
        .await
        .context("Navigation timeout")?;

    let pdf_data = page
        .pdf(PrintToPdfParams::default())
        .await
        .context("Failed to render PDF")?;

    if let Err(e) = page.close().await {
        debug!("Failed to close page: {e}");
    }

    Ok(pdf_data)
}

/// One print document with a title page and every article in reading
/// order, page-broken per article.
fn combined_document(input: &ExportInput<'_>) -> String {
    let mut chapters: Vec<&Article> = input.articles.iter().collect();
    chapters.sort_by(|a, b| a.date.cmp(&b.date));

    let slugs: HashSet<String> = input.articles.iter().map(|a| a.slug.clone()).collect();

    let mut body = String::new();
    body.push_str(&format!(
        r#"<div class="title-page"><h1>{}</h1><p class="meta">{}</p></div>"#,
        html_escape(input.blog_title),
        html_escape(input.blog_author),
    ));

    for article in chapters {
        let content = clean_article_html(&article.content_html);
        let content = rewrite_links(
            &content,
            input.base_url,
            &slugs,
            input.image_map,
            "html/images",
        );
        let date = article
            .date
            .map(|d| d.format("%B %-d, %Y").to_string())
            .unwrap_or_default();
        body.push_str(&format!(
            r#"<article class="chapter"><h1>{}</h1><div class="meta">{} {}</div>{content}</article>"#,
            html_escape(&article.title),
            html_escape(&article.author),
            html_escape(&date),
        ));
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<title>{}</title>
<style>
{READER_CSS}
.chapter {{ page-break-before: always; }}
.title-page {{ text-align: center; margin-top: 40vh; }}
</style>
</head>
<body>
{body}
</body>
</html>
"#,
        html_escape(input.blog_title)
    )
}

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
