//! HTML export: one reader-styled document per article plus an index.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use maud::{html, Markup, PreEscaped, DOCTYPE};

use super::linker::{rewrite_links, slug_filename};
use super::ExportInput;
use crate::dom::clean_article_html;
use crate::platforms::Article;

/// Minimal CSS for pleasant reading; shared with the EPUB stylesheet.
pub const READER_CSS: &str = r#"
body {
    max-width: 700px;
    margin: 2rem auto;
    padding: 0 1rem;
    font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, Helvetica, Arial, sans-serif;
    font-size: 18px;
    line-height: 1.6;
    color: #333;
    background: #fff;
}
h1 {
    font-size: 2rem;
    margin-bottom: 0.5rem;
    line-height: 1.2;
}
h2 {
    font-size: 1.5rem;
    margin-top: 2rem;
}
h3 {
    font-size: 1.25rem;
    margin-top: 1.5rem;
}
.meta {
    color: #666;
    font-size: 0.9rem;
    margin-bottom: 2rem;
}
img {
    max-width: 100%;
    height: auto;
    margin: 1rem 0;
}
blockquote {
    border-left: 4px solid #ddd;
    margin: 1rem 0;
    padding-left: 1rem;
    color: #555;
}
pre, code {
    background: #f5f5f5;
    padding: 0.2rem 0.4rem;
    border-radius: 3px;
    font-size: 0.9em;
}
pre {
    padding: 1rem;
    overflow-x: auto;
}
a {
    color: #0066cc;
}
a:hover {
    text-decoration: underline;
}
figure {
    margin: 1.5rem 0;
}
figcaption {
    font-size: 0.9rem;
    color: #666;
    text-align: center;
    margin-top: 0.5rem;
}
hr {
    border: none;
    border-top: 1px solid #ddd;
    margin: 2rem 0;
}
"#;

/// Export articles to a folder of HTML files.
///
/// # Errors
///
/// Returns an error if the output directory cannot be written.
pub async fn export_html(input: &ExportInput<'_>) -> Result<Option<PathBuf>> {
    let html_dir = input.output_dir.join("html");
    tokio::fs::create_dir_all(&html_dir)
        .await
        .context("Failed to create html output dir")?;

    let slugs: HashSet<String> = input.articles.iter().map(|a| a.slug.clone()).collect();

    for article in input.articles {
        let content = clean_article_html(&article.content_html);
        let content = rewrite_links(&content, input.base_url, &slugs, input.image_map, "images");
        let page = render_article_page(article, &content);

        let path = html_dir.join(slug_filename(&article.slug));
        tokio::fs::write(&path, page.into_string())
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    // Index lists articles newest first.
    let mut sorted: Vec<&Article> = input.articles.iter().collect();
    sorted.sort_by(|a, b| b.date.cmp(&a.date));

    let index = render_index_page(input.blog_title, &sorted);
    tokio::fs::write(html_dir.join("index.html"), index.into_string())
        .await
        .context("Failed to write index.html")?;

    Ok(Some(html_dir))
}

fn format_date(date: Option<DateTime<Utc>>) -> Option<String> {
    date.map(|d| d.format("%B %-d, %Y").to_string())
}

fn render_article_page(article: &Article, content_html: &str) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (article.title) }
                style { (PreEscaped(READER_CSS)) }
            }
            body {
                article {
                    h1 { (article.title) }
                    div class="meta" {
                        span class="author" { (article.author) }
                        @if let Some(date) = format_date(article.date) {
                            " • "
                            span class="date" { (date) }
                        }
                    }
                    (PreEscaped(content_html))
                }
                hr;
                p class="meta" {
                    a href="index.html" { "← All posts" }
                    " • "
                    a href=(article.url) { "Original" }
                }
            }
        }
    }
}

fn render_index_page(blog_title: &str, sorted: &[&Article]) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (blog_title) }
                style { (PreEscaped(READER_CSS)) }
            }
            body {
                h1 { (blog_title) }
                p class="meta" { (sorted.len()) " posts" }
                ul {
                    @for article in sorted {
                        li {
                            a href=(slug_filename(&article.slug)) { (article.title) }
                            @if let Some(date) = format_date(article.date) {
                                " "
                                span class="meta" { "(" (date) ")" }
                            }
                        }
                    }
                }
            }
        }
    }
}
