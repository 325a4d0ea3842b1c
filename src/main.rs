use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use blogpack::config::Config;
use blogpack::export::{export_format, ExportFormat, ExportInput};
use blogpack::jobs::normalize_blog_url;
use blogpack::jobs::runner::{blog_title_from_url, pick_blog_author};
use blogpack::pipeline::{discover_posts, download_posts, http_client};
use blogpack::web;

#[derive(Debug, Parser)]
#[command(name = "blogpack", about = "Pack entire blogs for offline reading")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the web service.
    Serve,
    /// Archive one blog to a local directory.
    Fetch {
        /// Blog URL to download.
        url: String,
        /// Output directory.
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,
        /// Output formats: all, or a comma-separated list of html/epub/pdf.
        #[arg(short, long, default_value = "all")]
        format: String,
        /// Force a platform (ghost, substack, wordpress) instead of
        /// auto-detecting.
        #[arg(short, long)]
        platform: Option<String>,
        /// Limit the number of posts to download.
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Skip downloading images.
        #[arg(long)]
        no_images: bool,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    init_tracing()?;

    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    match cli.command {
        Command::Serve => serve(config).await,
        Command::Fetch {
            url,
            output,
            format,
            platform,
            limit,
            no_images,
        } => fetch(config, &url, output, &format, platform.as_deref(), limit, no_images).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    info!("Starting blogpack web service");

    tokio::select! {
        result = web::serve(config) => result,
        () = shutdown_signal() => {
            info!("Shutting down...");
            Ok(())
        }
    }
}

async fn fetch(
    config: Config,
    url: &str,
    output: PathBuf,
    format: &str,
    platform: Option<&str>,
    limit: Option<usize>,
    no_images: bool,
) -> Result<()> {
    let url = normalize_blog_url(url);
    info!(url = %url, "Downloading blog");

    let formats = parse_formats(format)?;
    let client = http_client(config.request_timeout)?;

    let max_posts = limit.filter(|n| *n > 0).unwrap_or(usize::MAX);
    let (detected, posts) = discover_posts(&client, &url, platform, max_posts).await?;

    if posts.is_empty() {
        info!("No posts found");
        return Ok(());
    }

    tokio::fs::create_dir_all(&output)
        .await
        .with_context(|| format!("Failed to create output directory: {}", output.display()))?;

    let images_dir = output.join("html").join("images");
    let outcome = download_posts(
        &client,
        detected,
        &posts,
        (!no_images).then(|| images_dir.as_path()),
    )
    .await?;

    if outcome.articles.is_empty() {
        anyhow::bail!("no articles could be downloaded");
    }

    info!(count = outcome.articles.len(), "Downloaded articles");

    let blog_title = format!("{} Archive", blog_title_from_url(&url));
    let blog_author = pick_blog_author(&outcome.articles);

    let input = ExportInput {
        articles: &outcome.articles,
        image_map: &outcome.image_map,
        base_url: &url,
        blog_title: &blog_title,
        blog_author: &blog_author,
        output_dir: &output,
    };

    let mut produced = 0usize;
    for fmt in formats {
        match export_format(fmt, &input, config.chrome_path.as_deref()).await {
            Ok(Some(path)) => {
                info!(format = %fmt, path = %path.display(), "Format produced");
                produced += 1;
            }
            Ok(None) => info!(format = %fmt, "Format skipped (renderer unavailable)"),
            Err(e) => error!(format = %fmt, "Export failed: {e:#}"),
        }
    }

    if produced == 0 {
        anyhow::bail!("no output formats could be produced");
    }

    info!(output = %output.display(), "Done");
    Ok(())
}

fn parse_formats(value: &str) -> Result<Vec<ExportFormat>> {
    if value.trim().eq_ignore_ascii_case("all") {
        return Ok(ExportFormat::ALL.to_vec());
    }
    value
        .split(',')
        .map(|part| ExportFormat::from_str(part).map_err(|e| anyhow::anyhow!(e)))
        .collect()
}

fn init_tracing() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,blogpack=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
