//! Integration tests for platform detection and enumeration fallbacks.

use std::time::Duration;

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use blogpack::pipeline::http_client;
use blogpack::platforms::{BlogPlatform, PLATFORMS};

#[test]
fn test_detection_runs_in_registration_order() {
    // A page carrying both Ghost and WordPress markers resolves to the
    // higher-priority variant.
    let html = r#"<meta name="generator" content="Ghost 5.0">
                  <link href="/wp-content/style.css">"#;
    let platform = PLATFORMS.detect(html).expect("detected");
    assert_eq!(platform.name(), "ghost");
}

#[test]
fn test_detection_none_for_plain_page() {
    assert!(PLATFORMS.detect("<html><body>hello</body></html>").is_none());
}

#[test]
fn test_forced_platform_lookup_by_name() {
    assert_eq!(PLATFORMS.by_name("WordPress").unwrap().name(), "wordpress");
    assert!(PLATFORMS.by_name("medium").is_none());
    assert_eq!(PLATFORMS.names(), vec!["ghost", "substack", "wordpress"]);
}

#[tokio::test]
async fn test_wordpress_rest_api_pagination() {
    let server = MockServer::start().await;

    let page1: Vec<serde_json::Value> = (0..2)
        .map(|i| {
            serde_json::json!({
                "link": format!("{}/post-{i}/", server.uri()),
                "slug": format!("post-{i}"),
                "modified": "2024-01-01T10:00:00"
            })
        })
        .collect();
    let page2 = vec![serde_json::json!({
        "link": format!("{}/post-2/", server.uri()),
        "slug": "post-2",
        "modified": serde_json::Value::Null
    })];

    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/posts"))
        .and(query_param("page", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-WP-TotalPages", "2")
                .set_body_json(page1),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/posts"))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-WP-TotalPages", "2")
                .set_body_json(page2),
        )
        .mount(&server)
        .await;

    let client = http_client(Duration::from_secs(5)).unwrap();
    let platform = PLATFORMS.by_name("wordpress").unwrap();
    let posts = platform
        .enumerate_posts(&format!("{}/", server.uri()), &client)
        .await
        .unwrap();

    assert_eq!(posts.len(), 3);
    assert_eq!(posts[0].slug, "post-0");
    assert!(posts[0].last_modified.is_some());
    assert_eq!(posts[2].slug, "post-2");
    assert!(posts[2].last_modified.is_none());
}

#[tokio::test]
async fn test_wordpress_falls_back_to_sitemap_when_api_missing() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/posts"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let sitemap = format!(
        r#"<?xml version="1.0"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>{0}/a-real-post/</loc></url>
  <url><loc>{0}/category/news/</loc></url>
</urlset>"#,
        server.uri()
    );
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sitemap, "text/xml"))
        .mount(&server)
        .await;

    let client = http_client(Duration::from_secs(5)).unwrap();
    let platform = PLATFORMS.by_name("wordpress").unwrap();
    let posts = platform
        .enumerate_posts(&format!("{}/", server.uri()), &client)
        .await
        .unwrap();

    // Taxonomy URLs are filtered out.
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].slug, "a-real-post");
}

#[tokio::test]
async fn test_substack_sitemap_index_flow() {
    let server = MockServer::start().await;

    let index = format!(
        r#"<?xml version="1.0"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc>{0}/sitemap-posts-1.xml</loc></sitemap>
  <sitemap><loc>{0}/sitemap-pages.xml</loc></sitemap>
</sitemapindex>"#,
        server.uri()
    );
    let posts_sitemap = format!(
        r#"<?xml version="1.0"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>{0}/p/first-post</loc><lastmod>2024-01-10T00:00:00Z</lastmod></url>
  <url><loc>{0}/about</loc></url>
</urlset>"#,
        server.uri()
    );

    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(index, "text/xml"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sitemap-posts-1.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(posts_sitemap, "text/xml"))
        .mount(&server)
        .await;

    let client = http_client(Duration::from_secs(5)).unwrap();
    let platform = PLATFORMS.by_name("substack").unwrap();
    let posts = platform
        .enumerate_posts(&format!("{}/", server.uri()), &client)
        .await
        .unwrap();

    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].slug, "first-post");
    assert!(posts[0].last_modified.is_some());
}

#[tokio::test]
async fn test_substack_feed_fallback_when_sitemap_missing() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let feed = format!(
        r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Example</title>
  <link>{0}/</link>
  <item><title>One</title><link>{0}/p/one</link></item>
  <item><title>Two</title><link>{0}/p/two</link></item>
</channel></rss>"#,
        server.uri()
    );
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(feed, "application/rss+xml"))
        .mount(&server)
        .await;

    let client = http_client(Duration::from_secs(5)).unwrap();
    let platform = PLATFORMS.by_name("substack").unwrap();
    let posts = platform
        .enumerate_posts(&format!("{}/", server.uri()), &client)
        .await
        .unwrap();

    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0].slug, "one");
    assert_eq!(posts[1].slug, "two");
}

#[tokio::test]
async fn test_ghost_enumeration_empty_when_sitemap_missing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sitemap-posts.xml"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = http_client(Duration::from_secs(5)).unwrap();
    let platform = PLATFORMS.by_name("ghost").unwrap();
    let posts = platform
        .enumerate_posts(&format!("{}/", server.uri()), &client)
        .await
        .unwrap();
    assert!(posts.is_empty());
}
