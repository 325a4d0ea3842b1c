//! Sitemap and RSS feed parsing shared by the platform variants.

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::dom::parse_iso_datetime;

/// One `<url>` entry from a sitemap.
#[derive(Debug, Clone)]
pub struct SitemapEntry {
    pub loc: String,
    pub last_modified: Option<DateTime<Utc>>,
}

/// A parsed sitemap document.
///
/// A sitemap index yields `nested` references and no entries; a regular
/// sitemap yields `entries`.
#[derive(Debug, Default)]
pub struct SitemapFile {
    pub entries: Vec<SitemapEntry>,
    pub nested: Vec<String>,
}

#[derive(PartialEq)]
enum Section {
    None,
    Url,
    SitemapRef,
}

/// Parse a sitemap or sitemap index.
///
/// Tolerant of malformed XML: returns whatever was recovered before the
/// first parse error.
#[must_use]
pub fn parse_sitemap(xml: &str) -> SitemapFile {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut file = SitemapFile::default();
    let mut section = Section::None;
    let mut loc: Option<String> = None;
    let mut lastmod: Option<DateTime<Utc>> = None;
    let mut leaf: Option<Vec<u8>> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"url" => {
                    section = Section::Url;
                    loc = None;
                    lastmod = None;
                }
                b"sitemap" => {
                    section = Section::SitemapRef;
                    loc = None;
                }
                tag @ (b"loc" | b"lastmod") => leaf = Some(tag.to_vec()),
                _ => leaf = None,
            },
            Ok(Event::Text(t)) => {
                let Ok(text) = t.unescape() else { continue };
                match leaf.as_deref() {
                    Some(b"loc") => loc = Some(text.trim().to_string()),
                    Some(b"lastmod") => lastmod = parse_iso_datetime(&text),
                    _ => {}
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"url" => {
                    if section == Section::Url {
                        if let Some(loc) = loc.take() {
                            file.entries.push(SitemapEntry {
                                loc,
                                last_modified: lastmod.take(),
                            });
                        }
                    }
                    section = Section::None;
                }
                b"sitemap" => {
                    if section == Section::SitemapRef {
                        if let Some(loc) = loc.take() {
                            file.nested.push(loc);
                        }
                    }
                    section = Section::None;
                }
                b"loc" | b"lastmod" => leaf = None,
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }

    file
}

/// Extract `<item><link>` URLs from an RSS feed.
#[must_use]
pub fn parse_feed_links(xml: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut links = Vec::new();
    let mut in_item = false;
    let mut in_link = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"item" | b"entry" => in_item = true,
                b"link" if in_item => in_link = true,
                _ => in_link = false,
            },
            Ok(Event::Text(t)) if in_link => {
                if let Ok(text) = t.unescape() {
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        links.push(trimmed.to_string());
                    }
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"item" | b"entry" => in_item = false,
                b"link" => in_link = false,
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }

    links
}

#[cfg(test)]
mod tests {
    use super::*;

    const SITEMAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url>
    <loc>https://blog.example.com/first-post/</loc>
    <lastmod>2024-01-15T10:00:00Z</lastmod>
  </url>
  <url>
    <loc>https://blog.example.com/second-post/</loc>
  </url>
</urlset>"#;

    const SITEMAP_INDEX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap>
    <loc>https://blog.example.com/sitemap-posts.xml</loc>
  </sitemap>
  <sitemap>
    <loc>https://blog.example.com/sitemap-pages.xml</loc>
  </sitemap>
</sitemapindex>"#;

    const FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Example</title>
    <link>https://blog.example.com/</link>
    <item>
      <title>First</title>
      <link>https://blog.example.com/p/first</link>
    </item>
    <item>
      <title>Second</title>
      <link>https://blog.example.com/p/second</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_sitemap_entries() {
        let file = parse_sitemap(SITEMAP);
        assert_eq!(file.entries.len(), 2);
        assert!(file.nested.is_empty());
        assert_eq!(file.entries[0].loc, "https://blog.example.com/first-post/");
        assert!(file.entries[0].last_modified.is_some());
        assert!(file.entries[1].last_modified.is_none());
    }

    #[test]
    fn test_parse_sitemap_index() {
        let file = parse_sitemap(SITEMAP_INDEX);
        assert!(file.entries.is_empty());
        assert_eq!(file.nested.len(), 2);
        assert_eq!(file.nested[0], "https://blog.example.com/sitemap-posts.xml");
    }

    #[test]
    fn test_parse_feed_links_ignores_channel_link() {
        let links = parse_feed_links(FEED);
        assert_eq!(
            links,
            vec![
                "https://blog.example.com/p/first".to_string(),
                "https://blog.example.com/p/second".to_string(),
            ]
        );
    }

    #[test]
    fn test_parse_sitemap_tolerates_garbage() {
        let file = parse_sitemap("this is not xml at all");
        assert!(file.entries.is_empty());
        assert!(file.nested.is_empty());
    }
}
