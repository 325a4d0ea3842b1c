//! EPUB export.
//!
//! Writes the EPUB 2 container directly with the `zip` crate: an
//! uncompressed `mimetype` entry first, then `META-INF/container.xml`, the
//! OPF package document, an NCX table of contents, one XHTML chapter per
//! article and the stored images.

use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::html::READER_CSS;
use super::linker::{rewrite_links, slug_filename};
use super::{output_stem, ExportInput};
use crate::dom::clean_article_html;
use crate::platforms::Article;

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

/// Export articles to a single EPUB file.
///
/// # Errors
///
/// Returns an error if the container cannot be written.
pub fn export_epub(input: &ExportInput<'_>) -> Result<Option<PathBuf>> {
    let epub_path = input
        .output_dir
        .join(format!("{}.epub", output_stem(input.blog_title)));

    let file = std::fs::File::create(&epub_path)
        .with_context(|| format!("Failed to create {}", epub_path.display()))?;
    let mut zip = ZipWriter::new(file);
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    // The mimetype entry must come first and uncompressed.
    zip.start_file("mimetype", stored)?;
    zip.write_all(b"application/epub+zip")?;

    zip.start_file("META-INF/container.xml", deflated)?;
    zip.write_all(CONTAINER_XML.as_bytes())?;

    zip.start_file("OEBPS/style.css", deflated)?;
    zip.write_all(READER_CSS.as_bytes())?;

    // Chapters read oldest first, like a book.
    let mut chapters: Vec<&Article> = input.articles.iter().collect();
    chapters.sort_by(|a, b| a.date.cmp(&b.date));

    let slugs: HashSet<String> = input.articles.iter().map(|a| a.slug.clone()).collect();

    for article in &chapters {
        let content = clean_article_html(&article.content_html);
        let content = rewrite_links(&content, input.base_url, &slugs, input.image_map, "images");
        let xhtml = chapter_xhtml(article, &content);

        zip.start_file(format!("OEBPS/{}", slug_filename(&article.slug)), deflated)?;
        zip.write_all(xhtml.as_bytes())?;
    }

    // Stored images; the map may alias several URLs to one file.
    let mut image_files: Vec<(String, PathBuf)> = Vec::new();
    let mut seen = HashSet::new();
    for path in input.image_map.values() {
        let Some(filename) = path.file_name().map(|f| f.to_string_lossy().to_string()) else {
            continue;
        };
        if seen.insert(filename.clone()) {
            image_files.push((filename, path.clone()));
        }
    }

    for (filename, path) in &image_files {
        let Ok(bytes) = std::fs::read(path) else {
            continue;
        };
        zip.start_file(format!("OEBPS/images/{filename}"), deflated)?;
        zip.write_all(&bytes)?;
    }

    zip.start_file("OEBPS/content.opf", deflated)?;
    zip.write_all(content_opf(input, &chapters, &image_files).as_bytes())?;

    zip.start_file("OEBPS/toc.ncx", deflated)?;
    zip.write_all(toc_ncx(input, &chapters).as_bytes())?;

    zip.finish().context("Failed to finalize EPUB")?;

    Ok(Some(epub_path))
}

fn chapter_xhtml(article: &Article, content: &str) -> String {
    let title = xml_escape(&article.title);
    let author = xml_escape(&article.author);
    let date = article
        .date
        .map(|d| d.format("%B %-d, %Y").to_string())
        .unwrap_or_default();
    let meta = if date.is_empty() {
        author.clone()
    } else {
        format!("{author} &#8226; {date}")
    };

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.1//EN" "http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd">
<html xmlns="http://www.w3.org/1999/xhtml">
<head>
  <title>{title}</title>
  <link rel="stylesheet" type="text/css" href="style.css"/>
</head>
<body>
  <h1>{title}</h1>
  <div class="meta">{meta}</div>
  {content}
</body>
</html>
"#
    )
}

fn content_opf(
    input: &ExportInput<'_>,
    chapters: &[&Article],
    image_files: &[(String, PathBuf)],
) -> String {
    let title = xml_escape(input.blog_title);
    let author = xml_escape(input.blog_author);
    let identifier = xml_escape(&format!("blogpack-{}", input.base_url));

    let mut manifest = String::from(
        r#"    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="style" href="style.css" media-type="text/css"/>
"#,
    );
    let mut spine = String::new();

    for (i, article) in chapters.iter().enumerate() {
        let href = xml_escape(&slug_filename(&article.slug));
        manifest.push_str(&format!(
            "    <item id=\"chap{i}\" href=\"{href}\" media-type=\"application/xhtml+xml\"/>\n"
        ));
        spine.push_str(&format!("    <itemref idref=\"chap{i}\"/>\n"));
    }

    for (i, (filename, _)) in image_files.iter().enumerate() {
        let media_type = mime_guess::from_path(filename).first_or_octet_stream();
        manifest.push_str(&format!(
            "    <item id=\"img{i}\" href=\"images/{}\" media-type=\"{media_type}\"/>\n",
            xml_escape(filename)
        ));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" unique-identifier="bookid" version="2.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
    <dc:identifier id="bookid">{identifier}</dc:identifier>
    <dc:title>{title}</dc:title>
    <dc:creator opf:role="aut">{author}</dc:creator>
    <dc:language>en</dc:language>
  </metadata>
  <manifest>
{manifest}  </manifest>
  <spine toc="ncx">
{spine}  </spine>
</package>
"#
    )
}

fn toc_ncx(input: &ExportInput<'_>, chapters: &[&Article]) -> String {
    let title = xml_escape(input.blog_title);
    let identifier = xml_escape(&format!("blogpack-{}", input.base_url));

    let mut nav_points = String::new();
    for (i, article) in chapters.iter().enumerate() {
        let order = i + 1;
        let label = xml_escape(&article.title);
        let href = xml_escape(&slug_filename(&article.slug));
        nav_points.push_str(&format!(
            r#"    <navPoint id="nav{order}" playOrder="{order}">
      <navLabel><text>{label}</text></navLabel>
      <content src="{href}"/>
    </navPoint>
"#
        ));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
    <meta name="dtb:uid" content="{identifier}"/>
    <meta name="dtb:depth" content="1"/>
  </head>
  <docTitle><text>{title}</text></docTitle>
  <navMap>
{nav_points}  </navMap>
</ncx>
"#
    )
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
