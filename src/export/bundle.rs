//! Download bundle: zips a finished job directory for one-shot retrieval.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Name of the bundle inside the job directory.
pub const BUNDLE_NAME: &str = "download.zip";

/// Zip the contents of a job directory into `download.zip` at its root.
///
/// # Errors
///
/// Returns an error if the directory cannot be read or the archive cannot
/// be written.
pub async fn create_download_zip(job_dir: PathBuf) -> Result<PathBuf> {
    tokio::task::spawn_blocking(move || {
        let zip_path = job_dir.join(BUNDLE_NAME);
        let file = std::fs::File::create(&zip_path)
            .with_context(|| format!("Failed to create {}", zip_path.display()))?;
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut stack = vec![job_dir.clone()];
        let mut buffer = Vec::new();

        while let Some(dir) = stack.pop() {
            for entry in std::fs::read_dir(&dir)
                .with_context(|| format!("Failed to read {}", dir.display()))?
            {
                let entry = entry?;
                let path = entry.path();
                if path == zip_path {
                    continue;
                }
                let name = relative_name(&job_dir, &path);

                if entry.file_type()?.is_dir() {
                    zip.add_directory(format!("{name}/"), options)?;
                    stack.push(path);
                } else {
                    zip.start_file(name, options)?;
                    buffer.clear();
                    std::fs::File::open(&path)
                        .with_context(|| format!("Failed to open {}", path.display()))?
                        .read_to_end(&mut buffer)?;
                    zip.write_all(&buffer)?;
                }
            }
        }

        zip.finish().context("Failed to finalize bundle")?;
        Ok(zip_path)
    })
    .await
    .context("Bundle task panicked")?
}

fn relative_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
