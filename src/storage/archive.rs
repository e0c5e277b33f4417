//! Zip bundles of produced files for the "download all" endpoint.

use std::io::{Cursor, ErrorKind, Write};
use std::path::Path;

use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::convert::content_hash;
use crate::error::StoreError;

/// Most files a single archive may bundle.
pub const MAX_ARCHIVE_FILES: usize = 64;

/// A zip archive built in memory.
#[derive(Debug, Clone)]
pub struct Archive {
    /// Download name, derived from the requested file names
    pub name: String,

    /// Zip bytes
    pub data: Vec<u8>,

    /// Names of the files that made it into the archive, in request order
    pub entries: Vec<String>,
}

/// Name of the archive for a list of files: `sha256(names).zip`.
///
/// The same list of files always maps to the same archive name.
pub fn archive_name(files: &[String]) -> String {
    format!("{}.zip", content_hash(files.concat().as_bytes()))
}

/// Bundle files from `output_dir` into a deflated zip archive.
///
/// `files` must be plain file names. Repeated names are added once and
/// names with no file behind them are skipped.
pub async fn bundle_outputs(output_dir: &Path, files: &[String]) -> Result<Archive, StoreError> {
    let mut contents: Vec<(String, Vec<u8>)> = Vec::with_capacity(files.len());

    for name in files {
        if contents.iter().any(|(seen, _)| seen == name) {
            continue;
        }

        let path = output_dir.join(name);
        match tokio::fs::read(&path).await {
            Ok(data) => contents.push((name.clone(), data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(file = %name, "Skipping missing file");
            }
            Err(e) => return Err(StoreError::Io(format!("{}: {}", path.display(), e))),
        }
    }

    let name = archive_name(files);
    let entries: Vec<String> = contents.iter().map(|(entry, _)| entry.clone()).collect();

    let data = tokio::task::spawn_blocking(move || write_zip(&contents))
        .await
        .map_err(|e| StoreError::Archive(e.to_string()))??;

    info!(
        archive = %name,
        entries = entries.len(),
        size = data.len(),
        "Built archive"
    );

    Ok(Archive {
        name,
        data,
        entries,
    })
}

fn write_zip(contents: &[(String, Vec<u8>)]) -> Result<Vec<u8>, StoreError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for (name, data) in contents {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        writer
            .start_file(name.as_str(), options)
            .map_err(|e| StoreError::Archive(e.to_string()))?;
        writer
            .write_all(data)
            .map_err(|e| StoreError::Archive(e.to_string()))?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| StoreError::Archive(e.to_string()))?;
    Ok(cursor.into_inner())
}
