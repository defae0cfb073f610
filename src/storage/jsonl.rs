//! NDJSON file sink and existing-output scan

use crate::output::ItemRecord;
use crate::storage::traits::{ItemSink, StorageError, StorageResult};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Appends records to a newline-delimited JSON file
#[derive(Debug)]
pub struct JsonlSink {
    path: PathBuf,
    file: File,
}

impl JsonlSink {
    /// Opens `path` for appending, creating it and its parent directories
    ///
    /// A file whose last line was cut short by an interrupted run is
    /// terminated first, so the next record starts on a line of its own.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)
            .map_err(|e| StorageError::io(path, e))?;
        terminate_last_line(&mut file).map_err(|e| StorageError::io(path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }
}

// Appends a newline when the file is non-empty and does not end with one
fn terminate_last_line(file: &mut File) -> std::io::Result<()> {
    if file.metadata()?.len() == 0 {
        return Ok(());
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    if last[0] != b'\n' {
        tracing::warn!("Output ends mid-line, starting a new line before appending");
        file.write_all(b"\n")?;
        file.flush()?;
    }
    Ok(())
}

impl ItemSink for JsonlSink {
    fn append(&mut self, record: &ItemRecord) -> StorageResult<()> {
        let mut line = record.to_json_line()?;
        line.push('\n');

        // One write per line so concurrent readers never see half a record
        self.file
            .write_all(line.as_bytes())
            .and_then(|_| self.file.flush())
            .map_err(|e| StorageError::io(&self.path, e))
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

/// URLs already present in an output file
#[derive(Debug, Default)]
pub struct ExistingUrls {
    pub urls: HashSet<String>,

    /// Lines that could not be read as a record
    pub skipped_lines: usize,
}

// Only the dedup key is needed; everything else may vary between versions
#[derive(Deserialize)]
struct UrlOnly {
    url: String,
}

/// Scans an existing output file for the URLs it already holds
///
/// A missing file is an empty set. Blank lines are ignored; lines that are
/// not JSON or carry no `url` are skipped with a warning.
pub fn load_existing(path: &Path) -> StorageResult<ExistingUrls> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!("No existing output at {}", path.display());
            return Ok(ExistingUrls::default());
        }
        Err(e) => return Err(StorageError::io(path, e)),
    };

    let mut existing = ExistingUrls::default();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| StorageError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<UrlOnly>(&line) {
            Ok(record) => {
                existing.urls.insert(record.url);
            }
            Err(e) => {
                tracing::warn!(
                    "Skipping unreadable line {} in {}: {}",
                    index + 1,
                    path.display(),
                    e
                );
                existing.skipped_lines += 1;
            }
        }
    }

    tracing::info!(
        "Loaded {} existing URLs from {}",
        existing.urls.len(),
        path.display()
    );
    Ok(existing)
}
