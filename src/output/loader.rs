//! Reference reader for the NDJSON output
//!
//! Consumers of the output file follow the same rules as this loader:
//! unknown fields are ignored, unreadable lines are skipped, and records
//! with a newer `schema_version` are set aside instead of failing the read.

use crate::output::ItemRecord;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Records read back from an output file
#[derive(Debug, Default)]
pub struct LoadedItems {
    /// Records this reader understands
    pub items: Vec<ItemRecord>,

    /// Records with a schema version newer than this reader supports
    pub unsupported: Vec<ItemRecord>,

    /// Lines that were not valid records
    pub skipped_lines: usize,
}

/// Loads every record from an NDJSON file
pub fn load_items(path: &Path) -> io::Result<LoadedItems> {
    let reader = BufReader::new(File::open(path)?);
    let mut loaded = LoadedItems::default();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<ItemRecord>(&line) {
            Ok(record) if record.is_supported_version() => loaded.items.push(record),
            Ok(record) => loaded.unsupported.push(record),
            Err(e) => {
                tracing::debug!("Skipping unreadable line in {}: {}", path.display(), e);
                loaded.skipped_lines += 1;
            }
        }
    }

    Ok(loaded)
}
