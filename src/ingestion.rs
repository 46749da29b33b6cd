use std::{
    ops::AddAssign,
    path::{Path, PathBuf},
};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    error::Result,
    event::Event,
    inbox,
    normalize::{HeaderIndex, Normalizer},
    settings::Settings,
    store::IndexStore,
};

/// Outcome of one import pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub inserted: usize,
    /// Rows whose id was already stored, or repeated earlier in the input.
    pub duplicates: usize,
    /// Rows that could not be normalized.
    pub skipped: usize,
}

impl AddAssign for IngestReport {
    fn add_assign(&mut self, other: Self) {
        self.inserted += other.inserted;
        self.duplicates += other.duplicates;
        self.skipped += other.skipped;
    }
}

/// Import one CSV export into the store.
pub fn ingest_csv(
    store: &impl IndexStore,
    settings: &Settings,
    path: &Path,
) -> Result<IngestReport> {
    let bytes = std::fs::read(path)?;
    debug!(path = %path.display(), bytes = bytes.len(), "read export");
    let report = ingest_bytes(store, settings, &bytes)?;
    info!(
        path = %path.display(),
        inserted = report.inserted,
        duplicates = report.duplicates,
        skipped = report.skipped,
        "import finished"
    );
    Ok(report)
}

/// Import raw export bytes in the configured encoding.
pub fn ingest_bytes(
    store: &impl IndexStore,
    settings: &Settings,
    bytes: &[u8],
) -> Result<IngestReport> {
    let (text, encoding, had_errors) = settings.csv_encoding.decode(bytes);
    if had_errors {
        warn!(
            encoding = encoding.name(),
            "export contains bytes invalid in its encoding; they were replaced"
        );
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let header = HeaderIndex::new(reader.headers()?.iter());
    let missing = header.missing(&settings.columns);
    if !missing.is_empty() {
        warn!(?missing, "export header lacks configured columns");
    }

    let mut skipped = 0;
    let mut rows = Vec::new();
    for record in reader.records() {
        match record {
            Ok(record) => rows.push(record),
            Err(e) => {
                skipped += 1;
                warn!(error = %e, "skipping unreadable row");
            }
        }
    }

    // Normalize in parallel; collect keeps file order.
    let normalizer =
        Normalizer::new(header, &settings.columns, &settings.group_marker);
    let normalized: Vec<_> = rows
        .par_iter()
        .map(|record| {
            let cells: Vec<&str> = record.iter().collect();
            let line = record.position().map_or(0, |p| p.line());
            normalizer.normalize(&cells).map_err(|e| (line, e))
        })
        .collect();

    let mut events: Vec<Event> = Vec::with_capacity(normalized.len());
    for result in normalized {
        match result {
            Ok(event) => events.push(event),
            Err((line, reason)) => {
                skipped += 1;
                warn!(line, %reason, "skipping row");
            }
        }
    }

    let flags = store.insert_batch(&events)?;
    let inserted = flags.iter().filter(|&&f| f).count();
    Ok(IngestReport {
        inserted,
        duplicates: flags.len() - inserted,
        skipped,
    })
}

/// Delete an imported export and every sibling whose file name starts with
/// the export's file name. Siblings that are exports themselves are left in
/// place. Returns the removed paths.
pub fn claim_export(path: &Path) -> Result<Vec<PathBuf>> {
    let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().to_string())
    else {
        return Ok(Vec::new());
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut removed = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.starts_with(&file_name) {
            continue;
        }
        if name != file_name && inbox::is_export(&entry.path()) {
            continue;
        }
        if entry.file_type()?.is_file() {
            std::fs::remove_file(entry.path())?;
            removed.push(entry.path());
        }
    }

    removed.sort();
    debug!(count = removed.len(), export = %path.display(), "claimed export");
    Ok(removed)
}

/// Import one export and claim it unless `keep` is set.
pub fn import_file(
    store: &impl IndexStore,
    settings: &Settings,
    path: &Path,
    keep: bool,
) -> Result<IngestReport> {
    let report = ingest_csv(store, settings, path)?;
    if !keep {
        claim_export(path)?;
    }
    Ok(report)
}

/// Import every export waiting in `dir`, oldest name first.
pub fn import_inbox(
    store: &impl IndexStore,
    settings: &Settings,
    dir: &Path,
    keep: bool,
) -> Result<IngestReport> {
    let exports = inbox::discover_exports(dir)?;
    if exports.is_empty() {
        info!(dir = %dir.display(), "inbox is empty");
    }

    let mut total = IngestReport::default();
    for path in exports {
        total += import_file(store, settings, &path, keep)?;
    }
    Ok(total)
}
