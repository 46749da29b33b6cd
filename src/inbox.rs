use std::path::{Path, PathBuf};

use crate::error::Result;

const EXPORT_EXTENSION: &str = "csv";

/// List the CSV exports directly inside `dir`, sorted by file name.
///
/// Hidden files (names starting with `.`) and subdirectories are skipped.
/// The extension match ignores case. A missing directory yields nothing.
pub fn discover_exports(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut results = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        if file_name.to_string_lossy().starts_with('.') {
            continue;
        }

        let path = entry.path();
        // Follows symlinks, so a linked export counts.
        if !path.is_file() || !is_export(&path) {
            continue;
        }
        results.push(path);
    }

    results.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(results)
}

/// Whether `path` has the export extension, ignoring case.
pub fn is_export(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(EXPORT_EXTENSION))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(exports: &[PathBuf]) -> Vec<String> {
        exports
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn discovers_csv_only() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("events.csv"), "a").unwrap();
        std::fs::write(tmp.path().join("LEGACY.CSV"), "b").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "c").unwrap();
        std::fs::write(tmp.path().join("events.csv.bak"), "d").unwrap();

        let found = discover_exports(tmp.path()).unwrap();
        assert_eq!(names(&found), vec!["LEGACY.CSV", "events.csv"]);
    }

    #[test]
    fn skips_hidden_files_and_directories() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(".partial.csv"), "x").unwrap();
        std::fs::create_dir(tmp.path().join("old.csv")).unwrap();
        std::fs::write(tmp.path().join("new.csv"), "y").unwrap();

        let found = discover_exports(tmp.path()).unwrap();
        assert_eq!(names(&found), vec!["new.csv"]);
    }

    #[test]
    fn results_are_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["2012-03.csv", "2012-01.csv", "2012-02.csv"] {
            std::fs::write(tmp.path().join(name), "x").unwrap();
        }

        let found = discover_exports(tmp.path()).unwrap();
        assert_eq!(
            names(&found),
            vec!["2012-01.csv", "2012-02.csv", "2012-03.csv"]
        );
    }

    #[test]
    fn missing_directory_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(discover_exports(&tmp.path().join("nope")).unwrap().is_empty());
    }
}
