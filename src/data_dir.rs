use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Resolve the data directory from, in order of priority:
    /// 1. An explicit path (from --data-dir)
    /// 2. The RIREKI_DATA_DIR environment variable
    /// 3. The XDG data directory (~/.local/share/rireki/)
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let root = if let Some(path) = explicit {
            path.to_path_buf()
        } else if let Ok(val) = std::env::var("RIREKI_DATA_DIR") {
            PathBuf::from(val)
        } else {
            xdg::BaseDirectories::with_prefix("rireki")
                .get_data_home()
                .ok_or_else(|| {
                    Error::Config(
                        "could not determine XDG data home directory".into(),
                    )
                })?
        };

        std::fs::create_dir_all(&root)
            .map_err(|_| Error::DataDir(root.clone()))?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_db(&self) -> PathBuf {
        self.root.join("config.redb")
    }

    pub fn events_db(&self) -> PathBuf {
        self.root.join("events.redb")
    }

    pub fn tantivy_dir(&self) -> Result<PathBuf> {
        ensure_dir(self.root.join("tantivy"))
    }

    /// Where CSV exports are dropped, unless the `inbox_dir` setting points
    /// elsewhere.
    pub fn inbox_dir(&self) -> Result<PathBuf> {
        ensure_dir(self.root.join("inbox"))
    }
}

fn ensure_dir(path: PathBuf) -> Result<PathBuf> {
    std::fs::create_dir_all(&path).map_err(|_| Error::DataDir(path.clone()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_with_explicit_path() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::resolve(Some(tmp.path())).unwrap();

        assert_eq!(dir.root(), tmp.path());
        assert_eq!(dir.config_db(), tmp.path().join("config.redb"));
        assert_eq!(dir.events_db(), tmp.path().join("events.redb"));
    }

    #[test]
    fn subdirectories_are_created() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::resolve(Some(tmp.path())).unwrap();

        let tantivy = dir.tantivy_dir().unwrap();
        assert!(tantivy.exists());
        assert_eq!(tantivy, tmp.path().join("tantivy"));

        let inbox = dir.inbox_dir().unwrap();
        assert!(inbox.is_dir());
        assert_eq!(inbox, tmp.path().join("inbox"));
    }

    #[test]
    fn missing_root_is_created() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        let dir = DataDir::resolve(Some(&nested)).unwrap();
        assert!(dir.root().is_dir());
    }
}
