//! The output store: a flat directory holding finished artifacts, extracted
//! covers and transient drafts.
//!
//! The store is an explicit handle rather than a process-wide default so
//! tests (and embedding applications) can point each conversion at an
//! isolated directory.
//!
//! Naming and writing are two separate steps. [`OutputStore::next_available_name`]
//! only guarantees the returned name is unused *at the time of the call*;
//! two concurrent conversions deriving names from the same base may race.

use crate::error::Pdf2EbookError;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

/// Handle to an output directory.
#[derive(Debug, Clone)]
pub struct OutputStore {
    root: PathBuf,
}

/// One entry of [`OutputStore::list`].
#[derive(Debug, Clone, Serialize)]
pub struct StoredFile {
    pub name: String,
    pub size: u64,
    pub modified: DateTime<Local>,
}

impl fmt::Display for StoredFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} bytes) - {}",
            self.name,
            self.size,
            self.modified.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

impl OutputStore {
    /// Open the store at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, Pdf2EbookError> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|e| Pdf2EbookError::io("create store directory", &root, e))?;
        debug!("Output store at {}", root.display());
        Ok(Self { root })
    }

    /// The store directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of the entry `name`.
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Whether an entry called `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.path_of(name).exists()
    }

    /// First unused name among `<base><ext>`, `<base>_1<ext>`, `<base>_2<ext>`, …
    ///
    /// `ext` includes its leading dot (`".epub"`).
    pub fn next_available_name(&self, base: &str, ext: &str) -> String {
        let mut candidate = format!("{base}{ext}");
        let mut counter = 0usize;
        while self.contains(&candidate) {
            counter += 1;
            candidate = format!("{base}_{counter}{ext}");
        }
        candidate
    }

    /// Write `bytes` to the entry `name` via a sibling temp file and a rename,
    /// so readers never observe a half-written file.
    pub fn write_atomic(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, Pdf2EbookError> {
        validate_name(name)?;
        let path = self.path_of(name);
        let tmp_path = self.path_of(&format!(".{name}.tmp"));

        if let Err(e) = std::fs::write(&tmp_path, bytes) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(Pdf2EbookError::io("write", &path, e));
        }
        if let Err(e) = std::fs::rename(&tmp_path, &path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(Pdf2EbookError::io("write", &path, e));
        }
        Ok(path)
    }

    /// List regular files in the store, sorted by name in descending order.
    pub fn list(&self) -> Result<Vec<StoredFile>, Pdf2EbookError> {
        let entries = std::fs::read_dir(&self.root)
            .map_err(|e| Pdf2EbookError::io("list", &self.root, e))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Pdf2EbookError::io("list", &self.root, e))?;
            let meta = entry
                .metadata()
                .map_err(|e| Pdf2EbookError::io("stat", entry.path(), e))?;
            if !meta.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            files.push(StoredFile {
                name,
                size: meta.len(),
                modified: DateTime::<Local>::from(modified),
            });
        }
        files.sort_by(|a, b| b.name.cmp(&a.name));
        Ok(files)
    }

    /// Text content of a Markdown entry.
    pub fn view(&self, name: &str) -> Result<String, Pdf2EbookError> {
        let path = self.existing(name)?;
        if !name.ends_with(".md") {
            return Err(Pdf2EbookError::PreviewUnsupported {
                name: name.to_string(),
            });
        }
        std::fs::read_to_string(&path).map_err(|e| Pdf2EbookError::io("read", path, e))
    }

    /// Delete the entry `name`.
    pub fn delete(&self, name: &str) -> Result<(), Pdf2EbookError> {
        let path = self.existing(name)?;
        std::fs::remove_file(&path).map_err(|e| Pdf2EbookError::io("delete", &path, e))?;
        info!("Deleted {}", path.display());
        Ok(())
    }

    fn existing(&self, name: &str) -> Result<PathBuf, Pdf2EbookError> {
        validate_name(name)?;
        let path = self.path_of(name);
        if !path.is_file() {
            return Err(Pdf2EbookError::FileNotFound { path });
        }
        Ok(path)
    }
}

/// `<prefix>_<YYYYmmdd_HHMMSS>` in local time; the stem of transient drafts
/// and extracted covers.
pub fn timestamped(prefix: &str) -> String {
    format!("{prefix}_{}", Local::now().format("%Y%m%d_%H%M%S"))
}

fn validate_name(name: &str) -> Result<(), Pdf2EbookError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\');
    if bad {
        return Err(Pdf2EbookError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, OutputStore) {
        let dir = TempDir::new().unwrap();
        let store = OutputStore::open(dir.path().join("outputs")).unwrap();
        (dir, store)
    }

    #[test]
    fn open_creates_directory() {
        let (_dir, store) = store();
        assert!(store.root().is_dir());
    }

    #[test]
    fn next_name_is_literal_when_free() {
        let (_dir, store) = store();
        assert_eq!(store.next_available_name("report", ".epub"), "report.epub");
    }

    #[test]
    fn next_name_skips_taken_suffixes() {
        let (_dir, store) = store();
        std::fs::write(store.path_of("report.epub"), b"x").unwrap();
        std::fs::write(store.path_of("report_1.epub"), b"x").unwrap();
        assert_eq!(store.next_available_name("report", ".epub"), "report_2.epub");
        // Deterministic: asking again without writing gives the same answer.
        assert_eq!(store.next_available_name("report", ".epub"), "report_2.epub");
    }

    #[test]
    fn next_name_ignores_other_extensions() {
        let (_dir, store) = store();
        std::fs::write(store.path_of("report.md"), b"x").unwrap();
        assert_eq!(store.next_available_name("report", ".epub"), "report.epub");
    }

    #[test]
    fn write_atomic_leaves_no_temp_file() {
        let (_dir, store) = store();
        let path = store.write_atomic("a.md", b"hello").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "hello");
        let names: Vec<String> = std::fs::read_dir(store.root())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.md".to_string()]);
    }

    #[test]
    fn list_reports_size_and_sorts_descending() {
        let (_dir, store) = store();
        store.write_atomic("a.md", b"12345").unwrap();
        store.write_atomic("b.epub", b"12").unwrap();
        let files = store.list().unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].name, "b.epub");
        assert_eq!(files[1].size, 5);
        assert!(files[1].to_string().starts_with("a.md (5 bytes) - "));
    }

    #[test]
    fn view_markdown_only() {
        let (_dir, store) = store();
        store.write_atomic("a.md", b"# Title").unwrap();
        store.write_atomic("a.epub", b"PK").unwrap();
        assert_eq!(store.view("a.md").unwrap(), "# Title");
        assert!(matches!(
            store.view("a.epub"),
            Err(Pdf2EbookError::PreviewUnsupported { .. })
        ));
        assert!(matches!(
            store.view("missing.md"),
            Err(Pdf2EbookError::FileNotFound { .. })
        ));
    }

    #[test]
    fn delete_removes_entry() {
        let (_dir, store) = store();
        store.write_atomic("a.md", b"x").unwrap();
        store.delete("a.md").unwrap();
        assert!(!store.contains("a.md"));
        assert!(store.delete("a.md").is_err());
    }

    #[test]
    fn timestamped_stem_shape() {
        let stem = timestamped("cover");
        assert!(stem.starts_with("cover_"));
        assert_eq!(stem.len(), "cover_".len() + "YYYYmmdd_HHMMSS".len());
    }

    #[test]
    fn rejects_path_traversal() {
        let (_dir, store) = store();
        assert!(matches!(
            store.delete("../secret"),
            Err(Pdf2EbookError::InvalidName { .. })
        ));
        assert!(store.write_atomic("sub/x.md", b"x").is_err());
    }
}
