//! File-backed storage with a locked directory.
//!
//! This module handles the file system layout for a craftsync store:
//!
//! ```text
//! <store_path>/
//! ├─ LOCK              # Advisory lock for single-process access
//! ├─ records/          # One file per record, keyed by ID
//! └─ queue/            # One file per pending queue item
//! ```
//!
//! The LOCK file ensures only one process opens a store at a time. Writes use
//! the write-to-temp, sync, atomic-rename pattern so a crash can never leave
//! a half-written value under a live key.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use parking_lot::Mutex;

use crate::backend::StorageBackend;
use crate::error::{StoreError, StoreResult};

const LOCK_FILE: &str = "LOCK";
const TEMP_SUFFIX: &str = ".tmp";

/// A persistent storage backend over a locked directory.
///
/// Each table is a subdirectory; each key is a file. Keys are restricted to
/// ASCII alphanumerics plus `-`, `_`, and `.`, which covers the UUID strings
/// and fixed names the layers above use.
///
/// # Thread Safety
///
/// Reads run concurrently; writes and removals serialize on an internal
/// mutex so two writers never race on the same temp file.
#[derive(Debug)]
pub struct FileBackend {
    root: PathBuf,
    write_lock: Mutex<()>,
    /// Lock file handle (held for exclusive access).
    _lock_file: File,
}

impl FileBackend {
    /// Opens or creates a store directory.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the store directory
    /// * `create_if_missing` - If true, creates the directory if absent
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another process holds the lock (returns [`StoreError::StoreLocked`])
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool) -> StoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(StoreError::invalid_layout(format!(
                    "store directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(StoreError::invalid_layout(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        // Acquire exclusive lock (non-blocking)
        let lock_path = path.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::StoreLocked);
        }

        Ok(Self {
            root: path.to_path_buf(),
            write_lock: Mutex::new(()),
            _lock_file: lock_file,
        })
    }

    /// Returns the path to the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    fn table_dir(&self, table: &str) -> StoreResult<PathBuf> {
        validate_name(table)?;
        Ok(self.root.join(table))
    }

    fn entry_path(&self, table: &str, key: &str) -> StoreResult<PathBuf> {
        validate_name(key)?;
        Ok(self.table_dir(table)?.join(key))
    }

    /// Fsyncs a directory so entry creations, renames, and deletions are
    /// durable. Windows NTFS journals metadata, so the explicit fsync is
    /// Unix-only.
    #[cfg(unix)]
    fn sync_dir(path: &Path) -> StoreResult<()> {
        let dir = File::open(path)?;
        dir.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_dir(_path: &Path) -> StoreResult<()> {
        Ok(())
    }
}

/// Table and key names become path components, so anything that could
/// escape the store directory or collide with bookkeeping files is refused.
fn validate_name(name: &str) -> StoreResult<()> {
    let ok = !name.is_empty()
        && name != "."
        && name != ".."
        && name != LOCK_FILE
        && !name.ends_with(TEMP_SUFFIX)
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(StoreError::invalid_key(name))
    }
}

impl StorageBackend for FileBackend {
    fn read(&self, table: &str, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.entry_path(table, key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, table: &str, key: &str, data: &[u8]) -> StoreResult<()> {
        let dir = self.table_dir(table)?;
        let path = self.entry_path(table, key)?;

        let _guard = self.write_lock.lock();
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
            Self::sync_dir(&self.root)?;
        }

        // Write to temp file, sync, then rename into place
        let temp_path = dir.join(format!("{key}{TEMP_SUFFIX}"));
        let mut file = File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &path)?;
        Self::sync_dir(&dir)?;
        Ok(())
    }

    fn remove(&self, table: &str, key: &str) -> StoreResult<()> {
        let dir = self.table_dir(table)?;
        let path = self.entry_path(table, key)?;

        let _guard = self.write_lock.lock();
        match fs::remove_file(&path) {
            Ok(()) => {
                Self::sync_dir(&dir)?;
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn scan(&self, table: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
        let dir = self.table_dir(table)?;
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            // Leftover temp files from a crash are not live values
            if name.ends_with(TEMP_SUFFIX) {
                continue;
            }
            if !entry.file_type()?.is_file() {
                continue;
            }
            let bytes = fs::read(entry.path())?;
            entries.push((name.to_string(), bytes));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_directory() {
        let temp = tempdir().unwrap();
        let store_path = temp.path().join("new_store");
        assert!(!store_path.exists());

        let backend = FileBackend::open(&store_path, true).unwrap();
        assert!(store_path.is_dir());
        drop(backend);
    }

    #[test]
    fn open_fails_if_not_exists_and_no_create() {
        let temp = tempdir().unwrap();
        let result = FileBackend::open(&temp.path().join("nonexistent"), false);
        assert!(matches!(result, Err(StoreError::InvalidLayout(_))));
    }

    #[test]
    fn lock_prevents_second_open() {
        let temp = tempdir().unwrap();
        let store_path = temp.path().join("locked");

        let _first = FileBackend::open(&store_path, true).unwrap();
        let result = FileBackend::open(&store_path, true);
        assert!(matches!(result, Err(StoreError::StoreLocked)));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();
        let store_path = temp.path().join("reopen");

        {
            let _backend = FileBackend::open(&store_path, true).unwrap();
        }
        let _second = FileBackend::open(&store_path, true).unwrap();
    }

    #[test]
    fn write_then_read() {
        let temp = tempdir().unwrap();
        let backend = FileBackend::open(temp.path(), true).unwrap();

        backend.write("records", "abc", b"payload").unwrap();
        assert_eq!(
            backend.read("records", "abc").unwrap(),
            Some(b"payload".to_vec())
        );
    }

    #[test]
    fn read_missing_is_none() {
        let temp = tempdir().unwrap();
        let backend = FileBackend::open(temp.path(), true).unwrap();
        assert_eq!(backend.read("records", "missing").unwrap(), None);
    }

    #[test]
    fn values_survive_reopen() {
        let temp = tempdir().unwrap();
        let store_path = temp.path().join("durable");

        {
            let backend = FileBackend::open(&store_path, true).unwrap();
            backend.write("records", "k1", b"v1").unwrap();
            backend.write("queue", "k2", b"v2").unwrap();
        }

        let backend = FileBackend::open(&store_path, true).unwrap();
        assert_eq!(backend.read("records", "k1").unwrap(), Some(b"v1".to_vec()));
        assert_eq!(backend.read("queue", "k2").unwrap(), Some(b"v2".to_vec()));
    }

    #[test]
    fn remove_is_idempotent() {
        let temp = tempdir().unwrap();
        let backend = FileBackend::open(temp.path(), true).unwrap();

        backend.write("t", "k", b"v").unwrap();
        backend.remove("t", "k").unwrap();
        assert_eq!(backend.read("t", "k").unwrap(), None);
        backend.remove("t", "k").unwrap();
        backend.remove("never", "seen").unwrap();
    }

    #[test]
    fn scan_orders_keys_and_skips_temp_files() {
        let temp = tempdir().unwrap();
        let backend = FileBackend::open(temp.path(), true).unwrap();

        backend.write("t", "b", b"2").unwrap();
        backend.write("t", "a", b"1").unwrap();
        // Simulate a crashed write
        fs::write(temp.path().join("t").join("c.tmp"), b"half").unwrap();

        let entries = backend.scan("t").unwrap();
        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn scan_of_missing_table_is_empty() {
        let temp = tempdir().unwrap();
        let backend = FileBackend::open(temp.path(), true).unwrap();
        assert!(backend.scan("nothing").unwrap().is_empty());
    }

    #[test]
    fn rejects_traversal_keys() {
        let temp = tempdir().unwrap();
        let backend = FileBackend::open(temp.path(), true).unwrap();

        assert!(matches!(
            backend.write("t", "../escape", b"x"),
            Err(StoreError::InvalidKey(_))
        ));
        assert!(matches!(
            backend.write("..", "k", b"x"),
            Err(StoreError::InvalidKey(_))
        ));
        assert!(matches!(
            backend.read("t", ""),
            Err(StoreError::InvalidKey(_))
        ));
        assert!(matches!(
            backend.write("t", "LOCK", b"x"),
            Err(StoreError::InvalidKey(_))
        ));
    }

    #[test]
    fn overwrite_replaces_value() {
        let temp = tempdir().unwrap();
        let backend = FileBackend::open(temp.path(), true).unwrap();

        backend.write("t", "k", b"old").unwrap();
        backend.write("t", "k", b"new").unwrap();
        assert_eq!(backend.read("t", "k").unwrap(), Some(b"new".to_vec()));
    }
}
