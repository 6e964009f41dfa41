//! Atomic JSON file operations.
//!
//! Writes go to a temporary sibling file that is fsynced and renamed over the
//! target, so readers never observe a half-written file. Read-modify-write
//! cycles hold an exclusive lock on a `.lock` sibling.

use devai_core::{ChatError, Result};
use fs2::FileExt;
use serde::{Serialize, de::DeserializeOwned};
use std::fs::{self, File, OpenOptions};
use std::io::Write as IoWrite;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// A handle to a JSON file updated atomically.
pub struct AtomicJsonFile<T> {
    path: PathBuf,
    _phantom: PhantomData<T>,
}

impl<T> AtomicJsonFile<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _phantom: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads and deserializes the file.
    ///
    /// Returns `Ok(None)` when the file does not exist or is empty.
    pub fn load(&self) -> Result<Option<T>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Serializes `data` and replaces the file atomically.
    pub fn save(&self, data: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(data)?;

        let tmp_path = self.temp_path()?;
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(json.as_bytes())?;
        tmp_file.sync_all()?;
        drop(tmp_file);

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Loads the current value (or `default_value`), applies `f` and saves the
    /// result, all under the file lock. Returns what `f` returned.
    pub fn update<F, R>(&self, default_value: T, f: F) -> Result<R>
    where
        F: FnOnce(&mut T) -> R,
    {
        let _lock = FileLock::acquire(&self.path)?;

        let mut data = self.load()?.unwrap_or(default_value);
        let output = f(&mut data);
        self.save(&data)?;

        Ok(output)
    }

    fn temp_path(&self) -> Result<PathBuf> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| ChatError::io("Path has no parent directory"))?;
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| ChatError::io("Path has no file name"))?;

        Ok(parent.join(format!(".{}.tmp", file_name.to_string_lossy())))
    }
}

/// Exclusive lock guard, released on drop.
struct FileLock {
    file: File,
    lock_path: PathBuf,
}

impl FileLock {
    fn acquire(path: &Path) -> Result<Self> {
        let lock_path = path.with_extension("lock");
        if let Some(parent) = lock_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        FileExt::lock_exclusive(&file)
            .map_err(|e| ChatError::io(format!("Failed to acquire lock: {}", e)))?;

        Ok(Self { file, lock_path })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        let _ = fs::remove_file(&self.lock_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Counter {
        name: String,
        count: u32,
    }

    #[test]
    fn test_load_nonexistent_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = AtomicJsonFile::<Counter>::new(temp_dir.path().join("missing.json"));
        assert!(file.load().unwrap().is_none());
    }

    #[test]
    fn test_update_creates_then_modifies() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("counter.json");
        let file = AtomicJsonFile::<Counter>::new(path.clone());
        let default_value = Counter {
            name: "c".to_string(),
            count: 0,
        };

        let after = file
            .update(default_value.clone(), |c| {
                c.count += 10;
                c.count
            })
            .unwrap();
        assert_eq!(after, 10);

        file.update(default_value, |c| c.count += 5).unwrap();
        assert_eq!(file.load().unwrap().unwrap().count, 15);

        assert!(!temp_dir.path().join("nested").join(".counter.json.tmp").exists());
        assert!(!path.with_extension("lock").exists());
    }

    #[test]
    fn test_lock_is_released_after_update() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("counter.json");
        let file = AtomicJsonFile::<Counter>::new(path.clone());
        let default = || Counter {
            name: "c".to_string(),
            count: 0,
        };

        file.update(default(), |c| c.count += 1).unwrap();
        assert!(!path.with_extension("lock").exists());

        // A fresh lock on the same path must not block.
        let lock = FileLock::acquire(&path).unwrap();
        drop(lock);
        file.update(default(), |c| c.count += 1).unwrap();
        assert_eq!(file.load().unwrap().unwrap().count, 2);
    }

    #[test]
    fn test_corrupt_file_is_a_serialization_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();

        let err = AtomicJsonFile::<Counter>::new(path).load().unwrap_err();
        assert!(matches!(err, ChatError::Serialization { .. }));
    }
}
