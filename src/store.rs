use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Flat-file collection store: one JSON array per file. Reads load the whole
/// file and writes replace it; mutations go through [`JsonStore::update`] so
/// the read-mutate-rewrite cycle is serialized per store.
pub struct JsonStore<T> {
    path: PathBuf,
    lock: Mutex<()>,
    _marker: PhantomData<T>,
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create data directory {}", parent.display())
            })?;
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
            _marker: PhantomData,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the whole collection. A missing or empty file reads as an empty
    /// collection.
    pub fn load(&self) -> anyhow::Result<Vec<T>> {
        let _guard = self.lock.lock().unwrap();
        self.read_unlocked()
    }

    /// Replaces the whole collection on disk.
    pub fn save(&self, items: &[T]) -> anyhow::Result<()> {
        let _guard = self.lock.lock().unwrap();
        self.write_unlocked(items)
    }

    /// Read-mutate-rewrite under the store lock. The closure's return value
    /// is handed back to the caller after the file has been replaced.
    pub fn update<R>(&self, mutate: impl FnOnce(&mut Vec<T>) -> R) -> anyhow::Result<R> {
        let _guard = self.lock.lock().unwrap();
        let mut items = self.read_unlocked()?;
        let result = mutate(&mut items);
        self.write_unlocked(&items)?;
        Ok(result)
    }

    fn read_unlocked(&self) -> anyhow::Result<Vec<T>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))
    }

    fn write_unlocked(&self, items: &[T]) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(items)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}
