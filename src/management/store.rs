use std::{collections::HashMap, path::PathBuf, sync::Mutex};

use async_trait::async_trait;
use tracing::warn;

use crate::error::{Error, Result};

/// Client-local key/value persistence.
///
/// Grouped writes (`set_many`, `remove_many`) must be applied as a unit:
/// readers observe either all of the entries or none of them.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// # Errors
    ///
    /// [`Error::Storage`] when the backing storage cannot be read, or
    /// [`Error::Json`] when its contents no longer parse.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Writes every entry, replacing existing values.
    ///
    /// # Arguments
    ///
    /// * `entries` - Key/value pairs applied together
    ///
    /// # Errors
    ///
    /// [`Error::Storage`] when the write cannot be persisted. Nothing is
    /// applied in that case.
    ///
    /// # Example
    ///
    /// ```
    /// store
    ///     .set_many(&[("a", "1".to_string()), ("b", "2".to_string())])
    ///     .await?;
    /// ```
    async fn set_many(&self, entries: &[(&str, String)]) -> Result<()>;

    /// Removes every key. Missing keys are not an error.
    async fn remove_many(&self, keys: &[&str]) -> Result<()>;

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.set_many(&[(key, value)]).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.remove_many(&[key]).await
    }
}

/// JSON map persisted in the local data directory.
///
/// Every write rewrites the whole map into a temporary file and renames it
/// over the previous one.
pub struct FileStore {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: tokio::sync::Mutex::new(()),
        }
    }

    /// `<data_local_dir>/dashtune/store.json`, next to the `.env` file.
    pub fn default_path() -> PathBuf {
        let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("dashtune/store.json");
        path
    }

    async fn read_map(&self) -> Result<HashMap<String, String>> {
        match async_fs::read_to_string(&self.path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(Error::Storage(e.to_string())),
        }
    }

    /// Map that a write starts from. A file that no longer parses is
    /// discarded so the write replaces it.
    async fn writable_map(&self) -> Result<HashMap<String, String>> {
        match self.read_map().await {
            Err(Error::Json(e)) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Store file is corrupt, starting from an empty map"
                );
                Ok(HashMap::new())
            }
            other => other,
        }
    }

    async fn write_map(&self, map: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            async_fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Storage(e.to_string()))?;
        }

        let json = serde_json::to_string_pretty(map)?;
        let tmp = self.path.with_extension("json.tmp");
        async_fs::write(&tmp, json)
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;
        async_fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| Error::Storage(e.to_string()))
    }
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new(Self::default_path())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_map().await?.remove(key))
    }

    async fn set_many(&self, entries: &[(&str, String)]) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.writable_map().await?;
        for (key, value) in entries {
            map.insert((*key).to_string(), value.clone());
        }
        self.write_map(&map).await
    }

    async fn remove_many(&self, keys: &[&str]) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.writable_map().await?;
        let before = map.len();
        for key in keys {
            map.remove(*key);
        }
        if map.len() == before {
            return Ok(());
        }
        self.write_map(&map).await
    }
}

/// In-process store, used by tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.contains_key(key))
            .unwrap_or(false)
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| Error::Storage("memory store poisoned".to_string()))
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries()?.get(key).cloned())
    }

    async fn set_many(&self, entries: &[(&str, String)]) -> Result<()> {
        let mut map = self.entries()?;
        for (key, value) in entries {
            map.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    async fn remove_many(&self, keys: &[&str]) -> Result<()> {
        let mut map = self.entries()?;
        for key in keys {
            map.remove(*key);
        }
        Ok(())
    }
}
