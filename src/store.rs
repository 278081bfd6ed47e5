//! Persistent key-value settings
//!
//! Settings are stored at ~/.config/pstream/settings.toml as a flat
//! string-to-string table. `FileStore` reads the file once and serves
//! later reads from memory, so async callers do not hit the disk per call.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

/// Storage keys shared by the adapter and the settings service
pub mod keys {
    /// `"true"` enables mock mode; anything else disables it
    pub const MOCK_MODE: &str = "mock_mode";
    /// Persisted instance URL override
    pub const INSTANCE_URL: &str = "instance_url";
}

/// String-valued key-value storage
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// TOML-file backed store
pub struct FileStore {
    path: PathBuf,
    /// Loaded table; `None` until first access
    cache: Mutex<Option<BTreeMap<String, String>>>,
}

impl FileStore {
    /// Store at the default location (~/.config/pstream/settings.toml)
    pub fn new() -> Result<Self> {
        let path = Self::default_path().context("Could not determine config path")?;
        Ok(Self::at(path))
    }

    /// Store at an explicit path
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("pstream").join("settings.toml"))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// A missing file reads as empty. A corrupt file is an error, so a
    /// later write cannot silently discard its other keys.
    fn load(&self) -> Result<BTreeMap<String, String>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };

        toml::from_str(&content).map_err(|e| {
            warn!("Settings file {} is corrupt, leaving it untouched", self.path.display());
            anyhow::Error::new(e).context(format!("Failed to parse {}", self.path.display()))
        })
    }

    /// Lock the cache, loading the file on first use
    fn values(&self) -> Result<MutexGuard<'_, Option<BTreeMap<String, String>>>> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| anyhow::anyhow!("settings lock poisoned"))?;
        if cache.is_none() {
            *cache = Some(self.load()?);
        }
        Ok(cache)
    }

    fn save(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let toml = toml::to_string_pretty(values)?;
        std::fs::write(&self.path, toml)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let cache = self.values()?;
        Ok(cache.as_ref().and_then(|values| values.get(key).cloned()))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut cache = self.values()?;
        let mut values = cache.clone().unwrap_or_default();
        values.insert(key.to_string(), value.to_string());
        self.save(&values)?;
        *cache = Some(values);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut cache = self.values()?;
        let mut values = cache.clone().unwrap_or_default();
        if values.remove(key).is_some() {
            self.save(&values)?;
            *cache = Some(values);
        }
        Ok(())
    }
}

/// In-process store, used when nothing should touch disk
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self
            .values
            .lock()
            .map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .map_err(|_| anyhow::anyhow!("store lock poisoned"))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values
            .lock()
            .map_err(|_| anyhow::anyhow!("store lock poisoned"))?
            .remove(key);
        Ok(())
    }
}
