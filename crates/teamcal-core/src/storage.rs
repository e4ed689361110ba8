use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

const STORAGE_FILE_NAME: &str = "storage.json";

/// Synchronous string key-value space, the shape of a browser's local
/// storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    items: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(key: &str, value: &str) -> Self {
        let mut storage = Self::default();
        storage.items.insert(key.to_string(), value.to_string());
        storage
    }
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.items.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Key-value space persisted as one JSON object file inside a data
/// directory. Every `set` rewrites the file atomically.
#[derive(Debug)]
pub struct FileStorage {
    pub data_dir: PathBuf,
    pub path: PathBuf,
}

impl FileStorage {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let path = data_dir.join(STORAGE_FILE_NAME);
        info!(
            data_dir = %data_dir.display(),
            file = %path.display(),
            "opened file storage"
        );

        Ok(Self { data_dir, path })
    }

    fn read_items(&self) -> anyhow::Result<BTreeMap<String, String>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("failed reading {}", self.path.display()));
            }
        };

        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&raw).with_context(|| format!("failed parsing {}", self.path.display()))
    }
}

impl KeyValueStore for FileStorage {
    #[tracing::instrument(skip(self))]
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let items = self.read_items()?;
        debug!(file = %self.path.display(), found = items.contains_key(key), "storage get");
        Ok(items.get(key).cloned())
    }

    #[tracing::instrument(skip(self, value))]
    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut items = match self.read_items() {
            Ok(items) => items,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "storage file unreadable; starting over");
                BTreeMap::new()
            }
        };
        items.insert(key.to_string(), value.to_string());
        save_json_atomic(&self.path, &items).context("failed to save storage.json")
    }
}

#[tracing::instrument(skip(path, items))]
fn save_json_atomic(path: &Path, items: &BTreeMap<String, String>) -> anyhow::Result<()> {
    debug!(file = %path.display(), keys = items.len(), "saving storage atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    let serialized = serde_json::to_string_pretty(items)?;
    writeln!(temp, "{serialized}")?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
