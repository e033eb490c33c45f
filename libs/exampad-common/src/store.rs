use crate::config::ExamConfig;
use crate::types::Language;
use redis::Commands;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Durable key-value semantics - defines only the key layout, not runtime logic.
/// Every editor instance reading the same question must derive the same keys,
/// so the format is fixed.

pub const CODE_PREFIX: &str = "exam_code";
pub const LAST_LANGUAGE_KEY: &str = "exam_language";

/// Key holding the saved buffer for one question/language pair
pub fn code_key(question_id: &str, language: &Language) -> String {
    format!("{}_{}_{}", CODE_PREFIX, question_id, language)
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// String-to-string store that outlives the editor session.
///
/// Writes are last-write-wins snapshots; there is no delete.
pub trait KvStore: Send {
    fn get(&mut self, key: &str) -> StoreResult<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> StoreResult<()>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvStore for MemoryStore {
    fn get(&mut self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> StoreResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// JSON object on disk, rewritten in full on every `set`.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), entries = entries.len(), "Opened file store");
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl KvStore for FileStore {
    fn get(&mut self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> StoreResult<()> {
        if self.entries.get(key).map(String::as_str) == Some(value) {
            return Ok(());
        }
        self.entries.insert(key.to_string(), value.to_string());
        self.flush()
    }
}

/// Shared store for several machines editing the same questions.
pub struct RedisStore {
    conn: redis::Connection,
}

impl RedisStore {
    pub fn connect(url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection()?;
        Ok(Self { conn })
    }
}

impl KvStore for RedisStore {
    fn get(&mut self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.conn.get(key)?)
    }

    fn set(&mut self, key: &str, value: &str) -> StoreResult<()> {
        let _: () = self.conn.set(key, value)?;
        Ok(())
    }
}

/// Pick the backend named by the configuration: Redis when a URL is set,
/// otherwise the JSON file.
pub fn open_store(config: &ExamConfig) -> StoreResult<Box<dyn KvStore>> {
    match &config.redis_url {
        Some(url) => {
            let store = RedisStore::connect(url)?;
            info!(url = %url, "Using Redis store");
            Ok(Box::new(store))
        }
        None => {
            let store = FileStore::open(&config.store_path)?;
            info!(path = %config.store_path.display(), "Using file store");
            Ok(Box::new(store))
        }
    }
}
