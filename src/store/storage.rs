//! Durable key-value storage: one JSON document per collection key.
//!
//! The storage is a shared mutable resource with no locking primitive.
//! Every collection is read wholesale and written wholesale; concurrent
//! writers follow last-writer-wins. `subscribe` delivers the keys of
//! mutations observed to originate outside the current process.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::StepflowError;

/// The five tracked collection keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    SavedTestFlows,
    TestReports,
    ScheduledTests,
    ActiveRunningTests,
    UserSettings,
}

impl StorageKey {
    pub const ALL: [StorageKey; 5] = [
        StorageKey::SavedTestFlows,
        StorageKey::TestReports,
        StorageKey::ScheduledTests,
        StorageKey::ActiveRunningTests,
        StorageKey::UserSettings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::SavedTestFlows => "savedTestFlows",
            StorageKey::TestReports => "testReports",
            StorageKey::ScheduledTests => "scheduledTests",
            StorageKey::ActiveRunningTests => "activeRunningTests",
            StorageKey::UserSettings => "userSettings",
        }
    }

    fn from_file_stem(stem: &str) -> Option<StorageKey> {
        StorageKey::ALL.into_iter().find(|k| k.as_str() == stem)
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait StorageBackend: Send + Sync {
    fn read(&self, key: StorageKey) -> Result<Option<Value>, StepflowError>;

    fn write(&self, key: StorageKey, value: &Value) -> Result<(), StepflowError>;

    /// Change notifications for mutations made by other processes.
    fn subscribe(&self) -> broadcast::Receiver<StorageKey>;
}

/// Window inside which a file event is attributed to this process's own
/// write rather than to an external one.
const SELF_WRITE_GRACE: Duration = Duration::from_millis(500);

/// File-backed storage: `<dir>/<key>.json`, with a filesystem watcher
/// mapping external file changes back to keys.
pub struct FileStorage {
    dir: PathBuf,
    changes: broadcast::Sender<StorageKey>,
    recent_writes: Arc<Mutex<HashMap<StorageKey, Instant>>>,
    // Kept alive for the lifetime of the storage.
    _watcher: RecommendedWatcher,
}

impl FileStorage {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StepflowError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            StepflowError::persistence(format!(
                "cannot create state directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let (changes, _) = broadcast::channel(64);
        let recent_writes: Arc<Mutex<HashMap<StorageKey, Instant>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let watcher = Self::spawn_watcher(&dir, changes.clone(), recent_writes.clone())?;

        Ok(Self {
            dir,
            changes,
            recent_writes,
            _watcher: watcher,
        })
    }

    fn spawn_watcher(
        dir: &Path,
        changes: broadcast::Sender<StorageKey>,
        recent_writes: Arc<Mutex<HashMap<StorageKey, Instant>>>,
    ) -> Result<RecommendedWatcher, StepflowError> {
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    log::warn!("storage watcher error: {}", e);
                    return;
                }
            };
            for path in &event.paths {
                let key = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(StorageKey::from_file_stem);
                let key = match key {
                    Some(key) => key,
                    None => continue,
                };

                // A change right after our own write is an echo of that
                // write, not another process mutating the store.
                let own_write = recent_writes
                    .lock()
                    .unwrap()
                    .get(&key)
                    .map(|at| at.elapsed() < SELF_WRITE_GRACE)
                    .unwrap_or(false);
                if own_write {
                    continue;
                }

                let _ = changes.send(key);
            }
        })
        .map_err(|e| StepflowError::persistence(format!("cannot start storage watcher: {}", e)))?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| {
                StepflowError::persistence(format!(
                    "cannot watch state directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;

        Ok(watcher)
    }

    fn path_for(&self, key: StorageKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.as_str()))
    }
}

impl StorageBackend for FileStorage {
    fn read(&self, key: StorageKey) -> Result<Option<Value>, StepflowError> {
        let path = self.path_for(key);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StepflowError::persistence(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        let value = serde_json::from_str(&raw).map_err(|e| {
            StepflowError::persistence(format!("corrupt document {}: {}", path.display(), e))
        })?;
        Ok(Some(value))
    }

    fn write(&self, key: StorageKey, value: &Value) -> Result<(), StepflowError> {
        let path = self.path_for(key);
        self.recent_writes
            .lock()
            .unwrap()
            .insert(key, Instant::now());

        let json = serde_json::to_string_pretty(value)
            .map_err(|e| StepflowError::persistence(format!("cannot serialize {}: {}", key, e)))?;
        std::fs::write(&path, json).map_err(|e| {
            StepflowError::persistence(format!("cannot write {}: {}", path.display(), e))
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageKey> {
        self.changes.subscribe()
    }
}

/// In-memory storage for tests and ephemeral runs. Own writes never show
/// up on the change channel; `inject_external` simulates another process
/// mutating a key.
pub struct MemoryStorage {
    docs: Mutex<HashMap<StorageKey, Value>>,
    changes: broadcast::Sender<StorageKey>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            docs: Mutex::new(HashMap::new()),
            changes,
        }
    }

    /// Overwrite a document as another process would, then signal the key.
    pub fn inject_external(&self, key: StorageKey, value: Value) {
        self.docs.lock().unwrap().insert(key, value);
        let _ = self.changes.send(key);
    }

    pub fn document(&self, key: StorageKey) -> Option<Value> {
        self.docs.lock().unwrap().get(&key).cloned()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for MemoryStorage {
    fn read(&self, key: StorageKey) -> Result<Option<Value>, StepflowError> {
        Ok(self.docs.lock().unwrap().get(&key).cloned())
    }

    fn write(&self, key: StorageKey, value: &Value) -> Result<(), StepflowError> {
        self.docs.lock().unwrap().insert(key, value.clone());
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageKey> {
        self.changes.subscribe()
    }
}
