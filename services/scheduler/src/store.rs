//! Persistence for the node registry.
//!
//! The scheduler loads the registry once at startup and saves it after
//! every handled event. Recovery after a crash between a decision and its
//! save is handled by reconciliation, not by the store.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::debug;

use crate::registry::NodeRegistry;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid state document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Load/save of the whole node collection.
pub trait NodeStore {
    fn load(&self) -> Result<NodeRegistry, StoreError>;

    fn save(&self, registry: &NodeRegistry) -> Result<(), StoreError>;
}

/// Stores the registry as one JSON document.
///
/// Saves write a sibling temp file and rename it over the target, so a
/// crash mid-save leaves the previous document intact.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, path: &Path, source: io::Error) -> StoreError {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl NodeStore for JsonFileStore {
    fn load(&self) -> Result<NodeRegistry, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No state file, starting empty");
                return Ok(NodeRegistry::default());
            }
            Err(e) => return Err(self.io_error(&self.path, e)),
        };

        let registry: NodeRegistry = serde_json::from_slice(&bytes)?;
        debug!(
            path = %self.path.display(),
            nodes = registry.len(),
            "State loaded"
        );
        Ok(registry)
    }

    fn save(&self, registry: &NodeRegistry) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(registry)?;
        let temp = self.temp_path();

        fs::write(&temp, &bytes).map_err(|e| self.io_error(&temp, e))?;
        fs::rename(&temp, &self.path).map_err(|e| self.io_error(&self.path, e))?;
        Ok(())
    }
}

/// In-memory store.
///
/// Clones share the saved snapshot, so a test can keep a handle and watch
/// what the scheduler persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    registry: NodeRegistry,
    saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose first load returns `registry`.
    pub fn with_registry(registry: NodeRegistry) -> Self {
        let store = Self::default();
        store.lock().registry = registry;
        store
    }

    /// The last saved registry.
    pub fn snapshot(&self) -> NodeRegistry {
        self.lock().registry.clone()
    }

    pub fn saves(&self) -> usize {
        self.lock().saves
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl NodeStore for MemoryStore {
    fn load(&self) -> Result<NodeRegistry, StoreError> {
        Ok(self.lock().registry.clone())
    }

    fn save(&self, registry: &NodeRegistry) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.registry = registry.clone();
        state.saves += 1;
        Ok(())
    }
}
