//! Per-Botling key-value namespace.

use drbot_error::{StorageError, StorageErrorKind, StorageResult};
use drbot_interface::DocumentVersion;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Mutable state behind one namespace.
#[derive(Debug, Default)]
pub(crate) struct NamespaceState {
    /// Local view, authoritative between flushes
    pub(crate) data: Map<String, Value>,
    /// Remote revision the local view is based on
    pub(crate) base_version: Option<DocumentVersion>,
    /// Mutations since the last successful sync (`None` = removed)
    pub(crate) pending: BTreeMap<String, Option<Value>>,
    /// Last flush failed; local state holds writes the remote lacks
    pub(crate) unsynced: bool,
    /// Document text last read from or written to the remote
    pub(crate) last_synced: Option<String>,
}

impl NamespaceState {
    /// Replay buffered mutations on top of `base`.
    pub(crate) fn rebase(&mut self, mut base: Map<String, Value>, version: Option<DocumentVersion>) {
        for (key, value) in &self.pending {
            match value {
                Some(value) => {
                    base.insert(key.clone(), value.clone());
                }
                None => {
                    base.remove(key);
                }
            }
        }
        self.data = base;
        self.base_version = version;
    }

    pub(crate) fn mark_synced(&mut self, content: String, version: Option<DocumentVersion>) {
        self.pending.clear();
        self.unsynced = false;
        self.last_synced = Some(content);
        if version.is_some() {
            self.base_version = version;
        }
    }
}

/// Handle to one Botling's storage partition.
///
/// Reads see the Botling's own writes immediately. Handles are cheap to
/// clone; clones share the same state.
#[derive(Debug, Clone)]
pub struct Namespace {
    name: String,
    state: Arc<Mutex<NamespaceState>>,
}

impl Namespace {
    pub(crate) fn new(name: String, state: Arc<Mutex<NamespaceState>>) -> Self {
        Self { name, state }
    }

    /// Namespace name (the owning Botling's name).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw JSON value under `key`.
    pub async fn get_value(&self, key: &str) -> Option<Value> {
        self.state.lock().await.data.get(key).cloned()
    }

    /// Value under `key`, decoded.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        match self.get_value(key).await {
            Some(value) => serde_json::from_value(value).map(Some).map_err(|e| {
                StorageError::new(StorageErrorKind::Deserialization(format!(
                    "{}/{}: {}",
                    self.name, key, e
                )))
            }),
            None => Ok(None),
        }
    }

    /// Store `value` under `key`; persisted on the next flush.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> StorageResult<()> {
        let value = serde_json::to_value(value).map_err(|e| {
            StorageError::new(StorageErrorKind::Serialization(format!(
                "{}/{}: {}",
                self.name, key, e
            )))
        })?;
        let mut state = self.state.lock().await;
        state.data.insert(key.to_string(), value.clone());
        state.pending.insert(key.to_string(), Some(value));
        Ok(())
    }

    /// Remove `key`, returning whether it was present.
    pub async fn remove(&self, key: &str) -> bool {
        let mut state = self.state.lock().await;
        let existed = state.data.remove(key).is_some();
        state.pending.insert(key.to_string(), None);
        existed
    }

    /// All keys currently present.
    pub async fn keys(&self) -> Vec<String> {
        self.state.lock().await.data.keys().cloned().collect()
    }

    /// Whether a previous flush failed and buffered writes await a retry.
    pub async fn is_unsynced(&self) -> bool {
        self.state.lock().await.unsynced
    }

    /// Whether there are writes not yet persisted.
    pub async fn has_pending(&self) -> bool {
        !self.state.lock().await.pending.is_empty()
    }
}
