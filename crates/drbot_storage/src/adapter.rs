//! Storage adapter: namespace registry and optimistic-concurrency flush.

use crate::document::{parse_document, render_document};
use crate::namespace::{Namespace, NamespaceState};
use crate::{FORMAT_VERSION, META_NAMESPACE, StorageConfig};
use drbot_error::{StorageError, StorageErrorKind, StorageResult};
use drbot_interface::{DocumentVersion, ForumClient};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// What a successful flush did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Document written at the given revision after `attempts` conditional writes
    Written {
        /// New remote revision
        version: DocumentVersion,
        /// Conditional writes made
        attempts: u32,
    },
    /// Serialized content equals what the remote already holds
    Unchanged,
    /// Dry-run mode; nothing written
    DryRun,
}

/// Result of flushing every namespace.
#[derive(Debug, Default)]
pub struct FlushSummary {
    /// Namespaces written
    pub written: Vec<String>,
    /// Namespaces that failed, with the error
    pub failed: Vec<(String, StorageError)>,
}

impl FlushSummary {
    /// Whether every namespace flushed.
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Owns every namespace and persists them through the forum's documents.
///
/// One remote document per namespace, at `<prefix>/<name>`. The local copy is
/// authoritative between flushes; on a write conflict the remote copy wins and
/// buffered mutations are replayed on top of it.
pub struct StorageAdapter {
    forum: Arc<dyn ForumClient>,
    config: StorageConfig,
    namespaces: RwLock<HashMap<String, Arc<Mutex<NamespaceState>>>>,
}

impl std::fmt::Debug for StorageAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageAdapter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl StorageAdapter {
    /// Create an adapter writing through `forum`.
    pub fn new(forum: Arc<dyn ForumClient>, config: StorageConfig) -> Self {
        Self {
            forum,
            config,
            namespaces: RwLock::new(HashMap::new()),
        }
    }

    /// Adapter configuration.
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Open (loading on first use) the namespace for a Botling.
    ///
    /// Fails with `ReservedNamespace` for host-reserved names.
    #[tracing::instrument(skip(self))]
    pub async fn open(&self, name: &str) -> StorageResult<Namespace> {
        if name == META_NAMESPACE {
            return Err(StorageError::new(StorageErrorKind::ReservedNamespace(
                name.to_string(),
            )));
        }
        self.open_unchecked(name).await
    }

    async fn open_unchecked(&self, name: &str) -> StorageResult<Namespace> {
        if let Some(state) = self.namespaces.read().await.get(name) {
            return Ok(Namespace::new(name.to_string(), state.clone()));
        }

        let path = self.config.document_path(name);
        let mut state = NamespaceState::default();
        if let Some(document) = self
            .forum
            .read_document(&path)
            .await
            .map_err(|e| StorageError::new(StorageErrorKind::Backend(e.to_string())))?
        {
            state.data = parse_document(&document.content)?;
            state.base_version = Some(document.version);
            state.last_synced = Some(document.content);
            tracing::debug!(namespace = name, keys = state.data.len(), "Loaded namespace");
        } else {
            tracing::debug!(namespace = name, "No stored document; starting empty");
        }

        let mut namespaces = self.namespaces.write().await;
        let state = namespaces
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(state)))
            .clone();
        Ok(Namespace::new(name.to_string(), state))
    }

    /// Load the host's meta namespace, stamping the format version if absent.
    #[tracing::instrument(skip(self))]
    pub async fn load_meta(&self) -> StorageResult<Namespace> {
        let meta = self.open_unchecked(META_NAMESPACE).await?;
        match meta.get::<String>("version").await? {
            Some(version) => tracing::debug!(%version, "Storage format version"),
            None => meta.set("version", &FORMAT_VERSION).await?,
        }
        Ok(meta)
    }

    /// Drop an open namespace without flushing it.
    ///
    /// Returns whether it was open.
    pub async fn close(&self, name: &str) -> bool {
        let closed = self.namespaces.write().await.remove(name).is_some();
        if closed {
            tracing::debug!(namespace = name, "Closed namespace");
        }
        closed
    }

    /// Names of every open namespace.
    pub async fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.namespaces.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Persist one namespace.
    ///
    /// Conflicts trigger a re-read, replay of buffered mutations and another
    /// conditional write, up to `conflict_retries` times. On any failure the
    /// local state is kept and the namespace is flagged unsynced.
    #[tracing::instrument(skip(self), fields(namespace = name))]
    pub async fn flush(&self, name: &str) -> StorageResult<FlushOutcome> {
        let state = self
            .namespaces
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::new(StorageErrorKind::UnknownNamespace(name.to_string())))?;
        let mut state = state.lock().await;

        let result = self.flush_locked(name, &mut state).await;
        if let Err(e) = &result {
            state.unsynced = true;
            tracing::error!(error = %e, pending = state.pending.len(), "Flush failed; keeping local state");
        }
        result
    }

    async fn flush_locked(
        &self,
        name: &str,
        state: &mut NamespaceState,
    ) -> StorageResult<FlushOutcome> {
        let path = self.config.document_path(name);
        let max_retries = self.config.conflict_retries();
        let mut attempts = 0u32;

        loop {
            let content = render_document(self.config.banner(), &state.data)?;
            if content.len() > *self.config.max_document_bytes() {
                tracing::debug!(content = %content, "Oversized document");
                return Err(StorageError::new(StorageErrorKind::Capacity {
                    namespace: name.to_string(),
                    size: content.len(),
                    limit: *self.config.max_document_bytes(),
                }));
            }

            if attempts == 0 {
                self.backup(name, &content).await;
            }

            if state.last_synced.as_deref() == Some(content.as_str()) {
                tracing::debug!("Content unchanged; skipping write");
                state.mark_synced(content, None);
                return Ok(FlushOutcome::Unchanged);
            }

            if *self.config.dry_run() {
                tracing::info!(bytes = content.len(), "[DRY RUN] would have written namespace");
                state.mark_synced(content, None);
                return Ok(FlushOutcome::DryRun);
            }

            attempts += 1;
            match self
                .forum
                .write_document(&path, &content, state.base_version)
                .await
            {
                Ok(version) => {
                    tracing::info!(%version, attempts, "Namespace written");
                    state.mark_synced(content, Some(version));
                    return Ok(FlushOutcome::Written { version, attempts });
                }
                Err(e) if e.is_conflict() => {
                    if attempts > *max_retries {
                        return Err(StorageError::new(StorageErrorKind::Conflict {
                            namespace: name.to_string(),
                            attempts,
                        }));
                    }
                    tracing::warn!(attempts, error = %e, "Write conflict; re-reading remote");
                    self.refresh(&path, state).await?;
                }
                Err(e) => {
                    return Err(StorageError::new(StorageErrorKind::Backend(e.to_string())));
                }
            }
        }
    }

    async fn refresh(&self, path: &str, state: &mut NamespaceState) -> StorageResult<()> {
        let fresh = self
            .forum
            .read_document(path)
            .await
            .map_err(|e| StorageError::new(StorageErrorKind::Backend(e.to_string())))?;
        match fresh {
            Some(document) => {
                let remote = parse_document(&document.content)?;
                state.rebase(remote, Some(document.version));
                state.last_synced = Some(document.content);
            }
            None => {
                state.rebase(Map::<String, Value>::new(), None);
                state.last_synced = None;
            }
        }
        Ok(())
    }

    async fn backup(&self, name: &str, content: &str) {
        let Some(dir) = self.config.backup_dir() else {
            return;
        };
        let path = dir.join(format!("{}.json", name));
        let result = async {
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(&path, content).await
        }
        .await;
        match result {
            Ok(()) => tracing::debug!(path = %path.display(), "Wrote local backup"),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Local backup failed"),
        }
    }

    /// Persist every open namespace; failures are collected, not short-circuited.
    #[tracing::instrument(skip(self))]
    pub async fn flush_all(&self) -> FlushSummary {
        let mut summary = FlushSummary::default();
        for name in self.namespaces().await {
            match self.flush(&name).await {
                Ok(FlushOutcome::Written { .. }) => summary.written.push(name),
                Ok(_) => {}
                Err(e) => summary.failed.push((name, e)),
            }
        }
        summary
    }
}
