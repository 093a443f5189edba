//! Stream checkpoint persistence.

use async_trait::async_trait;
use drbot_core::{Checkpoint, EventKind};
use drbot_error::{StorageError, StorageErrorKind, StorageResult};
use drbot_interface::{DocumentVersion, ForumClient};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Durable home of per-stream checkpoints.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the checkpoint of a stream, `None` if never saved.
    async fn load(&self, kind: EventKind) -> StorageResult<Option<Checkpoint>>;

    /// Persist the checkpoint of a stream.
    async fn save(&self, kind: EventKind, checkpoint: &Checkpoint) -> StorageResult<()>;
}

/// Checkpoints kept in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpointStore {
    checkpoints: Arc<Mutex<HashMap<EventKind, Checkpoint>>>,
}

impl MemoryCheckpointStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, kind: EventKind) -> StorageResult<Option<Checkpoint>> {
        Ok(self.checkpoints.lock().await.get(&kind).cloned())
    }

    async fn save(&self, kind: EventKind, checkpoint: &Checkpoint) -> StorageResult<()> {
        self.checkpoints
            .lock()
            .await
            .insert(kind, checkpoint.clone());
        Ok(())
    }
}

/// One remote document per stream at `<prefix>/checkpoints/<kind>`.
///
/// The host is the only writer of these documents, so a conflict is resolved
/// by taking the remote revision and writing again.
pub struct DocumentCheckpointStore {
    forum: Arc<dyn ForumClient>,
    prefix: String,
    dry_run: bool,
    versions: Mutex<HashMap<EventKind, Option<DocumentVersion>>>,
}

impl DocumentCheckpointStore {
    /// Create a store writing under `prefix`.
    pub fn new(forum: Arc<dyn ForumClient>, prefix: impl Into<String>, dry_run: bool) -> Self {
        Self {
            forum,
            prefix: prefix.into(),
            dry_run,
            versions: Mutex::new(HashMap::new()),
        }
    }

    fn path(&self, kind: EventKind) -> String {
        format!("{}/checkpoints/{}", self.prefix, kind.as_str())
    }

    async fn current_version(&self, kind: EventKind) -> StorageResult<Option<DocumentVersion>> {
        let document = self
            .forum
            .read_document(&self.path(kind))
            .await
            .map_err(|e| StorageError::new(StorageErrorKind::Backend(e.to_string())))?;
        Ok(document.map(|d| d.version))
    }
}

#[async_trait]
impl CheckpointStore for DocumentCheckpointStore {
    #[instrument(skip(self), fields(stream = %kind))]
    async fn load(&self, kind: EventKind) -> StorageResult<Option<Checkpoint>> {
        let document = self
            .forum
            .read_document(&self.path(kind))
            .await
            .map_err(|e| StorageError::new(StorageErrorKind::Backend(e.to_string())))?;
        let Some(document) = document else {
            self.versions.lock().await.insert(kind, None);
            return Ok(None);
        };
        self.versions
            .lock()
            .await
            .insert(kind, Some(document.version));
        if document.content.trim().is_empty() {
            return Ok(None);
        }
        let checkpoint = serde_json::from_str(&document.content)
            .map_err(|e| StorageError::new(StorageErrorKind::Deserialization(e.to_string())))?;
        Ok(Some(checkpoint))
    }

    #[instrument(skip(self, checkpoint), fields(stream = %kind))]
    async fn save(&self, kind: EventKind, checkpoint: &Checkpoint) -> StorageResult<()> {
        let content = serde_json::to_string(checkpoint)
            .map_err(|e| StorageError::new(StorageErrorKind::Serialization(e.to_string())))?;
        if self.dry_run {
            debug!("[DRY RUN] would have saved checkpoint");
            return Ok(());
        }

        let path = self.path(kind);
        let mut versions = self.versions.lock().await;
        let expected = match versions.get(&kind) {
            Some(version) => *version,
            None => self.current_version(kind).await?,
        };

        let written = match self.forum.write_document(&path, &content, expected).await {
            Ok(version) => version,
            Err(e) if e.is_conflict() => {
                debug!(error = %e, "Checkpoint revision moved; overwriting");
                let latest = self.current_version(kind).await?;
                self.forum
                    .write_document(&path, &content, latest)
                    .await
                    .map_err(|e| StorageError::new(StorageErrorKind::Backend(e.to_string())))?
            }
            Err(e) => return Err(StorageError::new(StorageErrorKind::Backend(e.to_string()))),
        };
        versions.insert(kind, Some(written));
        Ok(())
    }
}

/// All checkpoints in one local JSON file, keyed by stream kind.
#[derive(Debug, Clone)]
pub struct JsonFileCheckpointStore {
    file_path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl JsonFileCheckpointStore {
    /// Create a store backed by `file_path`.
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    async fn read_all(&self) -> StorageResult<BTreeMap<EventKind, Checkpoint>> {
        if !tokio::fs::try_exists(&self.file_path).await? {
            return Ok(BTreeMap::new());
        }
        let json = tokio::fs::read_to_string(&self.file_path).await?;
        if json.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&json)
            .map_err(|e| StorageError::new(StorageErrorKind::Deserialization(e.to_string())))
    }
}

#[async_trait]
impl CheckpointStore for JsonFileCheckpointStore {
    #[instrument(skip(self), fields(stream = %kind, path = ?self.file_path))]
    async fn load(&self, kind: EventKind) -> StorageResult<Option<Checkpoint>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.remove(&kind))
    }

    #[instrument(skip(self, checkpoint), fields(stream = %kind, path = ?self.file_path))]
    async fn save(&self, kind: EventKind, checkpoint: &Checkpoint) -> StorageResult<()> {
        let _guard = self.lock.lock().await;
        let mut all = self.read_all().await?;
        all.insert(kind, checkpoint.clone());
        let json = serde_json::to_string_pretty(&all)
            .map_err(|e| StorageError::new(StorageErrorKind::Serialization(e.to_string())))?;
        if let Some(parent) = self.file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.file_path, json).await?;
        debug!("Checkpoint saved");
        Ok(())
    }
}
