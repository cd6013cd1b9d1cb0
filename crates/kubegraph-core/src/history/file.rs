use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

use crate::config::StorageConfig;

use super::error::StorageError;
use super::{SnapshotRecord, SnapshotRef, SnapshotStore, TimeRange};

const REF_SUFFIX: &str = ".ref.json";

/// File-based snapshot storage.
///
/// ```text
/// .kubegraph/snapshots/
///   {snapshot-id}.json       # full SnapshotRecord
///   {snapshot-id}.ref.json   # SnapshotRef used for listing
/// ```
///
/// Files are written to a temporary name and renamed into place, the record
/// before its ref. Listing reads only the ref files; a record without one is
/// read in full instead. After each save the oldest snapshots beyond
/// `max_snapshots` are removed.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
    max_snapshots: usize,
}

impl FileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>, max_snapshots: usize) -> Self {
        Self {
            dir: dir.into(),
            max_snapshots,
        }
    }

    pub fn with_config(config: &StorageConfig) -> Self {
        Self::new(config.snapshots_path(), config.max_snapshots)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_file(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    fn ref_file(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{}{}", id, REF_SUFFIX))
    }

    async fn ensure_dir(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StorageError::io(&self.dir, e))
    }

    async fn read_record(path: &Path) -> Result<SnapshotRecord, StorageError> {
        let json = fs::read(path).await.map_err(|e| StorageError::io(path, e))?;
        Ok(serde_json::from_slice(&json)?)
    }

    async fn read_ref(path: &Path) -> Result<SnapshotRef, StorageError> {
        let json = fs::read(path).await.map_err(|e| StorageError::io(path, e))?;
        Ok(serde_json::from_slice(&json)?)
    }

    async fn write_atomic(&self, path: &Path, json: Vec<u8>) -> Result<(), StorageError> {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("snapshot");
        let tmp = self.dir.join(format!(".{}.tmp", name));
        fs::write(&tmp, json).await.map_err(|e| StorageError::io(&tmp, e))?;
        fs::rename(&tmp, path).await.map_err(|e| StorageError::io(path, e))
    }

    /// Every readable record reference, oldest first.
    async fn all_refs(&self) -> Result<Vec<SnapshotRef>, StorageError> {
        if !fs::try_exists(&self.dir).await.unwrap_or(false) {
            return Ok(Vec::new());
        }

        let mut records = BTreeSet::new();
        let mut ref_files = BTreeMap::new();
        let mut entries = fs::read_dir(&self.dir).await.map_err(|e| StorageError::io(&self.dir, e))?;
        while let Some(entry) = entries.next_entry().await.map_err(|e| StorageError::io(&self.dir, e))? {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(stem) = name.strip_suffix(REF_SUFFIX) {
                if let Ok(id) = stem.parse::<Uuid>() {
                    ref_files.insert(id, path.clone());
                }
            } else if let Some(stem) = name.strip_suffix(".json") {
                match stem.parse::<Uuid>() {
                    Ok(id) => {
                        records.insert(id);
                    }
                    Err(_) => tracing::warn!(path = %path.display(), "skipping unreadable snapshot"),
                }
            }
        }

        let mut refs = Vec::with_capacity(records.len());
        for id in records {
            let listed = match ref_files.get(&id) {
                Some(path) => Self::read_ref(path).await,
                None => Err(StorageError::SnapshotNotFound(id)),
            };
            match listed {
                Ok(r) if r.id == id => refs.push(r),
                _ => {
                    let path = self.record_file(id);
                    match Self::read_record(&path).await {
                        Ok(record) => refs.push(record.to_ref()),
                        Err(err) => {
                            tracing::warn!(path = %path.display(), error = %err, "skipping unreadable snapshot");
                        }
                    }
                }
            }
        }

        refs.sort_by(|a, b| (a.timestamp, a.id).cmp(&(b.timestamp, b.id)));
        Ok(refs)
    }

    async fn prune(&self) -> Result<(), StorageError> {
        if self.max_snapshots == 0 {
            return Ok(());
        }
        let refs = self.all_refs().await?;
        let excess = refs.len().saturating_sub(self.max_snapshots);
        for old in refs.into_iter().take(excess) {
            let path = self.record_file(old.id);
            fs::remove_file(&path).await.map_err(|e| StorageError::io(&path, e))?;
            let ref_path = self.ref_file(old.id);
            if let Err(err) = fs::remove_file(&ref_path).await {
                if err.kind() != std::io::ErrorKind::NotFound {
                    return Err(StorageError::io(&ref_path, err));
                }
            }
            tracing::debug!(id = %old.id, "pruned snapshot");
        }
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn save(&self, record: &SnapshotRecord) -> Result<SnapshotRef, StorageError> {
        self.ensure_dir().await?;

        let reference = record.to_ref();
        self.write_atomic(&self.record_file(record.id), serde_json::to_vec_pretty(record)?)
            .await?;
        self.write_atomic(&self.ref_file(record.id), serde_json::to_vec_pretty(&reference)?)
            .await?;

        tracing::info!(id = %record.id, nodes = record.nodes.len(), edges = record.edges.len(), "persisted snapshot");
        self.prune().await?;
        Ok(reference)
    }

    async fn list(&self, range: TimeRange) -> Result<Vec<SnapshotRef>, StorageError> {
        let refs = self.all_refs().await?;
        Ok(refs.into_iter().filter(|r| range.contains(r.timestamp)).collect())
    }

    async fn load(&self, id: Uuid) -> Result<SnapshotRecord, StorageError> {
        let path = self.record_file(id);
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::SnapshotNotFound(id));
        }
        Self::read_record(&path).await
    }
}
