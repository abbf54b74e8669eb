//! Swap record persistence.

use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Path, PathBuf};

use crate::error::SwapError;
use crate::record::{SwapId, SwapRecord};

/// Storage for swap records.
///
/// Records are written at every state change and before every lock
/// submission. Only needs to outlive the swap itself.
#[async_trait]
pub trait SwapStore: Send + Sync {
    async fn save(&self, record: &SwapRecord) -> Result<(), SwapError>;

    async fn load(&self, swap_id: &SwapId) -> Result<Option<SwapRecord>, SwapError>;

    async fn list(&self) -> Result<Vec<SwapRecord>, SwapError>;

    async fn remove(&self, swap_id: &SwapId) -> Result<(), SwapError>;

    /// Drop every record in a final state. Returns how many were removed.
    async fn prune_terminal(&self) -> Result<usize, SwapError> {
        let mut removed = 0;
        for record in self.list().await? {
            if record.is_final() {
                self.remove(&record.swap_id).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// In-memory store; records vanish with the process.
#[derive(Default)]
pub struct MemorySwapStore {
    records: DashMap<SwapId, SwapRecord>,
}

impl MemorySwapStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl SwapStore for MemorySwapStore {
    async fn save(&self, record: &SwapRecord) -> Result<(), SwapError> {
        self.records.insert(record.swap_id, record.clone());
        Ok(())
    }

    async fn load(&self, swap_id: &SwapId) -> Result<Option<SwapRecord>, SwapError> {
        Ok(self.records.get(swap_id).map(|r| r.clone()))
    }

    async fn list(&self) -> Result<Vec<SwapRecord>, SwapError> {
        Ok(self.records.iter().map(|r| r.value().clone()).collect())
    }

    async fn remove(&self, swap_id: &SwapId) -> Result<(), SwapError> {
        self.records.remove(swap_id);
        Ok(())
    }
}

/// One pretty-printed JSON file per swap under a directory.
pub struct FileSwapStore {
    dir: PathBuf,
}

impl FileSwapStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: &Path) -> Result<Self, SwapError> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, swap_id: &SwapId) -> PathBuf {
        self.dir.join(format!("{}.json", swap_id.to_hex()))
    }
}

#[async_trait]
impl SwapStore for FileSwapStore {
    async fn save(&self, record: &SwapRecord) -> Result<(), SwapError> {
        let path = self.path_for(&record.swap_id);
        let tmp = path.with_extension("json.tmp");
        let contents = serde_json::to_vec_pretty(record)?;
        // Write-then-rename so a crash never leaves a truncated record.
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn load(&self, swap_id: &SwapId) -> Result<Option<SwapRecord>, SwapError> {
        match tokio::fs::read(self.path_for(swap_id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<SwapRecord>, SwapError> {
        let mut records = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<SwapRecord>(&bytes) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable swap record");
                }
            }
        }
        Ok(records)
    }

    async fn remove(&self, swap_id: &SwapId) -> Result<(), SwapError> {
        match tokio::fs::remove_file(self.path_for(swap_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
