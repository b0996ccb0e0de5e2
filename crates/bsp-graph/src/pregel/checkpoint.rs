//! Checkpointing for fault-tolerant runs
//!
//! The engine calls [`Checkpointer::save`] once after every superstep with
//! the full pending-step list and a snapshot of every vertex's state, and
//! awaits it before the next superstep may begin. How and where that is
//! persisted is up to the implementation.
//!
//! Two implementations are bundled:
//! - [`MemoryCheckpointer`]: keeps every checkpoint in memory (tests, short runs)
//! - [`FileCheckpointer`]: one zstd-compressed JSON file per checkpoint
//!
//! Resuming is the caller's job: load the latest [`Checkpoint`] and pass its
//! `steps` and `states` to [`Engine::run`](super::engine::Engine::run).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use uuid::Uuid;

use super::config::CHECKPOINT_VERSION;
use super::error::PregelError;
use super::step::{States, Step};

/// Persistence contract used by the engine
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Called once when the graph is compiled
    fn set_version(&self, version: u32);

    /// Persist the next superstep's steps and the current state of every vertex
    async fn save(&self, steps: &[Step], states: &States) -> Result<(), PregelError>;
}

/// A persisted snapshot of one superstep boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: Uuid,
    /// Schema version reported by the engine
    pub version: u32,
    /// Position of this checkpoint among those saved by one checkpointer
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub steps: Vec<Step>,
    pub states: States,
}

impl Checkpoint {
    pub fn new(version: u32, sequence: u64, steps: Vec<Step>, states: States) -> Self {
        Self {
            id: Uuid::new_v4(),
            version,
            sequence,
            timestamp: Utc::now(),
            steps,
            states,
        }
    }
}

/// In-memory checkpointer
#[derive(Debug)]
pub struct MemoryCheckpointer {
    version: AtomicU32,
    checkpoints: Mutex<Vec<Checkpoint>>,
}

impl Default for MemoryCheckpointer {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCheckpointer {
    pub fn new() -> Self {
        Self {
            version: AtomicU32::new(CHECKPOINT_VERSION),
            checkpoints: Mutex::new(Vec::new()),
        }
    }

    pub fn version(&self) -> u32 {
        self.version.load(Ordering::SeqCst)
    }

    pub fn latest(&self) -> Option<Checkpoint> {
        self.checkpoints.lock().last().cloned()
    }

    pub fn all(&self) -> Vec<Checkpoint> {
        self.checkpoints.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.checkpoints.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.lock().is_empty()
    }

    pub fn clear(&self) {
        self.checkpoints.lock().clear();
    }
}

#[async_trait]
impl Checkpointer for MemoryCheckpointer {
    fn set_version(&self, version: u32) {
        self.version.store(version, Ordering::SeqCst);
    }

    async fn save(&self, steps: &[Step], states: &States) -> Result<(), PregelError> {
        let mut checkpoints = self.checkpoints.lock();
        let sequence = checkpoints.len() as u64;
        checkpoints.push(Checkpoint::new(
            self.version(),
            sequence,
            steps.to_vec(),
            states.clone(),
        ));
        Ok(())
    }
}

const FILE_PREFIX: &str = "checkpoint_";
const FILE_SUFFIX: &str = ".json.zst";

/// File-based checkpointer
///
/// Writes `checkpoint_{sequence:06}.json.zst` into its directory. Files are
/// written to a temporary name first and renamed into place.
#[derive(Debug)]
pub struct FileCheckpointer {
    dir: PathBuf,
    version: AtomicU32,
    next_sequence: AtomicU64,
    compression_level: i32,
}

impl FileCheckpointer {
    /// Open a checkpoint directory, creating it if needed
    ///
    /// Sequence numbers continue after the highest checkpoint already present.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, PregelError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        let next_sequence = match Self::latest_sequence(&dir).await? {
            Some(sequence) => sequence + 1,
            None => 0,
        };
        Ok(Self {
            dir,
            version: AtomicU32::new(CHECKPOINT_VERSION),
            next_sequence: AtomicU64::new(next_sequence),
            compression_level: 3,
        })
    }

    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn version(&self) -> u32 {
        self.version.load(Ordering::SeqCst)
    }

    fn path_for(&self, sequence: u64) -> PathBuf {
        self.dir.join(format!("{FILE_PREFIX}{sequence:06}{FILE_SUFFIX}"))
    }

    fn parse_sequence(file_name: &str) -> Option<u64> {
        file_name
            .strip_prefix(FILE_PREFIX)?
            .strip_suffix(FILE_SUFFIX)?
            .parse()
            .ok()
    }

    async fn latest_sequence(dir: &Path) -> Result<Option<u64>, PregelError> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut latest = None;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if let Some(sequence) = name.to_str().and_then(Self::parse_sequence) {
                latest = latest.max(Some(sequence));
            }
        }
        Ok(latest)
    }

    async fn write_atomic(tmp: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        tokio::fs::write(tmp, bytes).await?;
        tokio::fs::rename(tmp, path).await
    }

    /// Load the checkpoint with the given sequence number
    pub async fn load(&self, sequence: u64) -> Result<Option<Checkpoint>, PregelError> {
        let path = self.path_for(sequence);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        let compressed = tokio::fs::read(&path).await?;
        let json = tokio::task::spawn_blocking(move || zstd::decode_all(compressed.as_slice()))
            .await
            .map_err(|e| PregelError::checkpoint_error(format!("decompression task failed: {e}")))??;
        Ok(Some(serde_json::from_slice(&json)?))
    }

    /// Load the most recent checkpoint in the directory
    pub async fn latest(&self) -> Result<Option<Checkpoint>, PregelError> {
        match Self::latest_sequence(&self.dir).await? {
            Some(sequence) => self.load(sequence).await,
            None => Ok(None),
        }
    }

    /// Sequence numbers of every checkpoint in the directory, ascending
    pub async fn list(&self) -> Result<Vec<u64>, PregelError> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut sequences = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(sequence) = entry.file_name().to_str().and_then(Self::parse_sequence) {
                sequences.push(sequence);
            }
        }
        sequences.sort_unstable();
        Ok(sequences)
    }
}

#[async_trait]
impl Checkpointer for FileCheckpointer {
    fn set_version(&self, version: u32) {
        self.version.store(version, Ordering::SeqCst);
    }

    async fn save(&self, steps: &[Step], states: &States) -> Result<(), PregelError> {
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let checkpoint = Checkpoint::new(self.version(), sequence, steps.to_vec(), states.clone());
        let json = serde_json::to_vec(&checkpoint)?;

        let level = self.compression_level;
        let compressed = tokio::task::spawn_blocking(move || zstd::encode_all(json.as_slice(), level))
            .await
            .map_err(|e| PregelError::checkpoint_error(format!("compression task failed: {e}")))??;

        let path = self.path_for(sequence);
        let tmp = path.with_extension("tmp");
        if let Err(e) = Self::write_atomic(&tmp, &path, &compressed).await {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(
                        path = %tmp.display(),
                        error = %cleanup,
                        "Failed to remove temp checkpoint"
                    );
                }
            }
            // Give the number back unless another save already took the next one
            let _ = self.next_sequence.compare_exchange(
                sequence + 1,
                sequence,
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
            return Err(e.into());
        }

        tracing::debug!(
            sequence,
            path = %path.display(),
            bytes = compressed.len(),
            "Checkpoint written"
        );
        Ok(())
    }
}
