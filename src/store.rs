//! Snapshot persistence.
//!
//! The workflow core never touches storage; callers load a snapshot, hand it
//! to the pipeline and save what comes back. Writes for a given workflow id
//! are expected to be serialized by the caller.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::workflow::types::{PipelineStatus, WorkflowSnapshot, WorkflowStep};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Workflow {workflow_id} not found")]
    NotFound { workflow_id: String },
}

/// Listing row for one stored workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub workflow_id: String,
    pub topic: String,
    pub status: PipelineStatus,
    pub current_step: WorkflowStep,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&WorkflowSnapshot> for WorkflowSummary {
    fn from(snapshot: &WorkflowSnapshot) -> Self {
        Self {
            workflow_id: snapshot.workflow_id.clone(),
            topic: snapshot.topic.clone(),
            status: snapshot.current_step.pipeline_status(),
            current_step: snapshot.current_step,
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
        }
    }
}

fn sort_newest_first(summaries: &mut [WorkflowSummary]) {
    summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load(&self, workflow_id: &str) -> Result<WorkflowSnapshot, StoreError>;

    async fn save(&self, snapshot: &WorkflowSnapshot) -> Result<(), StoreError>;

    /// Summaries of every stored workflow, most recently updated first.
    async fn list(&self) -> Result<Vec<WorkflowSummary>, StoreError>;
}

#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    snapshots: RwLock<HashMap<String, WorkflowSnapshot>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn load(&self, workflow_id: &str) -> Result<WorkflowSnapshot, StoreError> {
        self.snapshots
            .read()
            .await
            .get(workflow_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                workflow_id: workflow_id.to_string(),
            })
    }

    async fn save(&self, snapshot: &WorkflowSnapshot) -> Result<(), StoreError> {
        self.snapshots
            .write()
            .await
            .insert(snapshot.workflow_id.clone(), snapshot.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<WorkflowSummary>, StoreError> {
        let mut summaries: Vec<WorkflowSummary> = self
            .snapshots
            .read()
            .await
            .values()
            .map(WorkflowSummary::from)
            .collect();
        sort_newest_first(&mut summaries);
        Ok(summaries)
    }
}

/// One pretty-printed JSON file per workflow under a directory.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    directory: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn snapshot_path(&self, workflow_id: &str) -> PathBuf {
        self.directory.join(format!("{}.json", workflow_id))
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn load(&self, workflow_id: &str) -> Result<WorkflowSnapshot, StoreError> {
        let path = self.snapshot_path(workflow_id);

        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    workflow_id: workflow_id.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let snapshot: WorkflowSnapshot = serde_json::from_str(&contents)?;
        debug!(workflow_id = %workflow_id, file = ?path, "Snapshot loaded");
        Ok(snapshot)
    }

    async fn save(&self, snapshot: &WorkflowSnapshot) -> Result<(), StoreError> {
        fs::create_dir_all(&self.directory).await?;

        let path = self.snapshot_path(&snapshot.workflow_id);
        let serialized = serde_json::to_string_pretty(snapshot)?;

        // Write to a temporary file first, then rename over the old snapshot
        let temp_file = format!("{}.tmp", path.display());
        fs::write(&temp_file, serialized).await?;
        fs::rename(&temp_file, &path).await?;

        info!(
            workflow_id = %snapshot.workflow_id,
            current_step = %snapshot.current_step,
            file = ?path,
            "Snapshot saved"
        );
        Ok(())
    }

    async fn list(&self) -> Result<Vec<WorkflowSummary>, StoreError> {
        let mut entries = match fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut summaries = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            let contents = fs::read_to_string(&path).await?;
            match serde_json::from_str::<WorkflowSnapshot>(&contents) {
                Ok(snapshot) => summaries.push(WorkflowSummary::from(&snapshot)),
                Err(e) => {
                    warn!(file = ?path, error = %e, "Skipping unreadable snapshot file");
                }
            }
        }

        sort_newest_first(&mut summaries);
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn snapshot(id: &str, updated_offset_minutes: i64) -> WorkflowSnapshot {
        let created = Utc::now();
        let mut snapshot = WorkflowSnapshot::new(id, "topic", vec!["youtube".into()], "bold", created);
        snapshot.touch(created + Duration::minutes(updated_offset_minutes));
        snapshot
    }

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let store = InMemorySnapshotStore::new();
        let original = snapshot("wf-a", 0);

        store.save(&original).await.unwrap();
        assert_eq!(store.load("wf-a").await.unwrap(), original);
    }

    #[tokio::test]
    async fn test_missing_workflow_is_not_found() {
        let store = InMemorySnapshotStore::new();
        assert!(matches!(
            store.load("nope").await,
            Err(StoreError::NotFound { .. })
        ));

        let temp_dir = TempDir::new().unwrap();
        let store = FileSnapshotStore::new(temp_dir.path());
        assert!(matches!(
            store.load("nope").await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_file_store_save_load_and_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSnapshotStore::new(temp_dir.path().join("nested"));
        let mut original = snapshot("wf-file", 0);

        store.save(&original).await.unwrap();
        original.errors.push("something".to_string());
        store.save(&original).await.unwrap();

        let loaded = store.load("wf-file").await.unwrap();
        assert_eq!(loaded, original);
        assert!(!temp_dir.path().join("nested").join("wf-file.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_list_orders_by_updated_at_descending() {
        let temp_dir = TempDir::new().unwrap();
        let file_store = FileSnapshotStore::new(temp_dir.path());
        let memory_store = InMemorySnapshotStore::new();

        for (id, offset) in [("old", 1), ("newest", 30), ("middle", 10)] {
            file_store.save(&snapshot(id, offset)).await.unwrap();
            memory_store.save(&snapshot(id, offset)).await.unwrap();
        }
        std::fs::write(temp_dir.path().join("notes.txt"), "ignored").unwrap();

        for summaries in [file_store.list().await.unwrap(), memory_store.list().await.unwrap()] {
            let ids: Vec<&str> = summaries.iter().map(|s| s.workflow_id.as_str()).collect();
            assert_eq!(ids, vec!["newest", "middle", "old"]);
            assert!(summaries.iter().all(|s| s.status == PipelineStatus::Running));
        }
    }

    #[tokio::test]
    async fn test_list_on_missing_directory_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSnapshotStore::new(temp_dir.path().join("absent"));
        assert!(store.list().await.unwrap().is_empty());
    }
}
