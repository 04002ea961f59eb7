use anyhow::{Context, Result};
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::pipeline::ContentPipeline;
use crate::store::{FileSnapshotStore, SnapshotStore, StoreError};
use crate::workflow::errors::WorkflowError;
use crate::workflow::types::WorkflowSnapshot;

pub mod experiment;
pub mod inspect;
pub mod review;
pub mod start;

/// Everything a command needs: the pipeline, where snapshots live, and config.
pub struct CommandContext {
    pub pipeline: ContentPipeline,
    pub store: FileSnapshotStore,
    pub config: PipelineConfig,
}

impl CommandContext {
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        let pipeline = ContentPipeline::from_config(&config)
            .context("Failed to build content pipeline from configuration")?;
        let store = FileSnapshotStore::new(&config.storage.snapshot_dir);
        Ok(Self {
            pipeline,
            store,
            config,
        })
    }

    pub async fn load(&self, workflow_id: &str) -> Result<WorkflowSnapshot> {
        match self.store.load(workflow_id).await {
            Ok(snapshot) => Ok(snapshot),
            Err(StoreError::NotFound { workflow_id }) => {
                Err(WorkflowError::WorkflowNotFound { workflow_id }.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, snapshot: &WorkflowSnapshot) -> Result<()> {
        self.store.save(snapshot).await?;
        Ok(())
    }

    /// Save the snapshot and print its status view.
    pub async fn save_and_report(&self, snapshot: &WorkflowSnapshot) -> Result<()> {
        self.save(snapshot).await?;
        print_json(&self.pipeline.status_view(snapshot))
    }
}

#[allow(async_fn_in_trait)]
pub trait Command {
    async fn execute(&self, ctx: &CommandContext) -> Result<()>;
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
