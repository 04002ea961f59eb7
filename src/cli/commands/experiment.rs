use anyhow::{anyhow, Result};
use std::time::Duration;
use tracing::{info, warn};

use super::{print_json, Command, CommandContext};
use crate::workflow::errors::WorkflowError;
use crate::workflow::types::PipelineStatus;

/// Re-invoke the workflow so a running experiment takes a measurement.
pub struct PollCommand {
    pub workflow_id: String,
    pub watch: bool,
    pub max_polls: u32,
}

impl PollCommand {
    pub fn new(workflow_id: String) -> Self {
        Self {
            workflow_id,
            watch: false,
            max_polls: 1,
        }
    }

    pub fn with_watch(mut self, watch: bool, max_polls: u32) -> Self {
        self.watch = watch;
        self.max_polls = max_polls.max(1);
        self
    }
}

impl Command for PollCommand {
    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let interval = Duration::from_secs(ctx.config.experiment.check_interval_seconds);
        let mut polls = 0;

        loop {
            let snapshot = ctx.load(&self.workflow_id).await?;
            let snapshot = match ctx.pipeline.resume(snapshot) {
                Ok(snapshot) => snapshot,
                // Persisted snapshot is untouched; the next poll retries
                Err(WorkflowError::SimulatorUnavailable { reason }) if self.watch => {
                    warn!(workflow_id = %self.workflow_id, reason = %reason, "Analytics unavailable, retrying");
                    polls += 1;
                    if polls >= self.max_polls {
                        return Err(anyhow!("analytics unavailable after {} polls: {}", polls, reason));
                    }
                    tokio::time::sleep(interval).await;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            ctx.save(&snapshot).await?;
            polls += 1;

            let status = snapshot.current_step.pipeline_status();
            if !self.watch || status != PipelineStatus::AbTesting || polls >= self.max_polls {
                info!(workflow_id = %self.workflow_id, polls, status = ?status, "Polling finished");
                return match ctx.pipeline.experiment_status(&snapshot) {
                    Some(report) if status == PipelineStatus::AbTesting => print_json(&report),
                    _ => print_json(&ctx.pipeline.status_view(&snapshot)),
                };
            }

            tokio::time::sleep(interval).await;
        }
    }
}

pub struct DeclareWinnerCommand {
    pub workflow_id: String,
    pub thumbnail_id: String,
}

impl Command for DeclareWinnerCommand {
    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let snapshot = ctx.load(&self.workflow_id).await?;
        let snapshot = ctx.pipeline.force_winner(snapshot, &self.thumbnail_id)?;
        ctx.save_and_report(&snapshot).await
    }
}

pub struct StopTestCommand {
    pub workflow_id: String,
}

impl Command for StopTestCommand {
    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let snapshot = ctx.load(&self.workflow_id).await?;
        let snapshot = ctx.pipeline.stop_test(snapshot)?;
        ctx.save_and_report(&snapshot).await
    }
}

pub struct AbStatusCommand {
    pub workflow_id: String,
}

impl Command for AbStatusCommand {
    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let snapshot = ctx.load(&self.workflow_id).await?;
        match ctx.pipeline.experiment_status(&snapshot) {
            Some(report) => print_json(&report),
            None => Err(WorkflowError::Validation {
                reason: "A/B test not started yet".to_string(),
            }
            .into()),
        }
    }
}
