// Human gate commands: script approval and thumbnail selection

use anyhow::Result;

use super::{Command, CommandContext};
use crate::pipeline::ScriptDecision;

pub struct ReviewScriptsCommand {
    pub workflow_id: String,
    pub decision: ScriptDecision,
}

impl ReviewScriptsCommand {
    pub fn approve(workflow_id: String, script_id: Option<String>) -> Self {
        Self {
            workflow_id,
            decision: ScriptDecision::Approve { script_id },
        }
    }

    pub fn reject(workflow_id: String) -> Self {
        Self {
            workflow_id,
            decision: ScriptDecision::Reject,
        }
    }
}

impl Command for ReviewScriptsCommand {
    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let snapshot = ctx.load(&self.workflow_id).await?;
        let snapshot = ctx
            .pipeline
            .approve_scripts(snapshot, self.decision.clone())?;
        ctx.save_and_report(&snapshot).await
    }
}

pub struct SelectThumbnailCommand {
    pub workflow_id: String,
    pub thumbnail_id: String,
}

impl Command for SelectThumbnailCommand {
    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let snapshot = ctx.load(&self.workflow_id).await?;
        let snapshot = ctx
            .pipeline
            .select_thumbnail(snapshot, &self.thumbnail_id)?;
        ctx.save_and_report(&snapshot).await
    }
}
