use anyhow::Result;

use super::{print_json, Command, CommandContext};
use crate::store::SnapshotStore;

pub struct StatusCommand {
    pub workflow_id: String,
}

impl Command for StatusCommand {
    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let snapshot = ctx.load(&self.workflow_id).await?;
        print_json(&ctx.pipeline.status_view(&snapshot))
    }
}

pub struct ResultsCommand {
    pub workflow_id: String,
}

impl Command for ResultsCommand {
    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let snapshot = ctx.load(&self.workflow_id).await?;
        let results = ctx.pipeline.final_results(&snapshot)?;
        print_json(&results)
    }
}

pub struct ListCommand;

impl Command for ListCommand {
    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let summaries = ctx.store.list().await?;
        print_json(&summaries)
    }
}
