use anyhow::Result;
use tracing::info;

use super::{Command, CommandContext};

pub struct StartCommand {
    pub topic: String,
    pub platforms: Vec<String>,
    pub brand_voice: String,
}

impl StartCommand {
    pub fn new(topic: String) -> Self {
        Self {
            topic,
            platforms: vec!["youtube".to_string()],
            brand_voice: "educational".to_string(),
        }
    }

    pub fn with_platforms(mut self, platforms: Vec<String>) -> Self {
        self.platforms = platforms;
        self
    }

    pub fn with_brand_voice(mut self, brand_voice: String) -> Self {
        self.brand_voice = brand_voice;
        self
    }
}

impl Command for StartCommand {
    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let snapshot = ctx
            .pipeline
            .start(&self.topic, self.platforms.clone(), &self.brand_voice)?;

        info!(
            workflow_id = %snapshot.workflow_id,
            scripts = snapshot.script_variants.len(),
            "Workflow created"
        );
        ctx.save_and_report(&snapshot).await
    }
}
