use anyhow::Result;
use clap::Parser;

use creator_pipeline::cli::commands::experiment::{
    AbStatusCommand, DeclareWinnerCommand, PollCommand, StopTestCommand,
};
use creator_pipeline::cli::commands::inspect::{ListCommand, ResultsCommand, StatusCommand};
use creator_pipeline::cli::commands::review::{ReviewScriptsCommand, SelectThumbnailCommand};
use creator_pipeline::cli::commands::start::StartCommand;
use creator_pipeline::cli::commands::{Command, CommandContext};
use creator_pipeline::cli::{Cli, Commands};
use creator_pipeline::config::{config, PipelineConfig};
use creator_pipeline::telemetry::{init_telemetry, shutdown_telemetry, OperationTimer};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config: PipelineConfig = config()?.clone();
    init_telemetry(&config.observability)?;

    let ctx = CommandContext::from_config(config)?;
    let timer = OperationTimer::new(command_name(&cli.command));

    let result = match cli.command {
        Commands::Start {
            topic,
            platforms,
            brand_voice,
        } => {
            StartCommand::new(topic)
                .with_platforms(platforms)
                .with_brand_voice(brand_voice)
                .execute(&ctx)
                .await
        }
        Commands::Status { workflow_id } => StatusCommand { workflow_id }.execute(&ctx).await,
        Commands::Approve {
            workflow_id,
            script,
        } => {
            ReviewScriptsCommand::approve(workflow_id, script)
                .execute(&ctx)
                .await
        }
        Commands::Reject { workflow_id } => {
            ReviewScriptsCommand::reject(workflow_id).execute(&ctx).await
        }
        Commands::SelectThumbnail {
            workflow_id,
            thumbnail_id,
        } => {
            SelectThumbnailCommand {
                workflow_id,
                thumbnail_id,
            }
            .execute(&ctx)
            .await
        }
        Commands::Poll {
            workflow_id,
            watch,
            max_polls,
        } => {
            PollCommand::new(workflow_id)
                .with_watch(watch, max_polls)
                .execute(&ctx)
                .await
        }
        Commands::DeclareWinner {
            workflow_id,
            thumbnail_id,
        } => {
            DeclareWinnerCommand {
                workflow_id,
                thumbnail_id,
            }
            .execute(&ctx)
            .await
        }
        Commands::StopTest { workflow_id } => StopTestCommand { workflow_id }.execute(&ctx).await,
        Commands::AbStatus { workflow_id } => AbStatusCommand { workflow_id }.execute(&ctx).await,
        Commands::Results { workflow_id } => ResultsCommand { workflow_id }.execute(&ctx).await,
        Commands::List => ListCommand.execute(&ctx).await,
    };

    timer.finish();
    shutdown_telemetry();
    result
}

fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Start { .. } => "start",
        Commands::Status { .. } => "status",
        Commands::Approve { .. } => "approve",
        Commands::Reject { .. } => "reject",
        Commands::SelectThumbnail { .. } => "select-thumbnail",
        Commands::Poll { .. } => "poll",
        Commands::DeclareWinner { .. } => "declare-winner",
        Commands::StopTest { .. } => "stop-test",
        Commands::AbStatus { .. } => "ab-status",
        Commands::Results { .. } => "results",
        Commands::List => "list",
    }
}
