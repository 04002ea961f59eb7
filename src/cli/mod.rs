use clap::{Parser, Subcommand};

pub mod commands;

#[derive(Parser)]
#[command(name = "creator-pipeline")]
#[command(about = "Script, thumbnail and A/B test pipeline for short-form content")]
#[command(long_about = "Drives a content workflow from a topic to a tested winning thumbnail. \
                       Generation runs automatically, humans approve scripts and pick a thumbnail, \
                       and an A/B test decides the final creative. Every command prints JSON.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a new workflow and generate script candidates
    Start {
        /// What the content is about
        topic: String,
        /// Target platforms, repeatable
        #[arg(long = "platform", default_values_t = vec!["youtube".to_string()])]
        platforms: Vec<String>,
        /// Brand voice passed to the generator
        #[arg(long, default_value = "educational")]
        brand_voice: String,
    },
    /// Show workflow status and any action required
    Status {
        workflow_id: String,
    },
    /// Approve a script and continue to thumbnail generation
    Approve {
        workflow_id: String,
        /// Script to approve (defaults to the first candidate)
        #[arg(long)]
        script: Option<String>,
    },
    /// Reject all scripts and regenerate
    Reject {
        workflow_id: String,
    },
    /// Pick a thumbnail and start the A/B test
    SelectThumbnail {
        workflow_id: String,
        thumbnail_id: String,
    },
    /// Take one A/B test measurement, or keep polling with --watch
    Poll {
        workflow_id: String,
        /// Poll until the workflow leaves the testing phase
        #[arg(long)]
        watch: bool,
        /// Stop watching after this many polls
        #[arg(long, default_value = "1000")]
        max_polls: u32,
    },
    /// Declare the A/B test winner manually
    DeclareWinner {
        workflow_id: String,
        thumbnail_id: String,
    },
    /// Stop a running A/B test with the current CTR leader
    StopTest {
        workflow_id: String,
    },
    /// Show live A/B test metrics
    AbStatus {
        workflow_id: String,
    },
    /// Show final results of a completed workflow
    Results {
        workflow_id: String,
    },
    /// List stored workflows, most recently updated first
    List,
}
