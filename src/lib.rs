// Creator Pipeline Library - content workflow with human gates and A/B testing
// This exposes the core components for testing and integration

pub mod analytics;
pub mod cli;
pub mod clock;
pub mod config;
pub mod experiment;
pub mod pipeline;
pub mod statistics;
pub mod store;
pub mod telemetry;
pub mod workflow;

// Re-export key types for easy access
pub use analytics::{AnalyticsSimulator, SimulatedAnalytics, SimulatorError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{config, PipelineConfig};
pub use experiment::{ExperimentController, ExperimentStatusReport};
pub use pipeline::{ContentPipeline, FinalResults, ScriptDecision, StatusView};
pub use statistics::{multi_variant_compare, two_proportion_test, ComparisonResult, Recommendation};
pub use store::{FileSnapshotStore, InMemorySnapshotStore, SnapshotStore, StoreError, WorkflowSummary};
pub use telemetry::{create_workflow_span, generate_correlation_id, init_telemetry, shutdown_telemetry};
pub use workflow::{
    route_from_entry, CreativeGenerator, WorkflowError, WorkflowSnapshot, WorkflowStateMachine,
    WorkflowStep,
};
