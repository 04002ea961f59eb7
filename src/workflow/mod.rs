// Content pipeline workflow: snapshot types, routing and the node graph

pub mod errors;
pub mod generator;
pub mod routing;
pub mod state_machine;
pub mod types;

pub use errors::WorkflowError;
pub use generator::{CreativeGenerator, GenerationContext, GeneratorError, TemplateGenerator};
pub use routing::{route_from_entry, EntryRoute, ExperimentRoute, ScriptGateRoute, ThumbnailGateRoute};
pub use state_machine::{Node, WorkflowStateMachine};
pub use types::{
    ApprovalStatus, ExperimentState, ExperimentStatus, FinalStats, PipelineStatus, RequiredAction,
    ScriptVariant, ThumbnailVariant, VariantMetrics, WorkflowSnapshot, WorkflowStep,
};
