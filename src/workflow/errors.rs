use thiserror::Error;

use crate::analytics::SimulatorError;
use crate::store::StoreError;

/// Failures that escape a workflow invocation.
///
/// Validation problems are normally recorded inside the snapshot instead of
/// being returned; `Validation` is for refusing a request outright, either
/// before a snapshot exists or when it targets an already completed workflow.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Validation failed: {reason}")]
    Validation { reason: String },

    #[error("Analytics simulator unavailable: {reason}")]
    SimulatorUnavailable { reason: String },

    #[error("Workflow {workflow_id} not found")]
    WorkflowNotFound { workflow_id: String },

    #[error("Workflow {workflow_id} has not completed yet")]
    NotCompleted { workflow_id: String },

    #[error("Snapshot store error: {0}")]
    Store(#[from] StoreError),
}

impl From<SimulatorError> for WorkflowError {
    fn from(err: SimulatorError) -> Self {
        match err {
            SimulatorError::Unavailable { reason } => WorkflowError::SimulatorUnavailable { reason },
        }
    }
}
