//! Routing decisions for the workflow graph.
//!
//! Every function here is a pure function of the snapshot: no clock, no I/O,
//! no hidden state. That is what lets a persisted snapshot be resumed without
//! any routing metadata stored alongside it.

use serde::{Deserialize, Serialize};

use super::types::{ExperimentStatus, WorkflowSnapshot, WorkflowStep};

/// Where an invocation enters the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryRoute {
    /// Nothing generated yet; run the generation pipeline from the top.
    FromStart,
    ScriptGate,
    ThumbnailGate,
    Experiment,
}

/// Decide the entry node from snapshot contents alone.
///
/// Rules are checked in order and the first match wins:
/// 1. experiment present, or a testing step tag
/// 2. thumbnail selected but no experiment yet
/// 3. step is `awaiting_thumbnail_selection`
/// 4. thumbnails exist and scripts are approved
/// 5. scripts exist
/// 6. either script approval flag set
/// 7. otherwise start over
pub fn route_from_entry(snapshot: &WorkflowSnapshot) -> EntryRoute {
    if snapshot.experiment.is_some() || snapshot.current_step.is_testing() {
        EntryRoute::Experiment
    } else if snapshot.selected_thumbnail_id.is_some() {
        EntryRoute::ThumbnailGate
    } else if snapshot.current_step == WorkflowStep::AwaitingThumbnailSelection {
        EntryRoute::ThumbnailGate
    } else if !snapshot.thumbnail_variants.is_empty() && snapshot.approval_status.scripts_approved {
        EntryRoute::ThumbnailGate
    } else if !snapshot.script_variants.is_empty() {
        EntryRoute::ScriptGate
    } else if snapshot.approval_status.scripts_approved || snapshot.approval_status.scripts_rejected {
        EntryRoute::ScriptGate
    } else {
        EntryRoute::FromStart
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptGateRoute {
    Approved,
    Rejected,
    Pending,
}

/// Approval wins over rejection when both flags are somehow set.
pub fn route_after_script_gate(snapshot: &WorkflowSnapshot) -> ScriptGateRoute {
    let approval = &snapshot.approval_status;
    if approval.scripts_approved {
        ScriptGateRoute::Approved
    } else if approval.scripts_rejected {
        ScriptGateRoute::Rejected
    } else {
        ScriptGateRoute::Pending
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThumbnailGateRoute {
    Selected,
    Pending,
}

pub fn route_after_thumbnail_gate(snapshot: &WorkflowSnapshot) -> ThumbnailGateRoute {
    if snapshot.selected_thumbnail_id.is_some() {
        ThumbnailGateRoute::Selected
    } else {
        ThumbnailGateRoute::Pending
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentRoute {
    /// Still collecting data; suspend until the next poll.
    Running,
    /// Terminal experiment; finalize.
    Finished,
    /// No experiment to look at, or a running one whose step says error.
    Halt,
}

/// A terminal experiment always finalizes, even over a recorded error.
pub fn route_after_experiment(snapshot: &WorkflowSnapshot) -> ExperimentRoute {
    match snapshot.experiment.as_ref().map(|e| e.status) {
        Some(status) if status.is_terminal() => ExperimentRoute::Finished,
        _ if snapshot.current_step == WorkflowStep::Error => ExperimentRoute::Halt,
        Some(_) => ExperimentRoute::Running,
        None => ExperimentRoute::Halt,
    }
}
