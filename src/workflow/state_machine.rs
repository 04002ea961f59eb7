use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::experiment::ExperimentController;

use super::errors::WorkflowError;
use super::generator::{
    synthetic_script, validate_scripts, validate_thumbnails, CreativeGenerator, GenerationContext,
    TemplateGenerator,
};
use super::routing::{
    route_after_experiment, route_after_script_gate, route_after_thumbnail_gate, route_from_entry,
    EntryRoute, ExperimentRoute, ScriptGateRoute, ThumbnailGateRoute,
};
use super::types::{WorkflowSnapshot, WorkflowStep};

/// Nodes of the content pipeline graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    GenerateScripts,
    ScriptGate,
    GenerateThumbnails,
    ThumbnailGate,
    RunExperimentStep,
    CheckExperimentStatus,
    Finalize,
}

impl Node {
    pub fn name(&self) -> &'static str {
        match self {
            Node::GenerateScripts => "generate_scripts",
            Node::ScriptGate => "script_gate",
            Node::GenerateThumbnails => "generate_thumbnails",
            Node::ThumbnailGate => "thumbnail_gate",
            Node::RunExperimentStep => "run_experiment_step",
            Node::CheckExperimentStatus => "check_experiment_status",
            Node::Finalize => "finalize",
        }
    }

    fn entry(route: EntryRoute) -> Self {
        match route {
            EntryRoute::FromStart => Node::GenerateScripts,
            EntryRoute::ScriptGate => Node::ScriptGate,
            EntryRoute::ThumbnailGate => Node::ThumbnailGate,
            EntryRoute::Experiment => Node::RunExperimentStep,
        }
    }
}

/// Re-entrant driver for one workflow snapshot.
///
/// Each call to [`run`](Self::run) routes the snapshot, executes nodes until a
/// suspension point (human gate, experiment still running, or a recorded
/// error) and returns the snapshot. There is no in-memory continuation: the
/// caller persists the result and invokes `run` again later.
pub struct WorkflowStateMachine {
    generator: Arc<dyn CreativeGenerator>,
    templates: TemplateGenerator,
    experiments: ExperimentController,
    clock: Arc<dyn Clock>,
}

impl WorkflowStateMachine {
    pub fn new(
        generator: Arc<dyn CreativeGenerator>,
        templates: TemplateGenerator,
        experiments: ExperimentController,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            generator,
            templates,
            experiments,
            clock,
        }
    }

    pub fn experiments(&self) -> &ExperimentController {
        &self.experiments
    }

    pub fn run(&self, snapshot: WorkflowSnapshot) -> Result<WorkflowSnapshot, WorkflowError> {
        let route = route_from_entry(&snapshot);
        debug!(
            workflow_id = %snapshot.workflow_id,
            current_step = %snapshot.current_step,
            route = ?route,
            "Routing workflow entry"
        );

        let mut node = Node::entry(route);
        let mut snapshot = snapshot;

        loop {
            let from = snapshot.current_step;
            let started = Instant::now();

            let (next_snapshot, next) = self.execute(node, snapshot)?;
            snapshot = next_snapshot;

            info!(
                workflow_id = %snapshot.workflow_id,
                node = node.name(),
                from_step = %from,
                to_step = %snapshot.current_step,
                elapsed_us = started.elapsed().as_micros() as u64,
                "Workflow transition"
            );

            match next {
                Some(next) => node = next,
                None => break,
            }
        }

        Ok(snapshot)
    }

    /// Execute one node and decide the next one; `None` suspends.
    fn execute(
        &self,
        node: Node,
        snapshot: WorkflowSnapshot,
    ) -> Result<(WorkflowSnapshot, Option<Node>), WorkflowError> {
        let result = match node {
            Node::GenerateScripts => (self.generate_scripts(snapshot), Some(Node::ScriptGate)),
            Node::ScriptGate => {
                let snapshot = self.script_gate(snapshot);
                let next = match route_after_script_gate(&snapshot) {
                    ScriptGateRoute::Approved => Some(Node::GenerateThumbnails),
                    ScriptGateRoute::Rejected => Some(Node::GenerateScripts),
                    ScriptGateRoute::Pending => None,
                };
                (snapshot, next)
            }
            Node::GenerateThumbnails => {
                (self.generate_thumbnails(snapshot), Some(Node::ThumbnailGate))
            }
            Node::ThumbnailGate => {
                let snapshot = self.thumbnail_gate(snapshot);
                let next = match route_after_thumbnail_gate(&snapshot) {
                    ThumbnailGateRoute::Selected => Some(Node::RunExperimentStep),
                    ThumbnailGateRoute::Pending => None,
                };
                (snapshot, next)
            }
            Node::RunExperimentStep => (
                self.run_experiment_step(snapshot)?,
                Some(Node::CheckExperimentStatus),
            ),
            Node::CheckExperimentStatus => {
                let snapshot = self.check_experiment_status(snapshot);
                let next = match route_after_experiment(&snapshot) {
                    ExperimentRoute::Finished => Some(Node::Finalize),
                    ExperimentRoute::Running | ExperimentRoute::Halt => None,
                };
                (snapshot, next)
            }
            Node::Finalize => (self.finalize(snapshot), None),
        };
        Ok(result)
    }

    fn context(snapshot: &WorkflowSnapshot) -> GenerationContext {
        GenerationContext {
            workflow_id: snapshot.workflow_id.clone(),
            platforms: snapshot.platforms.clone(),
            brand_voice: snapshot.brand_voice.clone(),
        }
    }

    /// Produce a fresh script set and reset every downstream decision.
    pub fn generate_scripts(&self, mut snapshot: WorkflowSnapshot) -> WorkflowSnapshot {
        let context = Self::context(&snapshot);

        let scripts = match self
            .generator
            .generate_scripts(&snapshot.topic, &context)
            .and_then(validate_scripts)
        {
            Ok(scripts) => scripts,
            Err(e) => {
                warn!(
                    workflow_id = %snapshot.workflow_id,
                    error = %e,
                    "Script generation failed, using template scripts"
                );
                self.templates.scripts(&snapshot.topic)
            }
        };

        snapshot.script_variants = scripts;
        snapshot.selected_script_id = None;
        snapshot.approval_status.reset();
        snapshot.clear_thumbnails();
        snapshot.current_step = WorkflowStep::ScriptsGenerated;
        snapshot.touch(self.clock.now());
        snapshot
    }

    pub fn script_gate(&self, mut snapshot: WorkflowSnapshot) -> WorkflowSnapshot {
        snapshot.current_step = match route_after_script_gate(&snapshot) {
            ScriptGateRoute::Approved => WorkflowStep::Approved,
            ScriptGateRoute::Rejected => {
                snapshot.clear_thumbnails();
                WorkflowStep::ScriptsRejected
            }
            ScriptGateRoute::Pending => WorkflowStep::AwaitingApproval,
        };
        snapshot.touch(self.clock.now());
        snapshot
    }

    pub fn generate_thumbnails(&self, mut snapshot: WorkflowSnapshot) -> WorkflowSnapshot {
        let context = Self::context(&snapshot);
        let script = snapshot
            .selected_script()
            .or_else(|| snapshot.script_variants.first())
            .cloned()
            .unwrap_or_else(|| synthetic_script(&snapshot.topic));

        let thumbnails = match self
            .generator
            .generate_thumbnails(&snapshot.topic, &script, &context)
            .and_then(validate_thumbnails)
        {
            Ok(thumbnails) => thumbnails,
            Err(e) => {
                warn!(
                    workflow_id = %snapshot.workflow_id,
                    error = %e,
                    "Thumbnail generation failed, using template thumbnails"
                );
                self.templates
                    .thumbnails(&snapshot.topic, &script, &snapshot.workflow_id)
            }
        };

        info!(
            workflow_id = %snapshot.workflow_id,
            script_id = %script.id,
            variants = thumbnails.len(),
            "Thumbnails generated"
        );

        snapshot.thumbnail_variants = thumbnails;
        snapshot.selected_thumbnail_id = None;
        snapshot.approval_status.thumbnails_approved = false;
        snapshot.current_step = WorkflowStep::ThumbnailsGenerated;
        snapshot.touch(self.clock.now());
        snapshot
    }

    pub fn thumbnail_gate(&self, mut snapshot: WorkflowSnapshot) -> WorkflowSnapshot {
        match route_after_thumbnail_gate(&snapshot) {
            ThumbnailGateRoute::Selected => {
                snapshot.approval_status.thumbnails_approved = true;
                snapshot.current_step = WorkflowStep::ThumbnailSelected;
            }
            ThumbnailGateRoute::Pending => {
                snapshot.approval_status.thumbnails_approved = false;
                snapshot.current_step = WorkflowStep::AwaitingThumbnailSelection;
            }
        }
        snapshot.touch(self.clock.now());
        snapshot
    }

    /// Initialise the experiment on first entry, otherwise take one measurement.
    pub fn run_experiment_step(
        &self,
        snapshot: WorkflowSnapshot,
    ) -> Result<WorkflowSnapshot, WorkflowError> {
        if snapshot.experiment.is_none() {
            Ok(self.experiments.initialize(snapshot))
        } else {
            self.experiments.advance(snapshot)
        }
    }

    pub fn check_experiment_status(&self, mut snapshot: WorkflowSnapshot) -> WorkflowSnapshot {
        snapshot.touch(self.clock.now());
        snapshot
    }

    /// The experiment's decision overrides any earlier manual thumbnail pick.
    pub fn finalize(&self, mut snapshot: WorkflowSnapshot) -> WorkflowSnapshot {
        if let Some(winner_id) = snapshot.experiment.as_ref().and_then(|e| e.winner_id.clone()) {
            snapshot.selected_thumbnail_id = Some(winner_id);
        }
        snapshot.current_step = WorkflowStep::Completed;
        snapshot.touch(self.clock.now());

        info!(
            workflow_id = %snapshot.workflow_id,
            thumbnail_id = ?snapshot.selected_thumbnail_id,
            script_id = ?snapshot.selected_script_id,
            "Workflow completed"
        );
        snapshot
    }
}
