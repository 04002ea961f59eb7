//! Transport-facing operations over workflow snapshots.
//!
//! Every operation takes the caller's snapshot by value and returns the full
//! updated snapshot. Human decisions are applied to the snapshot and the state
//! machine is re-run, so a single call both records the decision and advances
//! the workflow as far as it can go.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::analytics::{AnalyticsSimulator, SimulatedAnalytics};
use crate::clock::{Clock, SystemClock};
use crate::config::PipelineConfig;
use crate::experiment::{ExperimentController, ExperimentStatusReport};
use crate::telemetry::{create_workflow_span, generate_correlation_id};
use crate::workflow::errors::WorkflowError;
use crate::workflow::generator::{CreativeGenerator, GeneratorError, TemplateGenerator};
use crate::workflow::state_machine::WorkflowStateMachine;
use crate::workflow::types::{
    ExperimentStatus, FinalStats, PipelineStatus, RequiredAction, ScriptVariant, ThumbnailVariant,
    WorkflowSnapshot, WorkflowStep,
};

/// Human verdict on the generated scripts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScriptDecision {
    /// Approve one script; `None` picks the first candidate.
    Approve { script_id: Option<String> },
    Reject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusView {
    pub workflow_id: String,
    pub status: PipelineStatus,
    pub current_step: WorkflowStep,
    pub requires_action: Option<RequiredAction>,
    pub scripts: Vec<ScriptVariant>,
    pub selected_script_id: Option<String>,
    pub thumbnails: Vec<ThumbnailVariant>,
    pub selected_thumbnail_id: Option<String>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSummary {
    pub status: ExperimentStatus,
    pub was_manual_override: bool,
    pub confidence: f64,
    pub total_impressions: u64,
    pub check_count: u32,
    pub duration_hours: f64,
    pub final_stats: Option<FinalStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalResults {
    pub workflow_id: String,
    pub topic: String,
    pub winning_script: Option<ScriptVariant>,
    pub winning_thumbnail: Option<ThumbnailVariant>,
    /// Observed CTR of the winning thumbnail, when it was measured.
    pub winning_ctr: Option<f64>,
    pub experiment: Option<ExperimentSummary>,
    pub export_ready: bool,
}

pub struct ContentPipeline {
    machine: WorkflowStateMachine,
    clock: Arc<dyn Clock>,
}

impl ContentPipeline {
    pub fn new(
        generator: Arc<dyn CreativeGenerator>,
        simulator: Arc<dyn AnalyticsSimulator>,
        clock: Arc<dyn Clock>,
        config: &PipelineConfig,
    ) -> Result<Self, GeneratorError> {
        let templates = TemplateGenerator::new(&config.generation)?;
        let experiments =
            ExperimentController::new(simulator, clock.clone(), config.experiment.clone());
        let machine = WorkflowStateMachine::new(generator, templates, experiments, clock.clone());
        Ok(Self { machine, clock })
    }

    /// Template generator, simulated analytics and the system clock.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, GeneratorError> {
        let generator = Arc::new(TemplateGenerator::new(&config.generation)?);
        Self::new(
            generator,
            Arc::new(SimulatedAnalytics::new()),
            Arc::new(SystemClock),
            config,
        )
    }

    pub fn start(
        &self,
        topic: &str,
        platforms: Vec<String>,
        brand_voice: &str,
    ) -> Result<WorkflowSnapshot, WorkflowError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(WorkflowError::Validation {
                reason: "topic must not be empty".to_string(),
            });
        }

        let workflow_id = Uuid::new_v4().to_string();
        let span = create_workflow_span("start", Some(&workflow_id), &generate_correlation_id());
        let _enter = span.enter();

        info!(workflow_id = %workflow_id, topic = %topic, "Starting workflow");
        let snapshot = WorkflowSnapshot::new(workflow_id, topic, platforms, brand_voice, self.clock.now());
        self.machine.run(snapshot)
    }

    pub fn resume(&self, snapshot: WorkflowSnapshot) -> Result<WorkflowSnapshot, WorkflowError> {
        let span = create_workflow_span("resume", Some(&snapshot.workflow_id), &generate_correlation_id());
        let _enter = span.enter();
        self.machine.run(snapshot)
    }

    pub fn approve_scripts(
        &self,
        mut snapshot: WorkflowSnapshot,
        decision: ScriptDecision,
    ) -> Result<WorkflowSnapshot, WorkflowError> {
        let span = create_workflow_span(
            "approve_scripts",
            Some(&snapshot.workflow_id),
            &generate_correlation_id(),
        );
        let _enter = span.enter();
        let now = self.clock.now();

        if snapshot.script_variants.is_empty() {
            snapshot.record_error("No scripts available for approval", now);
            return Ok(snapshot);
        }

        match decision {
            ScriptDecision::Approve { script_id } => {
                let selected = match script_id {
                    Some(id) => id,
                    None => snapshot.script_variants[0].id.clone(),
                };
                if snapshot.script(&selected).is_none() {
                    snapshot.record_error(format!("Invalid selected_script_id: {selected}"), now);
                    return Ok(snapshot);
                }
                info!(workflow_id = %snapshot.workflow_id, script_id = %selected, "Scripts approved");
                snapshot.selected_script_id = Some(selected);
                snapshot.approval_status.scripts_approved = true;
                snapshot.approval_status.scripts_rejected = false;
            }
            ScriptDecision::Reject => {
                info!(workflow_id = %snapshot.workflow_id, "Scripts rejected");
                snapshot.selected_script_id = None;
                snapshot.approval_status.scripts_approved = false;
                snapshot.approval_status.scripts_rejected = true;
            }
        }

        snapshot.selected_thumbnail_id = None;
        snapshot.approval_status.thumbnails_approved = false;
        snapshot.touch(now);

        self.machine.run(snapshot)
    }

    pub fn select_thumbnail(
        &self,
        mut snapshot: WorkflowSnapshot,
        thumbnail_id: &str,
    ) -> Result<WorkflowSnapshot, WorkflowError> {
        let span = create_workflow_span(
            "select_thumbnail",
            Some(&snapshot.workflow_id),
            &generate_correlation_id(),
        );
        let _enter = span.enter();
        let now = self.clock.now();

        if snapshot.thumbnail_variants.is_empty() {
            snapshot.record_error("No thumbnails available for selection", now);
            return Ok(snapshot);
        }
        if snapshot.thumbnail(thumbnail_id).is_none() {
            snapshot.record_error(format!("Invalid selected_thumbnail_id: {thumbnail_id}"), now);
            return Ok(snapshot);
        }

        info!(workflow_id = %snapshot.workflow_id, thumbnail_id = %thumbnail_id, "Thumbnail selected");
        snapshot.selected_thumbnail_id = Some(thumbnail_id.to_string());
        snapshot.approval_status.thumbnails_approved = true;
        snapshot.touch(now);

        self.machine.run(snapshot)
    }

    /// Declare a winner by hand, then resume so the workflow finalizes.
    ///
    /// A completed workflow only accepts a known variant; anything else is
    /// refused with `Validation` and the snapshot is left as it was.
    pub fn force_winner(
        &self,
        snapshot: WorkflowSnapshot,
        thumbnail_id: &str,
    ) -> Result<WorkflowSnapshot, WorkflowError> {
        let span = create_workflow_span(
            "force_winner",
            Some(&snapshot.workflow_id),
            &generate_correlation_id(),
        );
        let _enter = span.enter();

        if snapshot.current_step == WorkflowStep::Completed && !has_variant(&snapshot, thumbnail_id) {
            return Err(WorkflowError::Validation {
                reason: format!("Invalid thumbnail ID: {thumbnail_id}"),
            });
        }

        let errors_before = snapshot.errors.len();
        let snapshot = self.machine.experiments().force_winner(snapshot, thumbnail_id);
        if snapshot.errors.len() > errors_before {
            return Ok(snapshot);
        }
        self.machine.run(snapshot)
    }

    /// Stop a running test with the current CTR leader, then resume.
    pub fn stop_test(&self, snapshot: WorkflowSnapshot) -> Result<WorkflowSnapshot, WorkflowError> {
        let span = create_workflow_span("stop_test", Some(&snapshot.workflow_id), &generate_correlation_id());
        let _enter = span.enter();

        if snapshot.current_step == WorkflowStep::Completed {
            return Err(WorkflowError::Validation {
                reason: "Test not running".to_string(),
            });
        }

        let errors_before = snapshot.errors.len();
        let snapshot = self.machine.experiments().stop_test(snapshot);
        if snapshot.errors.len() > errors_before {
            return Ok(snapshot);
        }
        self.machine.run(snapshot)
    }

    pub fn experiment_status(&self, snapshot: &WorkflowSnapshot) -> Option<ExperimentStatusReport> {
        self.machine.experiments().status_report(snapshot)
    }

    pub fn final_results(&self, snapshot: &WorkflowSnapshot) -> Result<FinalResults, WorkflowError> {
        if snapshot.current_step != WorkflowStep::Completed {
            return Err(WorkflowError::NotCompleted {
                workflow_id: snapshot.workflow_id.clone(),
            });
        }

        let winning_script = snapshot.selected_script().cloned();
        let winning_thumbnail = snapshot.selected_thumbnail().cloned();

        let winning_ctr = snapshot.experiment.as_ref().and_then(|experiment| {
            let winner = snapshot.selected_thumbnail_id.as_deref()?;
            experiment
                .variants
                .iter()
                .find(|v| v.thumbnail_id == winner && v.impressions > 0)
                .map(|v| v.ctr)
        });

        let experiment = snapshot.experiment.as_ref().map(|experiment| ExperimentSummary {
            status: experiment.status,
            was_manual_override: experiment.status == ExperimentStatus::ManualOverride,
            confidence: experiment.confidence,
            total_impressions: experiment.total_impressions,
            check_count: experiment.check_count,
            duration_hours: (experiment.last_updated_at - experiment.started_at).num_seconds() as f64
                / 3600.0,
            final_stats: experiment.final_stats.clone(),
        });

        Ok(FinalResults {
            workflow_id: snapshot.workflow_id.clone(),
            topic: snapshot.topic.clone(),
            export_ready: winning_script.is_some() && winning_thumbnail.is_some(),
            winning_script,
            winning_thumbnail,
            winning_ctr,
            experiment,
        })
    }

    pub fn status_view(&self, snapshot: &WorkflowSnapshot) -> StatusView {
        StatusView {
            workflow_id: snapshot.workflow_id.clone(),
            status: snapshot.current_step.pipeline_status(),
            current_step: snapshot.current_step,
            requires_action: snapshot.current_step.required_action(),
            scripts: snapshot.script_variants.clone(),
            selected_script_id: snapshot.selected_script_id.clone(),
            thumbnails: snapshot.thumbnail_variants.clone(),
            selected_thumbnail_id: snapshot.selected_thumbnail_id.clone(),
            errors: snapshot.errors.clone(),
        }
    }
}

fn has_variant(snapshot: &WorkflowSnapshot, thumbnail_id: &str) -> bool {
    snapshot
        .experiment
        .as_ref()
        .is_some_and(|e| e.variants.iter().any(|v| v.thumbnail_id == thumbnail_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn pipeline() -> ContentPipeline {
        ContentPipeline::from_config(&PipelineConfig::default()).unwrap()
    }

    fn awaiting_thumbnail(pipeline: &ContentPipeline) -> WorkflowSnapshot {
        let snapshot = pipeline
            .start("meal prep", vec!["instagram".into()], "warm")
            .unwrap();
        pipeline
            .approve_scripts(snapshot, ScriptDecision::Approve { script_id: None })
            .unwrap()
    }

    #[test]
    fn test_start_rejects_blank_topic() {
        assert!(matches!(
            pipeline().start("   ", vec![], "warm"),
            Err(WorkflowError::Validation { .. })
        ));
    }

    #[test]
    fn test_start_assigns_uuid_and_waits_for_approval() {
        let snapshot = pipeline().start("meal prep", vec![], "warm").unwrap();
        assert!(Uuid::parse_str(&snapshot.workflow_id).is_ok());
        assert_eq!(snapshot.current_step, WorkflowStep::AwaitingApproval);
    }

    #[test]
    fn test_approve_without_id_picks_first_script() {
        let pipeline = pipeline();
        let snapshot = awaiting_thumbnail(&pipeline);

        assert_eq!(
            snapshot.selected_script_id.as_deref(),
            Some(snapshot.script_variants[0].id.as_str())
        );
        assert_eq!(snapshot.current_step, WorkflowStep::AwaitingThumbnailSelection);
        assert_eq!(
            pipeline.status_view(&snapshot).requires_action,
            Some(RequiredAction::ThumbnailSelection)
        );
    }

    #[test]
    fn test_approve_with_unknown_id_records_error() {
        let pipeline = pipeline();
        let snapshot = pipeline.start("meal prep", vec![], "warm").unwrap();
        let snapshot = pipeline
            .approve_scripts(
                snapshot,
                ScriptDecision::Approve {
                    script_id: Some("ghost".to_string()),
                },
            )
            .unwrap();

        assert_eq!(snapshot.current_step, WorkflowStep::Error);
        assert!(!snapshot.approval_status.scripts_approved);
        assert_eq!(pipeline.status_view(&snapshot).status, PipelineStatus::Error);
    }

    #[test]
    fn test_select_unknown_thumbnail_records_error() {
        let pipeline = pipeline();
        let snapshot = awaiting_thumbnail(&pipeline);
        let snapshot = pipeline.select_thumbnail(snapshot, "ghost").unwrap();

        assert_eq!(snapshot.current_step, WorkflowStep::Error);
        assert!(snapshot.experiment.is_none());
    }

    #[test]
    fn test_final_results_require_completion() {
        let pipeline = pipeline();
        let snapshot = awaiting_thumbnail(&pipeline);
        assert!(matches!(
            pipeline.final_results(&snapshot),
            Err(WorkflowError::NotCompleted { .. })
        ));
    }

    #[test]
    fn test_stop_test_completes_with_leader() {
        let clock = Arc::new(ManualClock::default());
        let config = PipelineConfig::default();
        let pipeline = ContentPipeline::new(
            Arc::new(TemplateGenerator::new(&config.generation).unwrap()),
            Arc::new(SimulatedAnalytics::new()),
            clock.clone(),
            &config,
        )
        .unwrap();

        let snapshot = awaiting_thumbnail(&pipeline);
        let first = snapshot.thumbnail_variants[0].id.clone();
        let snapshot = pipeline.select_thumbnail(snapshot, &first).unwrap();

        clock.advance(chrono::Duration::minutes(10));
        let snapshot = pipeline.resume(snapshot).unwrap();
        let snapshot = if snapshot.current_step == WorkflowStep::Completed {
            snapshot
        } else {
            pipeline.stop_test(snapshot).unwrap()
        };

        assert_eq!(snapshot.current_step, WorkflowStep::Completed);
        let results = pipeline.final_results(&snapshot).unwrap();
        assert!(results.export_ready);
        assert!(results.winning_ctr.is_some());
        assert!(results.experiment.unwrap().check_count >= 1);
    }

    fn completed(pipeline: &ContentPipeline) -> WorkflowSnapshot {
        let snapshot = awaiting_thumbnail(pipeline);
        let chosen = snapshot.thumbnail_variants[1].id.clone();
        let snapshot = pipeline.select_thumbnail(snapshot, &chosen).unwrap();
        let snapshot = pipeline.force_winner(snapshot, &chosen).unwrap();
        assert_eq!(snapshot.current_step, WorkflowStep::Completed);
        snapshot
    }

    #[test]
    fn test_refused_requests_leave_completed_workflow_intact() {
        let pipeline = pipeline();
        let snapshot = completed(&pipeline);

        assert!(matches!(
            pipeline.stop_test(snapshot.clone()),
            Err(WorkflowError::Validation { .. })
        ));
        assert!(matches!(
            pipeline.force_winner(snapshot.clone(), "bogus"),
            Err(WorkflowError::Validation { .. })
        ));

        let resumed = pipeline.resume(snapshot.clone()).unwrap();
        assert_eq!(resumed.current_step, WorkflowStep::Completed);
        assert!(resumed.errors.is_empty());
        assert!(pipeline.final_results(&resumed).is_ok());
    }

    #[test]
    fn test_completed_workflow_accepts_new_override() {
        let pipeline = pipeline();
        let snapshot = completed(&pipeline);
        let other = snapshot.thumbnail_variants[2].id.clone();

        let snapshot = pipeline.force_winner(snapshot, &other).unwrap();
        assert_eq!(snapshot.current_step, WorkflowStep::Completed);
        assert_eq!(snapshot.selected_thumbnail_id.as_deref(), Some(other.as_str()));
    }

    #[test]
    fn test_error_over_finished_experiment_finalizes_on_resume() {
        let pipeline = pipeline();
        let mut snapshot = completed(&pipeline);
        let now = snapshot.updated_at;
        snapshot.record_error("Test not running", now);
        assert_eq!(snapshot.current_step, WorkflowStep::Error);

        let resumed = pipeline.resume(snapshot).unwrap();
        assert_eq!(resumed.current_step, WorkflowStep::Completed);
        assert!(pipeline.final_results(&resumed).unwrap().export_ready);
    }
}
