//! A/B test lifecycle: initialise, ingest metrics and decide, manual override.
//!
//! The controller owns no state between calls. Each operation takes a snapshot,
//! reads `experiment` from it and hands the snapshot back. A running
//! experiment moves forward only when the caller invokes [`ExperimentController::advance`]
//! again, typically on a poll timer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::analytics::AnalyticsSimulator;
use crate::clock::Clock;
use crate::config::ExperimentConfig;
use crate::statistics::{multi_variant_compare, Recommendation};
use crate::workflow::errors::WorkflowError;
use crate::workflow::types::{
    ExperimentState, ExperimentStatus, FinalStats, VariantMetrics, WorkflowSnapshot, WorkflowStep,
};

const TOO_FEW_THUMBNAILS: &str = "Need at least 2 thumbnails for A/B test";

/// Point-in-time view of a running or finished experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentStatusReport {
    pub workflow_id: String,
    pub status: ExperimentStatus,
    pub is_running: bool,
    pub variants: Vec<VariantMetrics>,
    pub current_confidence: f64,
    pub total_impressions: u64,
    pub winner_id: Option<String>,
    pub elapsed_seconds: i64,
    pub estimated_seconds_remaining: i64,
    pub checks_completed: u32,
    pub can_declare_early: bool,
}

pub struct ExperimentController {
    simulator: Arc<dyn AnalyticsSimulator>,
    clock: Arc<dyn Clock>,
    config: ExperimentConfig,
}

impl std::fmt::Debug for ExperimentController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExperimentController")
            .field("config", &self.config)
            .finish()
    }
}

impl ExperimentController {
    pub fn new(
        simulator: Arc<dyn AnalyticsSimulator>,
        clock: Arc<dyn Clock>,
        config: ExperimentConfig,
    ) -> Self {
        Self {
            simulator,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Start an experiment with one zeroed metrics row per thumbnail.
    pub fn initialize(&self, mut snapshot: WorkflowSnapshot) -> WorkflowSnapshot {
        let now = self.clock.now();

        if snapshot.experiment.is_some() {
            debug!(workflow_id = %snapshot.workflow_id, "Experiment already initialized");
            return snapshot;
        }

        if snapshot.thumbnail_variants.len() < 2 {
            // Repeat polls keep a single copy of the message
            let already_halted = snapshot.current_step == WorkflowStep::Error
                && snapshot.errors.last().map(String::as_str) == Some(TOO_FEW_THUMBNAILS);
            if !already_halted {
                snapshot.record_error(TOO_FEW_THUMBNAILS, now);
            }
            return snapshot;
        }

        let experiment = ExperimentState::start(&snapshot.thumbnail_variants, now);
        info!(
            event = "ab_test_initialized",
            workflow_id = %snapshot.workflow_id,
            variants = experiment.variants.len(),
            "A/B test initialized"
        );

        snapshot.experiment = Some(experiment);
        snapshot.current_step = WorkflowStep::AbTesting;
        snapshot.touch(now);
        snapshot
    }

    /// Pull a fresh metrics batch and decide: winner, timeout, or keep running.
    ///
    /// A simulator failure is returned before anything in the snapshot is
    /// touched, so the caller can retry with the persisted copy.
    pub fn advance(&self, mut snapshot: WorkflowSnapshot) -> Result<WorkflowSnapshot, WorkflowError> {
        let now = self.clock.now();

        let Some(experiment) = snapshot.experiment.as_ref() else {
            snapshot.record_error("No A/B test to advance", now);
            return Ok(snapshot);
        };

        if !experiment.is_running() {
            debug!(
                workflow_id = %snapshot.workflow_id,
                status = ?experiment.status,
                "Experiment already finished, nothing to advance"
            );
            return Ok(snapshot);
        }

        let elapsed = now.signed_duration_since(experiment.started_at);
        let elapsed_minutes = elapsed.num_minutes().max(0) as u64;

        let batch = self
            .simulator
            .simulate_batch(&snapshot.workflow_id, &experiment.variants, elapsed_minutes)?;

        if batch.len() != experiment.variants.len() {
            return Err(WorkflowError::SimulatorUnavailable {
                reason: format!(
                    "returned {} metrics for {} variants",
                    batch.len(),
                    experiment.variants.len()
                ),
            });
        }

        let comparison = match multi_variant_compare(&batch, self.config.thresholds()) {
            Ok(comparison) => comparison,
            Err(e) => {
                snapshot.record_error(e.to_string(), now);
                return Ok(snapshot);
            }
        };

        let workflow_id = snapshot.workflow_id.clone();
        let Some(experiment) = snapshot.experiment.as_mut() else {
            return Ok(snapshot);
        };

        experiment.total_impressions = batch.iter().map(|v| v.impressions).sum();
        experiment.variants = batch;
        experiment.last_updated_at = now;
        experiment.check_count += 1;
        experiment.confidence = comparison.winner_confidence;

        let next_step = match comparison.winner_id.clone() {
            Some(winner_id) if comparison.recommendation == Recommendation::DeclareWinner => {
                info!(
                    event = "winner_declared",
                    workflow_id = %workflow_id,
                    winner_id = %winner_id,
                    confidence = experiment.confidence,
                    uplift = comparison.uplift,
                    "A/B test winner declared"
                );
                experiment.winner_id = Some(winner_id);
                experiment.status = ExperimentStatus::Completed;
                experiment.final_stats = Some(FinalStats::Significant(comparison));
                WorkflowStep::AbTestComplete
            }
            _ if elapsed.num_seconds() > self.config.max_duration_seconds() => {
                let (best_id, best_ctr) = match experiment.best_variant() {
                    Some(best) => (best.thumbnail_id.clone(), best.ctr),
                    None => return Ok(snapshot),
                };
                warn!(
                    event = "timeout_declared",
                    workflow_id = %workflow_id,
                    winner_id = %best_id,
                    best_ctr,
                    elapsed_hours = elapsed.num_hours(),
                    "A/B test timed out, picking best CTR"
                );
                experiment.winner_id = Some(best_id);
                experiment.status = ExperimentStatus::Timeout;
                experiment.final_stats = Some(FinalStats::Timeout { best_ctr });
                WorkflowStep::AbTestComplete
            }
            _ => {
                info!(
                    event = "test_continues",
                    workflow_id = %workflow_id,
                    check = experiment.check_count,
                    confidence = experiment.confidence,
                    impressions = experiment.total_impressions,
                    recommendation = ?comparison.recommendation,
                    "A/B test continues"
                );
                WorkflowStep::AbTesting
            }
        };

        snapshot.current_step = next_step;
        snapshot.touch(now);
        Ok(snapshot)
    }

    /// Human override: valid in any experiment status, repeated calls overwrite.
    pub fn force_winner(&self, mut snapshot: WorkflowSnapshot, thumbnail_id: &str) -> WorkflowSnapshot {
        let now = self.clock.now();
        let workflow_id = snapshot.workflow_id.clone();

        let Some(experiment) = snapshot.experiment.as_mut() else {
            snapshot.record_error("A/B test not started yet", now);
            return snapshot;
        };

        if !experiment.variants.iter().any(|v| v.thumbnail_id == thumbnail_id) {
            snapshot.record_error(format!("Invalid thumbnail ID: {thumbnail_id}"), now);
            return snapshot;
        }

        info!(
            event = "manual_override",
            workflow_id = %workflow_id,
            winner_id = %thumbnail_id,
            previous_status = ?experiment.status,
            "A/B test winner set by manual override"
        );

        experiment.winner_id = Some(thumbnail_id.to_string());
        experiment.status = ExperimentStatus::ManualOverride;
        experiment.final_stats = Some(FinalStats::ManualOverride);
        experiment.last_updated_at = now;

        snapshot.current_step = WorkflowStep::AbTestComplete;
        snapshot.touch(now);
        snapshot
    }

    /// End a running test early with whichever variant currently leads on CTR.
    pub fn stop_test(&self, mut snapshot: WorkflowSnapshot) -> WorkflowSnapshot {
        let now = self.clock.now();

        let best_id = match snapshot.experiment.as_ref() {
            Some(experiment) if experiment.is_running() => experiment
                .best_variant()
                .map(|best| best.thumbnail_id.clone()),
            _ => {
                snapshot.record_error("Test not running", now);
                return snapshot;
            }
        };

        match best_id {
            Some(best_id) => self.force_winner(snapshot, &best_id),
            None => {
                snapshot.record_error("No variants to evaluate", now);
                snapshot
            }
        }
    }

    pub fn status_report(&self, snapshot: &WorkflowSnapshot) -> Option<ExperimentStatusReport> {
        let experiment = snapshot.experiment.as_ref()?;
        Some(self.report_at(&snapshot.workflow_id, experiment, self.clock.now()))
    }

    fn report_at(
        &self,
        workflow_id: &str,
        experiment: &ExperimentState,
        now: DateTime<Utc>,
    ) -> ExperimentStatusReport {
        let elapsed_seconds = now.signed_duration_since(experiment.started_at).num_seconds().max(0);
        let remaining = (self.config.max_duration_seconds() - elapsed_seconds).max(0);

        ExperimentStatusReport {
            workflow_id: workflow_id.to_string(),
            status: experiment.status,
            is_running: experiment.is_running(),
            variants: experiment.variants.clone(),
            current_confidence: experiment.confidence,
            total_impressions: experiment.total_impressions,
            winner_id: experiment.winner_id.clone(),
            elapsed_seconds,
            estimated_seconds_remaining: remaining,
            checks_completed: experiment.check_count,
            can_declare_early: experiment.confidence > self.config.early_declare_confidence
                || elapsed_seconds > self.config.early_declare_after_seconds as i64,
        }
    }
}
