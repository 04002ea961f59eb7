use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::statistics::ComparisonResult;

/// One generated script candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptVariant {
    pub id: String,
    pub hook: String,
    pub body: String,
    pub cta: String,
    /// Always within [0.60, 0.90].
    pub predicted_retention: f64,
    pub tone: String,
}

/// One generated thumbnail candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailVariant {
    pub id: String,
    pub style: String,
    pub prompt: String,
    pub image_url: String,
    pub seed: u32,
}

/// Human gate decisions. Independent flags rather than one enum: a rejection
/// that follows an approval stays representable until the next generation
/// cycle resets everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalStatus {
    pub scripts_approved: bool,
    pub scripts_rejected: bool,
    pub thumbnails_approved: bool,
}

impl ApprovalStatus {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    Running,
    Completed,
    Timeout,
    ManualOverride,
}

impl ExperimentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExperimentStatus::Running)
    }
}

/// Per-thumbnail metrics observed during an experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantMetrics {
    pub thumbnail_id: String,
    pub style: String,
    pub impressions: u64,
    pub clicks: u64,
    pub ctr: f64,
    #[serde(default)]
    pub avg_view_duration: u32,
}

impl VariantMetrics {
    pub fn new(thumbnail_id: &str, style: &str, impressions: u64, clicks: u64) -> Self {
        let ctr = if impressions > 0 {
            clicks as f64 / impressions as f64
        } else {
            0.0
        };
        Self {
            thumbnail_id: thumbnail_id.to_string(),
            style: style.to_string(),
            impressions,
            clicks,
            ctr,
            avg_view_duration: 0,
        }
    }

    pub fn zeroed(thumbnail: &ThumbnailVariant) -> Self {
        Self::new(&thumbnail.id, &thumbnail.style, 0, 0)
    }

    pub fn with_avg_view_duration(mut self, seconds: u32) -> Self {
        self.avg_view_duration = seconds;
        self
    }
}

/// Diagnostics captured once, when an experiment leaves `running`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FinalStats {
    Significant(ComparisonResult),
    Timeout { best_ctr: f64 },
    ManualOverride,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentState {
    pub started_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub status: ExperimentStatus,
    pub variants: Vec<VariantMetrics>,
    pub winner_id: Option<String>,
    pub confidence: f64,
    pub total_impressions: u64,
    pub check_count: u32,
    pub final_stats: Option<FinalStats>,
}

impl ExperimentState {
    pub fn start(thumbnails: &[ThumbnailVariant], now: DateTime<Utc>) -> Self {
        Self {
            started_at: now,
            last_updated_at: now,
            status: ExperimentStatus::Running,
            variants: thumbnails.iter().map(VariantMetrics::zeroed).collect(),
            winner_id: None,
            confidence: 0.0,
            total_impressions: 0,
            check_count: 0,
            final_stats: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == ExperimentStatus::Running
    }

    /// Highest-CTR variant; the earliest one wins ties.
    pub fn best_variant(&self) -> Option<&VariantMetrics> {
        self.variants.iter().fold(None, |best, v| match best {
            Some(b) if b.ctr >= v.ctr => Some(b),
            _ => Some(v),
        })
    }
}

/// Tag naming the last completed transition. Together with the presence of
/// snapshot fields this is the only routing input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    Init,
    ScriptsGenerated,
    AwaitingApproval,
    Approved,
    ScriptsRejected,
    ThumbnailsGenerated,
    AwaitingThumbnailSelection,
    ThumbnailSelected,
    AbTesting,
    AbTestComplete,
    Completed,
    Error,
}

impl WorkflowStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStep::Init => "init",
            WorkflowStep::ScriptsGenerated => "scripts_generated",
            WorkflowStep::AwaitingApproval => "awaiting_approval",
            WorkflowStep::Approved => "approved",
            WorkflowStep::ScriptsRejected => "scripts_rejected",
            WorkflowStep::ThumbnailsGenerated => "thumbnails_generated",
            WorkflowStep::AwaitingThumbnailSelection => "awaiting_thumbnail_selection",
            WorkflowStep::ThumbnailSelected => "thumbnail_selected",
            WorkflowStep::AbTesting => "ab_testing",
            WorkflowStep::AbTestComplete => "ab_test_complete",
            WorkflowStep::Completed => "completed",
            WorkflowStep::Error => "error",
        }
    }

    pub fn is_testing(&self) -> bool {
        matches!(self, WorkflowStep::AbTesting | WorkflowStep::AbTestComplete)
    }

    pub fn pipeline_status(&self) -> PipelineStatus {
        match self {
            WorkflowStep::Completed => PipelineStatus::Completed,
            WorkflowStep::AwaitingApproval => PipelineStatus::AwaitingApproval,
            WorkflowStep::AwaitingThumbnailSelection => PipelineStatus::AwaitingThumbnailSelection,
            WorkflowStep::AbTesting | WorkflowStep::AbTestComplete => PipelineStatus::AbTesting,
            WorkflowStep::Error => PipelineStatus::Error,
            _ => PipelineStatus::Running,
        }
    }

    /// What a human has to do next, if anything.
    pub fn required_action(&self) -> Option<RequiredAction> {
        match self {
            WorkflowStep::AwaitingApproval => Some(RequiredAction::ScriptApproval),
            WorkflowStep::AwaitingThumbnailSelection => Some(RequiredAction::ThumbnailSelection),
            WorkflowStep::AbTesting | WorkflowStep::AbTestComplete => {
                Some(RequiredAction::AbTestMonitoring)
            }
            _ => None,
        }
    }
}

/// Coarse status shown to callers and stored in listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Running,
    AwaitingApproval,
    AwaitingThumbnailSelection,
    AbTesting,
    Completed,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredAction {
    ScriptApproval,
    ThumbnailSelection,
    AbTestMonitoring,
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Complete serializable state of one workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSnapshot {
    pub workflow_id: String,
    pub topic: String,
    pub platforms: Vec<String>,
    pub brand_voice: String,

    pub script_variants: Vec<ScriptVariant>,
    pub selected_script_id: Option<String>,
    pub thumbnail_variants: Vec<ThumbnailVariant>,
    pub selected_thumbnail_id: Option<String>,
    pub approval_status: ApprovalStatus,
    pub experiment: Option<ExperimentState>,

    pub current_step: WorkflowStep,
    pub errors: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowSnapshot {
    pub fn new(
        workflow_id: impl Into<String>,
        topic: impl Into<String>,
        platforms: Vec<String>,
        brand_voice: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            topic: topic.into(),
            platforms,
            brand_voice: brand_voice.into(),
            script_variants: Vec::new(),
            selected_script_id: None,
            thumbnail_variants: Vec::new(),
            selected_thumbnail_id: None,
            approval_status: ApprovalStatus::default(),
            experiment: None,
            current_step: WorkflowStep::Init,
            errors: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    /// Record a validation failure: append to `errors` and halt at `error`.
    pub fn record_error(&mut self, message: impl Into<String>, now: DateTime<Utc>) {
        let message = message.into();
        tracing::warn!(
            workflow_id = %self.workflow_id,
            error = %message,
            "Workflow validation error recorded"
        );
        self.errors.push(message);
        self.current_step = WorkflowStep::Error;
        self.touch(now);
    }

    pub fn script(&self, id: &str) -> Option<&ScriptVariant> {
        self.script_variants.iter().find(|s| s.id == id)
    }

    pub fn thumbnail(&self, id: &str) -> Option<&ThumbnailVariant> {
        self.thumbnail_variants.iter().find(|t| t.id == id)
    }

    pub fn selected_script(&self) -> Option<&ScriptVariant> {
        self.selected_script_id.as_deref().and_then(|id| self.script(id))
    }

    pub fn selected_thumbnail(&self) -> Option<&ThumbnailVariant> {
        self.selected_thumbnail_id
            .as_deref()
            .and_then(|id| self.thumbnail(id))
    }

    pub fn clear_thumbnails(&mut self) {
        self.thumbnail_variants.clear();
        self.selected_thumbnail_id = None;
        self.approval_status.thumbnails_approved = false;
    }
}
