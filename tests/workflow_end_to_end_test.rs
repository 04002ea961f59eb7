// End-to-end workflow tests driving the public pipeline API

use chrono::Duration;
use std::sync::Arc;

use creator_pipeline::config::PipelineConfig;
use creator_pipeline::store::{InMemorySnapshotStore, SnapshotStore};
use creator_pipeline::workflow::generator::TemplateGenerator;
use creator_pipeline::workflow::types::{ExperimentStatus, FinalStats, PipelineStatus, WorkflowStep};
use creator_pipeline::{ContentPipeline, ManualClock, ScriptDecision, SimulatedAnalytics};

fn pipeline_with_clock() -> (ContentPipeline, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    let config = PipelineConfig::default();
    let pipeline = ContentPipeline::new(
        Arc::new(TemplateGenerator::new(&config.generation).unwrap()),
        Arc::new(SimulatedAnalytics::new()),
        clock.clone(),
        &config,
    )
    .unwrap();
    (pipeline, clock)
}

#[test]
fn test_happy_path_with_manual_winner() {
    let (pipeline, clock) = pipeline_with_clock();

    // start -> 3 scripts
    let snapshot = pipeline
        .start("home workouts", vec!["youtube".into(), "tiktok".into()], "energetic")
        .unwrap();
    assert_eq!(snapshot.current_step, WorkflowStep::AwaitingApproval);
    assert_eq!(snapshot.script_variants.len(), 3);

    // approve script[0] -> 3 thumbnails
    let first_script = snapshot.script_variants[0].id.clone();
    let snapshot = pipeline
        .approve_scripts(
            snapshot,
            ScriptDecision::Approve {
                script_id: Some(first_script.clone()),
            },
        )
        .unwrap();
    assert_eq!(snapshot.current_step, WorkflowStep::AwaitingThumbnailSelection);
    assert_eq!(snapshot.thumbnail_variants.len(), 3);
    assert_eq!(snapshot.selected_script_id.as_deref(), Some(first_script.as_str()));

    // select thumbnail[1] -> experiment starts zeroed
    let chosen = snapshot.thumbnail_variants[1].id.clone();
    let snapshot = pipeline.select_thumbnail(snapshot, &chosen).unwrap();
    let experiment = snapshot.experiment.as_ref().unwrap();
    assert_eq!(experiment.status, ExperimentStatus::Running);
    assert_eq!(experiment.variants.len(), 3);
    assert!(experiment
        .variants
        .iter()
        .all(|v| v.impressions == 0 && v.clicks == 0 && v.ctr == 0.0));
    assert_eq!(snapshot.current_step, WorkflowStep::AbTesting);

    // manual override, then resume reaches completed
    clock.advance(Duration::minutes(5));
    let snapshot = pipeline.force_winner(snapshot, &chosen).unwrap();
    let snapshot = pipeline.resume(snapshot).unwrap();

    assert_eq!(snapshot.current_step, WorkflowStep::Completed);
    assert_eq!(snapshot.selected_thumbnail_id.as_deref(), Some(chosen.as_str()));
    let experiment = snapshot.experiment.as_ref().unwrap();
    assert_eq!(experiment.status, ExperimentStatus::ManualOverride);
    assert_eq!(experiment.final_stats, Some(FinalStats::ManualOverride));

    let results = pipeline.final_results(&snapshot).unwrap();
    assert!(results.export_ready);
    assert_eq!(results.winning_script.unwrap().id, first_script);
    assert_eq!(results.winning_thumbnail.unwrap().id, chosen);
    assert!(results.experiment.unwrap().was_manual_override);
}

#[test]
fn test_reject_regenerates_and_never_loops() {
    let (pipeline, _clock) = pipeline_with_clock();

    let snapshot = pipeline.start("film photography", vec![], "nostalgic").unwrap();
    let snapshot = pipeline
        .approve_scripts(snapshot, ScriptDecision::Reject)
        .unwrap();

    assert_eq!(snapshot.current_step, WorkflowStep::AwaitingApproval);
    assert_eq!(snapshot.script_variants.len(), 3);
    assert!(!snapshot.approval_status.scripts_rejected);
    assert!(snapshot.thumbnail_variants.is_empty());
    assert!(snapshot.selected_script_id.is_none());

    // The regenerated set can still be approved normally
    let snapshot = pipeline
        .approve_scripts(snapshot, ScriptDecision::Approve { script_id: None })
        .unwrap();
    assert_eq!(snapshot.current_step, WorkflowStep::AwaitingThumbnailSelection);
}

#[test]
fn test_polling_until_decision() {
    let (pipeline, clock) = pipeline_with_clock();

    let snapshot = pipeline.start("sourdough starters", vec![], "friendly").unwrap();
    let snapshot = pipeline
        .approve_scripts(snapshot, ScriptDecision::Approve { script_id: None })
        .unwrap();
    let picked = snapshot.thumbnail_variants[0].id.clone();
    let mut snapshot = pipeline.select_thumbnail(snapshot, &picked).unwrap();

    let mut last_checks = 0;
    let mut last_impressions = 0;
    for _ in 0..100 {
        if snapshot.current_step == WorkflowStep::Completed {
            break;
        }
        clock.advance(Duration::hours(1));
        snapshot = pipeline.resume(snapshot).unwrap();

        let experiment = snapshot.experiment.as_ref().unwrap();
        assert!(experiment.check_count > last_checks);
        assert!(experiment.total_impressions >= last_impressions);
        last_checks = experiment.check_count;
        last_impressions = experiment.total_impressions;
    }

    // Either significance or the 72h timeout must have ended the test
    assert_eq!(snapshot.current_step, WorkflowStep::Completed);
    let experiment = snapshot.experiment.as_ref().unwrap();
    assert!(matches!(
        experiment.status,
        ExperimentStatus::Completed | ExperimentStatus::Timeout
    ));
    assert_eq!(snapshot.selected_thumbnail_id, experiment.winner_id);
    assert!(last_checks <= 73);
}

#[test]
fn test_completed_workflow_is_stable_under_resume() {
    let (pipeline, _clock) = pipeline_with_clock();

    let snapshot = pipeline.start("urban gardening", vec![], "calm").unwrap();
    let snapshot = pipeline
        .approve_scripts(snapshot, ScriptDecision::Approve { script_id: None })
        .unwrap();
    let id = snapshot.thumbnail_variants[2].id.clone();
    let snapshot = pipeline.select_thumbnail(snapshot, &id).unwrap();
    let snapshot = pipeline.force_winner(snapshot, &id).unwrap();

    let again = pipeline.resume(snapshot.clone()).unwrap();
    assert_eq!(again.current_step, WorkflowStep::Completed);
    assert_eq!(again.experiment, snapshot.experiment);
    assert_eq!(again.selected_thumbnail_id, snapshot.selected_thumbnail_id);
}

#[test]
fn test_resume_from_store_round_trip() {
    let (pipeline, _clock) = pipeline_with_clock();
    let store = InMemorySnapshotStore::new();

    let snapshot = pipeline.start("budget travel", vec![], "playful").unwrap();
    let workflow_id = snapshot.workflow_id.clone();
    tokio_test::block_on(store.save(&snapshot)).unwrap();

    let loaded = tokio_test::block_on(store.load(&workflow_id)).unwrap();
    let snapshot = pipeline
        .approve_scripts(loaded, ScriptDecision::Approve { script_id: None })
        .unwrap();
    tokio_test::block_on(store.save(&snapshot)).unwrap();

    let summaries = tokio_test::block_on(store.list()).unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].status, PipelineStatus::AwaitingThumbnailSelection);
    assert_eq!(summaries[0].workflow_id, workflow_id);
}
