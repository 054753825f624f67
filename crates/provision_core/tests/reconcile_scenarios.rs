use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use pretty_assertions::assert_eq;
use provision_core::{
    reconcile, ActivityRecord, Effect, Event, EventType, Job, JobStatus, Notification, Severity,
    StageCatalog, StageStatus,
};

fn init_logging() {
    tracker_logging::initialize_for_tests();
}

fn catalog() -> Arc<StageCatalog> {
    Arc::new(StageCatalog::from_ids(["profile", "gmail", "instagram"]).unwrap())
}

fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
}

fn stage_states(job: &Job) -> Vec<(StageStatus, u8)> {
    job.stages().iter().map(|s| (s.status, s.progress)).collect()
}

fn notifications(effects: &[Effect]) -> Vec<&Notification> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Notify(notification) => Some(notification),
            Effect::RecordActivity(_) => None,
        })
        .collect()
}

#[test]
fn provisioning_walkthrough() {
    init_logging();

    // 1. Fresh job.
    let job = Job::new("job1", catalog());
    assert_eq!(job.status(), JobStatus::Pending);
    assert_eq!(job.overall_progress(), 0);
    assert!(job
        .stages()
        .iter()
        .all(|s| s.status == StageStatus::Pending && s.progress == 0));
    assert_eq!(job.last_event_at(), None);

    // 2. Progress on the second stage repairs the first.
    let gmail = Event::progress("job1", "gmail", 30);
    let (job, effects) = reconcile(job, &gmail, at(1));
    assert_eq!(
        stage_states(&job),
        vec![
            (StageStatus::Complete, 100),
            (StageStatus::InProgress, 30),
            (StageStatus::Pending, 0),
        ]
    );
    assert_eq!(job.status(), JobStatus::Running);
    assert_eq!(job.overall_progress(), 43);
    assert!(effects.is_empty());

    // 3. Duplicate delivery changes nothing.
    let (again, effects) = reconcile(job.clone(), &gmail, at(1));
    assert_eq!(again, job);
    assert!(effects.is_empty());

    // 4. Next stage forces gmail to complete.
    let (job, _) = reconcile(job, &Event::progress("job1", "instagram", 10), at(2));
    assert_eq!(
        stage_states(&job),
        vec![
            (StageStatus::Complete, 100),
            (StageStatus::Complete, 100),
            (StageStatus::InProgress, 10),
        ]
    );
    assert_eq!(job.overall_progress(), 70);

    // 5. Backend failure.
    let failure = Event::new("job1", EventType::Error)
        .with_stage("instagram")
        .with_message("verification failed");
    let (job, effects) = reconcile(job, &failure, at(3));
    assert_eq!(job.stage("instagram").unwrap().status, StageStatus::Error);
    assert_eq!(job.status(), JobStatus::Failed);
    assert_eq!(
        effects,
        vec![
            Effect::RecordActivity(ActivityRecord {
                job_id: Some("job1".to_string()),
                kind: EventType::Error,
                message: "verification failed".to_string(),
                stage_id: Some("instagram".to_string()),
            }),
            Effect::Notify(Notification {
                job_id: "job1".to_string(),
                severity: Severity::Error,
                text: "verification failed".to_string(),
            }),
        ]
    );
    assert!(job.terminal_notified());

    // 6. The same failure again: same state, activity only, no second toast.
    let (again, effects) = reconcile(job.clone(), &failure, at(3));
    assert_eq!(again, job);
    assert!(notifications(&effects).is_empty());
    assert_eq!(effects.len(), 1);
}

#[test]
fn completing_last_stage_completes_every_stage() {
    init_logging();
    let job = Job::new("job2", catalog());
    let (job, _) = reconcile(job, &Event::progress("job2", "profile", 50), at(1));
    let done = Event::new("job2", EventType::Complete).with_stage("instagram");
    let (job, effects) = reconcile(job, &done, at(2));

    assert_eq!(job.status(), JobStatus::Completed);
    assert_eq!(job.overall_progress(), 100);
    assert!(job
        .stages()
        .iter()
        .all(|s| s.status == StageStatus::Complete && s.progress == 100));
    assert_eq!(
        notifications(&effects),
        vec![&Notification {
            job_id: "job2".to_string(),
            severity: Severity::Success,
            text: "job2 completed".to_string(),
        }]
    );
}

#[test]
fn completing_a_middle_stage_keeps_job_running() {
    let job = Job::new("job3", catalog());
    let done = Event::new("job3", EventType::Complete).with_stage("gmail");
    let (job, effects) = reconcile(job, &done, at(1));

    assert_eq!(job.status(), JobStatus::Running);
    assert_eq!(job.stage("gmail").unwrap().status, StageStatus::Complete);
    assert_eq!(job.stage("instagram").unwrap().status, StageStatus::Pending);
    assert!(effects.is_empty());
}

#[test]
fn progress_never_decreases_within_a_stage() {
    let job = Job::new("job4", catalog());
    let (job, _) = reconcile(job, &Event::progress("job4", "profile", 60), at(1));
    let (job, _) = reconcile(job, &Event::progress("job4", "profile", 20), at(2));
    assert_eq!(job.stage("profile").unwrap().progress, 60);

    let bare = Event::new("job4", EventType::Progress).with_stage("profile");
    let (job, _) = reconcile(job, &bare, at(3));
    assert_eq!(job.stage("profile").unwrap().progress, 60);
    assert_eq!(job.last_event_at(), Some(at(3)));
}

#[test]
fn unknown_stage_only_logs_activity() {
    let job = Job::new("job5", catalog());
    let event = Event::progress("job5", "tiktok", 80).with_message("warming up");
    let (next, effects) = reconcile(job.clone(), &event, at(1));

    assert_eq!(next.stages(), job.stages());
    assert_eq!(next.status(), JobStatus::Pending);
    assert_eq!(
        effects,
        vec![Effect::RecordActivity(ActivityRecord {
            job_id: Some("job5".to_string()),
            kind: EventType::Progress,
            message: "warming up".to_string(),
            stage_id: None,
        })]
    );
}

#[test]
fn activity_events_never_touch_stages() {
    let job = Job::new("job6", catalog());
    let event = Event::new("job6", EventType::Activity)
        .with_stage("instagram")
        .with_message("captcha solved");
    let (next, effects) = reconcile(job.clone(), &event, at(1));

    assert_eq!(next.stages(), job.stages());
    assert_eq!(next.overall_progress(), 0);
    assert_eq!(effects.len(), 1);
}

#[test]
fn error_without_stage_fails_the_job() {
    let job = Job::new("job7", catalog());
    let (job, _) = reconcile(job, &Event::progress("job7", "gmail", 40), at(1));
    let (job, effects) = reconcile(job, &Event::new("job7", EventType::Error), at(2));

    assert_eq!(job.status(), JobStatus::Failed);
    assert_eq!(job.stage("gmail").unwrap().status, StageStatus::InProgress);
    assert_eq!(
        notifications(&effects),
        vec![&Notification {
            job_id: "job7".to_string(),
            severity: Severity::Error,
            text: "job7 failed at stage gmail".to_string(),
        }]
    );
}

#[test]
fn error_on_already_completed_stage_is_ignored() {
    let job = Job::new("job8", catalog());
    let (job, _) = reconcile(job, &Event::progress("job8", "instagram", 5), at(1));
    let late_error = Event::new("job8", EventType::Error)
        .with_stage("profile")
        .with_message("profile photo rejected");
    let (job, effects) = reconcile(job, &late_error, at(2));

    assert_eq!(job.status(), JobStatus::Running);
    assert_eq!(job.stage("profile").unwrap().status, StageStatus::Complete);
    assert!(notifications(&effects).is_empty());
    assert_eq!(effects.len(), 1);
}

#[test]
fn failed_job_absorbs_later_progress() {
    let job = Job::new("job9", catalog());
    let failure = Event::new("job9", EventType::Error).with_stage("gmail");
    let (job, _) = reconcile(job, &failure, at(1));
    let before = job.clone();

    let (job, effects) = reconcile(job, &Event::progress("job9", "instagram", 90), at(2));
    assert_eq!(job.stages(), before.stages());
    assert_eq!(job.overall_progress(), before.overall_progress());
    assert_eq!(job.status(), JobStatus::Failed);
    assert_eq!(job.last_event_at(), Some(at(2)));
    assert!(effects.is_empty());
}

#[test]
fn many_terminal_events_raise_one_notification() {
    let mut job = Job::new("job10", catalog());
    let done = Event::new("job10", EventType::Complete).with_stage("instagram");
    let mut raised = 0;
    for n in 0..5 {
        let (next, effects) = reconcile(job, &done, at(n));
        raised += notifications(&effects).len();
        job = next;
    }
    assert_eq!(raised, 1);
}

#[test]
fn restarted_job_starts_a_new_lifetime() {
    let job = Job::new("job11", catalog());
    let (job, _) = reconcile(job, &Event::new("job11", EventType::Error), at(1));
    assert!(job.terminal_notified());

    let fresh = job.restarted();
    assert_eq!(fresh.status(), JobStatus::Pending);
    assert!(!fresh.terminal_notified());
    assert_eq!(fresh.catalog(), job.catalog());
    assert_eq!(fresh.overall_progress(), 0);
}

#[test]
fn provisional_job_has_no_stages() {
    let job = Job::provisional("local-1");
    assert!(job.is_provisional());
    let (next, effects) = reconcile(job, &Event::progress("local-1", "gmail", 50), at(1));
    assert!(next.stages().is_empty());
    assert_eq!(next.overall_progress(), 0);
    assert_eq!(next.status(), JobStatus::Pending);
    assert!(effects.is_empty());
}
