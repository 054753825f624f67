use chrono::{DateTime, Utc};

use crate::{
    ActivityRecord, Effect, Event, EventType, Job, JobStatus, Notification, Severity, StageStatus,
};

/// Pure reconciliation step: applies one event to one job and returns the
/// effects the runtime should carry out.
///
/// Stage state only moves forward (pending → in progress → complete/error) and
/// the overall percentage is clamped to never decrease, so duplicated and
/// reordered deliveries settle on the same job. A failed or completed job
/// absorbs later events: they still leave an activity trail, but no stage or
/// status changes.
pub fn reconcile(mut job: Job, event: &Event, now: DateTime<Utc>) -> (Job, Vec<Effect>) {
    let target = event
        .stage
        .as_deref()
        .and_then(|stage_id| job.catalog().index_of(stage_id));

    if !job.status().is_terminal() && event.kind != EventType::Activity {
        match target {
            Some(index) => apply_to_stage(&mut job, index, event),
            None if event.kind == EventType::Error => job.set_status(JobStatus::Failed),
            None => {}
        }
        job.refresh_overall();
    }

    let mut effects = Vec::new();
    if let Some(message) = &event.message {
        effects.push(Effect::RecordActivity(ActivityRecord {
            job_id: Some(job.id().to_string()),
            kind: event.kind,
            message: message.clone(),
            stage_id: target.and_then(|index| job.stages().get(index).map(|s| s.id.clone())),
        }));
    }

    if job.status().is_terminal() && !job.terminal_notified() {
        job.mark_notified();
        effects.push(Effect::Notify(terminal_notification(&job, event, target)));
    }

    job.touch(now);
    (job, effects)
}

fn apply_to_stage(job: &mut Job, index: usize, event: &Event) {
    let last_index = job.catalog().last_index();
    let stages = job.stages_mut();

    // Reaching stage `index` implies every earlier stage succeeded.
    for stage in stages.iter_mut().take(index) {
        if !stage.status.is_terminal() {
            stage.complete();
        }
    }

    let Some(stage) = stages.get_mut(index) else {
        return;
    };
    if !stage.status.is_terminal() {
        let progress = stage.progress.max(event.progress.unwrap_or(stage.progress));
        match event.kind {
            EventType::Progress | EventType::Activity => {
                stage.status = StageStatus::InProgress;
                stage.progress = progress;
            }
            EventType::Complete => stage.complete(),
            EventType::Error => {
                stage.status = StageStatus::Error;
                stage.progress = progress;
            }
        }
    }

    let completes_workflow = event.kind == EventType::Complete
        && Some(index) == last_index
        && stages[index].status == StageStatus::Complete;
    if completes_workflow {
        for stage in stages.iter_mut() {
            if stage.status != StageStatus::Error {
                stage.complete();
            }
        }
    }

    let status = job.derive_status();
    job.set_status(status);
}

fn terminal_notification(job: &Job, event: &Event, target: Option<usize>) -> Notification {
    let (severity, fallback) = match job.status() {
        JobStatus::Failed => {
            let stage_name = target
                .or_else(|| job.current_stage().map(|stage| stage.index))
                .and_then(|index| job.catalog().get(index))
                .map(|spec| spec.display_name.as_str());
            let text = match stage_name {
                Some(name) => format!("{} failed at stage {}", job.id(), name),
                None => format!("{} failed", job.id()),
            };
            (Severity::Error, text)
        }
        _ => (Severity::Success, format!("{} completed", job.id())),
    };
    Notification {
        job_id: job.id().to_string(),
        severity,
        text: event.message.clone().unwrap_or(fallback),
    }
}
