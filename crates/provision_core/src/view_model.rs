use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{Job, JobId, JobStatus, StageStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageRow {
    pub id: String,
    pub display_name: String,
    pub status: StageStatus,
    pub progress: u8,
}

/// Read-only copy of a job handed to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub status: JobStatus,
    pub overall_progress: u8,
    pub stages: Vec<StageRow>,
    pub current_stage: Option<String>,
    pub last_event_at: Option<DateTime<Utc>>,
    pub provisional: bool,
}

impl JobSnapshot {
    /// Time since the last applied event, for caller-side staleness checks.
    pub fn idle_for(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.last_event_at
            .map(|at| now.signed_duration_since(at).max(chrono::Duration::zero()))
    }
}

impl From<&Job> for JobSnapshot {
    fn from(job: &Job) -> Self {
        let stages = job
            .stages()
            .iter()
            .map(|stage| StageRow {
                id: stage.id.clone(),
                display_name: job
                    .catalog()
                    .get(stage.index)
                    .map(|spec| spec.display_name.clone())
                    .unwrap_or_else(|| stage.id.clone()),
                status: stage.status,
                progress: stage.progress,
            })
            .collect();
        Self {
            job_id: job.id().to_string(),
            status: job.status(),
            overall_progress: job.overall_progress(),
            stages,
            current_stage: job.current_stage().map(|stage| stage.id.clone()),
            last_event_at: job.last_event_at(),
            provisional: job.is_provisional(),
        }
    }
}

/// Per-status job counts for dashboard headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AggregateCounts {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

impl AggregateCounts {
    pub fn from_statuses<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = JobStatus>,
    {
        statuses
            .into_iter()
            .fold(Self::default(), |mut counts, status| {
                counts.total += 1;
                match status {
                    JobStatus::Pending => counts.pending += 1,
                    JobStatus::Running => counts.running += 1,
                    JobStatus::Completed => counts.completed += 1,
                    JobStatus::Failed => counts.failed += 1,
                }
                counts
            })
    }
}
