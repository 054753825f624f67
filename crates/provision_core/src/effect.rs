use serde::Serialize;

use crate::{EventType, JobId};

/// Side effects the reconciler asks the runtime to carry out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    RecordActivity(ActivityRecord),
    Notify(Notification),
}

/// Activity line before the log stamps it with an id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityRecord {
    pub job_id: Option<JobId>,
    pub kind: EventType,
    pub message: String,
    pub stage_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Success,
    Error,
}

/// User-facing message raised once when a job first reaches a terminal status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub job_id: JobId,
    pub severity: Severity,
    pub text: String,
}
