use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{JobId, StageCatalog};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    #[default]
    Pending,
    InProgress,
    Complete,
    Error,
}

impl StageStatus {
    /// `Complete` and `Error` never change once reached.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub id: String,
    pub index: usize,
    pub status: StageStatus,
    pub progress: u8,
}

impl Stage {
    fn pending(id: &str, index: usize) -> Self {
        Self {
            id: id.to_string(),
            index,
            status: StageStatus::Pending,
            progress: 0,
        }
    }

    /// Share of the overall percentage this stage accounts for.
    fn contribution(&self) -> u32 {
        match self.status {
            StageStatus::Pending => 0,
            StageStatus::Complete => 100,
            StageStatus::InProgress | StageStatus::Error => u32::from(self.progress),
        }
    }

    pub(crate) fn complete(&mut self) {
        self.status = StageStatus::Complete;
        self.progress = 100;
    }
}

/// Tracked state of one provisioning workflow instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    id: JobId,
    catalog: Arc<StageCatalog>,
    stages: Vec<Stage>,
    status: JobStatus,
    overall_progress: u8,
    last_event_at: Option<DateTime<Utc>>,
    terminal_notified: bool,
    provisional: bool,
}

impl Job {
    pub fn new(id: impl Into<JobId>, catalog: Arc<StageCatalog>) -> Self {
        let stages = catalog
            .stages()
            .iter()
            .enumerate()
            .map(|(index, spec)| Stage::pending(&spec.id, index))
            .collect();
        Self {
            id: id.into(),
            catalog,
            stages,
            status: JobStatus::Pending,
            overall_progress: 0,
            last_event_at: None,
            terminal_notified: false,
            provisional: false,
        }
    }

    /// Placeholder for a job the backend has not confirmed yet. It has no
    /// stages, so events addressed to it can only produce activity.
    pub fn provisional(id: impl Into<JobId>) -> Self {
        let mut job = Self::new(id, Arc::new(StageCatalog::placeholder()));
        job.provisional = true;
        job
    }

    /// Same id and catalog, fresh lifetime: every stage pending, guard cleared.
    pub fn restarted(&self) -> Self {
        Self::new(self.id.clone(), Arc::clone(&self.catalog))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn catalog(&self) -> &StageCatalog {
        &self.catalog
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage(&self, stage_id: &str) -> Option<&Stage> {
        self.catalog
            .index_of(stage_id)
            .and_then(|index| self.stages.get(index))
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn overall_progress(&self) -> u8 {
        self.overall_progress
    }

    pub fn last_event_at(&self) -> Option<DateTime<Utc>> {
        self.last_event_at
    }

    pub fn terminal_notified(&self) -> bool {
        self.terminal_notified
    }

    pub fn is_provisional(&self) -> bool {
        self.provisional
    }

    /// Highest-index stage that has started, if any.
    pub fn current_stage(&self) -> Option<&Stage> {
        self.stages
            .iter()
            .rev()
            .find(|stage| stage.status != StageStatus::Pending)
    }

    pub(crate) fn stages_mut(&mut self) -> &mut [Stage] {
        &mut self.stages
    }

    pub(crate) fn set_status(&mut self, status: JobStatus) {
        self.status = status;
    }

    pub(crate) fn touch(&mut self, at: DateTime<Utc>) {
        self.last_event_at = Some(at);
    }

    pub(crate) fn mark_notified(&mut self) {
        self.terminal_notified = true;
    }

    /// Recomputes the aggregate percentage; it only ever moves forward.
    pub(crate) fn refresh_overall(&mut self) {
        if self.stages.is_empty() {
            return;
        }
        let total: u32 = self.stages.iter().map(Stage::contribution).sum();
        let mean = total / self.stages.len() as u32;
        let mean = u8::try_from(mean.min(100)).unwrap_or(100);
        self.overall_progress = self.overall_progress.max(mean);
    }

    /// Status implied by the stage table. Never walks back from a terminal status.
    pub(crate) fn derive_status(&self) -> JobStatus {
        if self.status.is_terminal() {
            return self.status;
        }
        if self
            .stages
            .iter()
            .any(|stage| stage.status == StageStatus::Error)
        {
            return JobStatus::Failed;
        }
        if self
            .stages
            .last()
            .is_some_and(|stage| stage.status == StageStatus::Complete)
        {
            return JobStatus::Completed;
        }
        if self
            .stages
            .iter()
            .any(|stage| stage.status != StageStatus::Pending)
        {
            return JobStatus::Running;
        }
        self.status
    }
}
