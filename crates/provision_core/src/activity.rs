use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{ActivityRecord, EventType, JobId};

pub const DEFAULT_ACTIVITY_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub id: u64,
    pub job_id: Option<JobId>,
    #[serde(rename = "type")]
    pub kind: EventType,
    pub message: String,
    pub stage_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Filter for [`ActivityLog::query`]. All fields are optional and combine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityQuery {
    pub job_id: Option<JobId>,
    pub within: Option<Duration>,
    pub limit: Option<usize>,
}

impl ActivityQuery {
    pub fn for_job(job_id: impl Into<JobId>) -> Self {
        Self {
            job_id: Some(job_id.into()),
            ..Self::default()
        }
    }

    pub fn within(mut self, window: Duration) -> Self {
        self.within = Some(window);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Bounded, newest-first record of human-readable activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityLog {
    entries: VecDeque<ActivityEntry>,
    capacity: usize,
    next_id: u64,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_ACTIVITY_CAPACITY)
    }
}

impl ActivityLog {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            next_id: 1,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stamps the record and stores it, evicting the oldest entry when full.
    pub fn push(&mut self, record: ActivityRecord, now: DateTime<Utc>) -> ActivityEntry {
        let entry = ActivityEntry {
            id: self.next_id,
            job_id: record.job_id,
            kind: record.kind,
            message: record.message,
            stage_id: record.stage_id,
            timestamp: now,
        };
        self.next_id += 1;
        self.entries.push_front(entry.clone());
        while self.entries.len() > self.capacity {
            self.entries.pop_back();
        }
        entry
    }

    /// Newest-first entries matching `query`. Recency windows are measured
    /// against `now` on every call.
    pub fn query(&self, query: &ActivityQuery, now: DateTime<Utc>) -> Vec<ActivityEntry> {
        // A window too large for chrono is the same as no window.
        let cutoff = query
            .within
            .and_then(|window| chrono::Duration::from_std(window).ok())
            .and_then(|window| now.checked_sub_signed(window));

        self.entries
            .iter()
            .filter(|entry| match &query.job_id {
                Some(job_id) => entry.job_id.as_ref() == Some(job_id),
                None => true,
            })
            .filter(|entry| cutoff.is_none_or(|cutoff| entry.timestamp >= cutoff))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &ActivityEntry> {
        self.entries.iter()
    }

    pub fn remove_job(&mut self, job_id: &str) {
        self.entries
            .retain(|entry| entry.job_id.as_deref() != Some(job_id));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
