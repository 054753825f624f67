use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use provision_core::{ActivityEntry, AggregateCounts, JobId, JobSnapshot};

const ACTIVITY_TARGET: &str = "activity";
const ALL_JOBS_TARGET: &str = "all-jobs";

/// What a subscriber observes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    Job(JobId),
    Activity,
    AllJobs,
}

impl Target {
    /// `"activity"` and `"all-jobs"` are reserved; anything else names a job.
    pub fn parse(text: &str) -> Self {
        match text {
            ACTIVITY_TARGET => Self::Activity,
            ALL_JOBS_TARGET => Self::AllJobs,
            job_id => Self::Job(job_id.to_string()),
        }
    }
}

impl From<&str> for Target {
    fn from(text: &str) -> Self {
        Self::parse(text)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Job(job_id) => write!(f, "job:{job_id}"),
            Self::Activity => f.write_str(ACTIVITY_TARGET),
            Self::AllJobs => f.write_str(ALL_JOBS_TARGET),
        }
    }
}

/// Payload delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    Job(JobSnapshot),
    /// The job was removed; its subscribers are detached right after this.
    JobRemoved(JobId),
    /// Entries added by the latest event, newest first.
    Activity(Vec<ActivityEntry>),
    Counts(AggregateCounts),
}

type Callback = Arc<dyn Fn(&Update) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    by_target: HashMap<Target, Vec<(u64, Callback)>>,
}

/// Plain observer lists keyed by [`Target`]. Callbacks run synchronously on
/// the publishing thread, outside the registry lock.
#[derive(Default)]
pub struct SubscriberRegistry {
    listeners: Arc<Mutex<Listeners>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, target: Target, callback: F) -> Subscription
    where
        F: Fn(&Update) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.lock();
        listeners.next_id += 1;
        let id = listeners.next_id;
        listeners
            .by_target
            .entry(target.clone())
            .or_default()
            .push((id, Arc::new(callback)));
        Subscription {
            id,
            target,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    pub fn publish(&self, target: &Target, update: &Update) {
        let callbacks: Vec<Callback> = match self.listeners.lock().by_target.get(target) {
            Some(entries) => entries.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
            None => return,
        };
        for callback in callbacks {
            callback(update);
        }
    }

    /// Drops every subscriber of `target`.
    pub fn detach(&self, target: &Target) -> usize {
        self.listeners
            .lock()
            .by_target
            .remove(target)
            .map_or(0, |entries| entries.len())
    }

    pub fn count(&self, target: &Target) -> usize {
        self.listeners
            .lock()
            .by_target
            .get(target)
            .map_or(0, Vec::len)
    }
}

impl fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.listeners.lock();
        f.debug_struct("SubscriberRegistry")
            .field("targets", &listeners.by_target.len())
            .finish()
    }
}

/// Disposer returned by [`SubscriberRegistry::subscribe`].
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    target: Target,
    listeners: Weak<Mutex<Listeners>>,
}

impl Subscription {
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Stops delivery. Safe to call more than once, and after the registry is gone.
    pub fn unsubscribe(&self) {
        let Some(listeners) = self.listeners.upgrade() else {
            return;
        };
        let mut listeners = listeners.lock();
        if let Some(entries) = listeners.by_target.get_mut(&self.target) {
            entries.retain(|(id, _)| *id != self.id);
            if entries.is_empty() {
                listeners.by_target.remove(&self.target);
            }
        }
    }
}
