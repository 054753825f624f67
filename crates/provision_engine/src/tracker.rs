use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use provision_core::{
    reconcile, ActivityEntry, ActivityLog, ActivityQuery, AggregateCounts, CatalogContract,
    Effect, Event, EventType, Job, JobId, JobSnapshot, MalformedEventError, Notification,
    StageCatalog,
};
use tracker_logging::{tracker_debug, tracker_info, tracker_trace, tracker_warn};

use crate::pending::PendingEvents;
use crate::registry::JobCell;
use crate::tombstones::Tombstones;
use crate::{
    Clock, JobRegistry, NotificationDispatcher, NotificationSink, SubscriberRegistry,
    Subscription, SystemClock, Target, TrackerError, TrackerSettings, Update,
};

/// What happened to an event handed to [`Tracker::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Applied,
    /// Job not registered yet; held until it is or the window lapses.
    Held,
    /// Job was removed; the event was discarded.
    Dropped,
}

/// Counters for events the tracker could not use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Diagnostics {
    pub malformed: u64,
    pub expired: u64,
    pub dropped_after_removal: u64,
    pub catalog_less: u64,
    pub transport_errors: u64,
    pub held: usize,
}

#[derive(Debug, Default)]
struct Counters {
    malformed: AtomicU64,
    expired: AtomicU64,
    dropped_after_removal: AtomicU64,
    catalog_less: AtomicU64,
    transport_errors: AtomicU64,
}

fn bump(counter: &AtomicU64, by: u64) {
    counter.fetch_add(by, Ordering::Relaxed);
}

/// Side effects gathered while a job is locked, delivered once it is not.
#[derive(Debug, Default)]
struct Outcome {
    added: Vec<ActivityEntry>,
    notifications: Vec<Notification>,
}

/// Job tracking runtime: registry, reconciler, activity, notifications and
/// fan-out behind one shareable handle.
pub struct Tracker {
    clock: Arc<dyn Clock>,
    registry: JobRegistry,
    pending: Mutex<PendingEvents>,
    removed: Mutex<Tombstones>,
    activity: Mutex<ActivityLog>,
    subscribers: SubscriberRegistry,
    notifications: NotificationDispatcher,
    counters: Counters,
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new(TrackerSettings::default())
    }
}

impl Tracker {
    pub fn new(settings: TrackerSettings) -> Self {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    pub fn with_clock(settings: TrackerSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            registry: JobRegistry::new(),
            pending: Mutex::new(PendingEvents::new(
                settings.pending_window,
                settings.pending_capacity,
            )),
            removed: Mutex::new(Tombstones::new(settings.removed_capacity)),
            activity: Mutex::new(ActivityLog::with_capacity(settings.activity_capacity)),
            subscribers: SubscriberRegistry::new(),
            notifications: NotificationDispatcher::new(),
            counters: Counters::default(),
        }
    }

    /// Registers a job and replays any events that arrived before it.
    pub fn create_job(
        &self,
        job_id: impl Into<JobId>,
        catalog: StageCatalog,
    ) -> Result<JobSnapshot, TrackerError> {
        self.install(Job::new(job_id, Arc::new(catalog)), None)
    }

    /// Registers a job from the job-creation collaborator's wire shape.
    pub fn register(&self, contract: CatalogContract) -> Result<JobSnapshot, TrackerError> {
        let (job_id, catalog) = contract.into_parts()?;
        self.create_job(job_id, catalog)
    }

    pub fn get_job(&self, job_id: &str) -> Option<JobSnapshot> {
        self.registry.get(job_id).map(|job| JobSnapshot::from(&job))
    }

    pub fn list_jobs(&self) -> Vec<JobSnapshot> {
        self.registry.list().iter().map(JobSnapshot::from).collect()
    }

    /// Discards a job and detaches its subscribers. Later events for the id
    /// are dropped. Removing an unknown id is a no-op.
    pub fn remove_job(&self, job_id: &str) {
        if self.registry.remove(job_id).is_none() {
            return;
        }
        self.removed.lock().bury(job_id);
        let discarded = self.pending.lock().take_for(job_id).len();
        bump(&self.counters.dropped_after_removal, discarded as u64);
        tracker_info!("job removed job_id={}", job_id);
        self.detach_job(job_id);
        self.publish_counts();
    }

    /// Starts a new lifetime for a job with the same catalog. This is how a
    /// failed job is revived.
    pub fn reset_job(&self, job_id: &str) -> Result<JobSnapshot, TrackerError> {
        let cell = self
            .registry
            .cell(job_id)
            .ok_or_else(|| TrackerError::UnknownJob(job_id.to_string()))?;
        let snapshot = {
            let mut job = cell.lock();
            *job = job.restarted();
            JobSnapshot::from(&*job)
        };
        tracker_info!("job reset job_id={}", job_id);
        self.subscribers
            .publish(&Target::Job(job_id.to_string()), &Update::Job(snapshot.clone()));
        self.publish_counts();
        Ok(snapshot)
    }

    /// Registers a placeholder shown while the backend has not returned an id yet.
    pub fn begin_provisional(&self, local_id: impl Into<JobId>) -> Result<JobSnapshot, TrackerError> {
        let job = Job::provisional(local_id);
        let local_id = job.id().to_string();
        let snapshot = JobSnapshot::from(&job);
        self.registry.insert(job)?;
        tracker_debug!("provisional job registered local_id={}", local_id);
        self.publish_job(&local_id);
        self.publish_counts();
        Ok(snapshot)
    }

    /// Replaces a placeholder with the confirmed job. The placeholder's state
    /// is discarded rather than merged.
    pub fn confirm_provisional(
        &self,
        local_id: &str,
        job_id: impl Into<JobId>,
        catalog: StageCatalog,
    ) -> Result<JobSnapshot, TrackerError> {
        let job = Job::new(job_id, Arc::new(catalog));
        tracker_debug!("confirming provisional local_id={} job_id={}", local_id, job.id());
        self.install(job, Some(local_id))
    }

    /// Parses one transport frame and applies it. Malformed frames are counted
    /// and logged; they never touch job state.
    pub fn ingest_frame(&self, frame: &str) -> Result<Disposition, MalformedEventError> {
        match Event::from_json(frame) {
            Ok(event) => Ok(self.apply(event)),
            Err(err) => {
                bump(&self.counters.malformed, 1);
                tracker_warn!("discarding malformed event: {} frame={}", err, frame);
                Err(err)
            }
        }
    }

    /// Applies one validated event.
    pub fn apply(&self, event: Event) -> Disposition {
        let now = self.clock.now();
        self.expire_held(now);

        if let Some(cell) = self.registry.cell(&event.job_id) {
            self.apply_to(&cell, &event, now);
            return Disposition::Applied;
        }

        // Registration inserts and drains under the pending lock, so a job
        // that is still missing here will find this event when it arrives.
        let mut pending = self.pending.lock();
        if let Some(cell) = self.registry.cell(&event.job_id) {
            drop(pending);
            self.apply_to(&cell, &event, now);
            return Disposition::Applied;
        }
        if self.removed.lock().contains(&event.job_id) {
            bump(&self.counters.dropped_after_removal, 1);
            tracker_trace!("dropping event for removed job_id={}", event.job_id);
            return Disposition::Dropped;
        }

        tracker_debug!("holding event for unregistered job_id={}", event.job_id);
        if let Some(evicted) = pending.hold(event, now) {
            bump(&self.counters.expired, 1);
            tracker_warn!(
                "pending buffer full, dropping held event for job_id={}",
                evicted.job_id
            );
        }
        Disposition::Held
    }

    /// Drops held events whose window has lapsed. Returns how many were dropped.
    pub fn prune_pending(&self) -> usize {
        self.expire_held(self.clock.now())
    }

    pub fn get_activity(&self, query: &ActivityQuery) -> Vec<ActivityEntry> {
        let now = self.clock.now();
        self.activity.lock().query(query, now)
    }

    pub fn clear_activity(&self) {
        self.activity.lock().clear();
    }

    /// Drops one job's lines from the activity log. The job itself is untouched.
    pub fn clear_job_activity(&self, job_id: &str) {
        self.activity.lock().remove_job(job_id);
    }

    pub fn subscribe<F>(&self, target: impl Into<Target>, callback: F) -> Subscription
    where
        F: Fn(&Update) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(target.into(), callback)
    }

    pub fn add_notification_sink(&self, sink: Arc<dyn NotificationSink>) {
        self.notifications.add_sink(sink);
    }

    pub fn notifications_dispatched(&self) -> u64 {
        self.notifications.dispatched()
    }

    pub fn counts(&self) -> AggregateCounts {
        AggregateCounts::from_statuses(self.registry.statuses())
    }

    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            malformed: self.counters.malformed.load(Ordering::Relaxed),
            expired: self.counters.expired.load(Ordering::Relaxed),
            dropped_after_removal: self.counters.dropped_after_removal.load(Ordering::Relaxed),
            catalog_less: self.counters.catalog_less.load(Ordering::Relaxed),
            transport_errors: self.counters.transport_errors.load(Ordering::Relaxed),
            held: self.pending.lock().len(),
        }
    }

    pub(crate) fn note_transport_error(&self) {
        bump(&self.counters.transport_errors, 1);
    }

    /// Puts `job` in the registry, optionally in place of a provisional job,
    /// and replays its held events. The new job stays locked until the replay
    /// is done so live events queue up behind the held ones.
    fn install(&self, job: Job, replaces: Option<&str>) -> Result<JobSnapshot, TrackerError> {
        let job_id = job.id().to_string();
        let now = self.clock.now();
        let cell: JobCell = Arc::new(Mutex::new(job));
        let mut guard = cell.lock();

        let held = {
            let mut pending = self.pending.lock();
            match replaces {
                Some(local_id) => {
                    self.registry
                        .replace_provisional(local_id, job_id.clone(), Arc::clone(&cell))?
                }
                None => self.registry.insert_cell(job_id.clone(), Arc::clone(&cell))?,
            }
            pending.take_for(&job_id)
        };
        self.removed.lock().forget(&job_id);
        tracker_info!("job registered job_id={}", job_id);

        if !held.is_empty() {
            tracker_debug!("replaying {} held events for job_id={}", held.len(), job_id);
        }
        let mut outcome = Outcome::default();
        for event in &held {
            self.reconcile_locked(&mut guard, event, now, &mut outcome);
        }
        let snapshot = JobSnapshot::from(&*guard);
        drop(guard);

        if let Some(local_id) = replaces {
            self.detach_job(local_id);
        }
        self.publish_outcome(snapshot.clone(), outcome);
        Ok(snapshot)
    }

    fn apply_to(&self, cell: &JobCell, event: &Event, now: chrono::DateTime<chrono::Utc>) {
        let mut outcome = Outcome::default();
        let snapshot = {
            let mut job = cell.lock();
            self.reconcile_locked(&mut job, event, now, &mut outcome);
            JobSnapshot::from(&*job)
        };
        self.publish_outcome(snapshot, outcome);
    }

    /// Runs the reconciler on a job whose lock the caller holds. Activity is
    /// recorded here so its order matches the order events were applied.
    fn reconcile_locked(
        &self,
        job: &mut Job,
        event: &Event,
        now: chrono::DateTime<chrono::Utc>,
        outcome: &mut Outcome,
    ) {
        if event.kind != EventType::Activity
            && event
                .stage
                .as_deref()
                .is_none_or(|stage| job.catalog().index_of(stage).is_none())
        {
            bump(&self.counters.catalog_less, 1);
            tracker_debug!(
                "event without a known stage job_id={} stage={:?}",
                event.job_id,
                event.stage
            );
        }
        let (next, effects) = reconcile(job.clone(), event, now);
        *job = next;
        tracker_trace!(
            "applied {} job_id={} status={} overall={}",
            event.kind,
            event.job_id,
            job.status(),
            job.overall_progress()
        );

        for effect in effects {
            match effect {
                Effect::RecordActivity(record) => {
                    outcome.added.push(self.activity.lock().push(record, now))
                }
                Effect::Notify(notification) => outcome.notifications.push(notification),
            }
        }
    }

    /// Delivers what a locked update produced, after the job lock is released.
    fn publish_outcome(&self, snapshot: JobSnapshot, outcome: Outcome) {
        let Outcome {
            mut added,
            notifications,
        } = outcome;
        for notification in &notifications {
            self.notifications.dispatch(notification);
        }

        self.subscribers
            .publish(&Target::Job(snapshot.job_id.clone()), &Update::Job(snapshot));
        self.publish_counts();
        if !added.is_empty() {
            added.reverse();
            self.subscribers
                .publish(&Target::Activity, &Update::Activity(added));
        }
    }

    fn expire_held(&self, now: chrono::DateTime<chrono::Utc>) -> usize {
        let expired = self.pending.lock().expire(now);
        for event in &expired {
            tracker_warn!(
                "no job registered within the hold window, dropping {} event for job_id={}",
                event.kind,
                event.job_id
            );
        }
        bump(&self.counters.expired, expired.len() as u64);
        expired.len()
    }

    fn publish_job(&self, job_id: &str) {
        if let Some(snapshot) = self.get_job(job_id) {
            self.subscribers
                .publish(&Target::Job(job_id.to_string()), &Update::Job(snapshot));
        }
    }

    fn detach_job(&self, job_id: &str) {
        let target = Target::Job(job_id.to_string());
        self.subscribers
            .publish(&target, &Update::JobRemoved(job_id.to_string()));
        self.subscribers.detach(&target);
    }

    fn publish_counts(&self) {
        self.subscribers
            .publish(&Target::AllJobs, &Update::Counts(self.counts()));
    }
}
