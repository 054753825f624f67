//! Provision core: job data model and the pure event reconciler.
mod activity;
mod catalog;
mod effect;
mod event;
mod job;
mod reconcile;
mod view_model;

pub type JobId = String;

pub use activity::{ActivityEntry, ActivityLog, ActivityQuery, DEFAULT_ACTIVITY_CAPACITY};
pub use catalog::{CatalogContract, CatalogError, StageCatalog, StageSpec};
pub use effect::{ActivityRecord, Effect, Notification, Severity};
pub use event::{Event, EventType, MalformedEventError, RawEvent};
pub use job::{Job, JobStatus, Stage, StageStatus};
pub use reconcile::reconcile;
pub use view_model::{AggregateCounts, JobSnapshot, StageRow};
