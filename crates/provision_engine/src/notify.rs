use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};

use parking_lot::RwLock;
use provision_core::Notification;
use tracker_logging::{tracker_info, tracker_warn};

/// Downstream consumer of notifications, typically a toast presenter.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, notification: &Notification);
}

pub struct ChannelNotificationSink {
    tx: mpsc::Sender<Notification>,
}

impl ChannelNotificationSink {
    pub fn new(tx: mpsc::Sender<Notification>) -> Self {
        Self { tx }
    }
}

impl NotificationSink for ChannelNotificationSink {
    fn deliver(&self, notification: &Notification) {
        if self.tx.send(notification.clone()).is_err() {
            tracker_warn!(
                "notification receiver gone, dropping notification for job_id={}",
                notification.job_id
            );
        }
    }
}

/// Forwards notifications to every registered sink, in registration order.
/// At-most-once per job is guaranteed upstream by the reconciler.
#[derive(Default)]
pub struct NotificationDispatcher {
    sinks: RwLock<Vec<Arc<dyn NotificationSink>>>,
    dispatched: AtomicU64,
}

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sink(&self, sink: Arc<dyn NotificationSink>) {
        self.sinks.write().push(sink);
    }

    pub fn dispatch(&self, notification: &Notification) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        tracker_info!(
            "notify job_id={} severity={:?} text={}",
            notification.job_id,
            notification.severity,
            notification.text
        );
        let sinks = self.sinks.read().clone();
        for sink in sinks {
            sink.deliver(notification);
        }
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }
}
