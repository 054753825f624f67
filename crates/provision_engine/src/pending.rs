use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use provision_core::Event;

#[derive(Debug, Clone)]
struct Held {
    event: Event,
    received_at: DateTime<Utc>,
}

/// Holds events that arrive before their job is registered, which happens when
/// the transport beats the create-job response. Bounded in time and count.
#[derive(Debug)]
pub(crate) struct PendingEvents {
    held: VecDeque<Held>,
    window: chrono::Duration,
    capacity: usize,
}

impl PendingEvents {
    pub(crate) fn new(window: Duration, capacity: usize) -> Self {
        Self {
            held: VecDeque::new(),
            window: chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX),
            capacity: capacity.max(1),
        }
    }

    /// Holds `event`; returns the oldest held event if the buffer overflowed.
    pub(crate) fn hold(&mut self, event: Event, now: DateTime<Utc>) -> Option<Event> {
        self.held.push_back(Held {
            event,
            received_at: now,
        });
        if self.held.len() > self.capacity {
            return self.held.pop_front().map(|held| held.event);
        }
        None
    }

    /// Removes and returns every held event for `job_id`, in arrival order.
    pub(crate) fn take_for(&mut self, job_id: &str) -> Vec<Event> {
        let mut taken = Vec::new();
        self.held.retain(|held| {
            if held.event.job_id == job_id {
                taken.push(held.event.clone());
                false
            } else {
                true
            }
        });
        taken
    }

    /// Drops events older than the window and returns them.
    pub(crate) fn expire(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        let mut expired = Vec::new();
        while let Some(front) = self.held.front() {
            let age = now.signed_duration_since(front.received_at);
            if age <= self.window {
                break;
            }
            if let Some(held) = self.held.pop_front() {
                expired.push(held.event);
            }
        }
        expired
    }

    pub(crate) fn len(&self) -> usize {
        self.held.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use provision_core::EventType;

    use super::*;

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + millis).unwrap()
    }

    fn event(job: &str) -> Event {
        Event::new(job, EventType::Progress)
    }

    #[test]
    fn takes_events_for_one_job_in_order() {
        let mut pending = PendingEvents::new(Duration::from_secs(5), 10);
        pending.hold(event("a").with_progress(1), at(0));
        pending.hold(event("b"), at(1));
        pending.hold(event("a").with_progress(2), at(2));

        let taken = pending.take_for("a");
        let progress: Vec<_> = taken.iter().map(|e| e.progress).collect();
        assert_eq!(progress, vec![Some(1), Some(2)]);
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn expires_only_events_past_the_window() {
        let mut pending = PendingEvents::new(Duration::from_secs(5), 10);
        pending.hold(event("a"), at(0));
        pending.hold(event("b"), at(3_000));

        assert!(pending.expire(at(5_000)).is_empty());
        let expired = pending.expire(at(5_001));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].job_id, "a");
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn overflow_evicts_the_oldest() {
        let mut pending = PendingEvents::new(Duration::from_secs(5), 2);
        assert!(pending.hold(event("a"), at(0)).is_none());
        assert!(pending.hold(event("b"), at(1)).is_none());
        let evicted = pending.hold(event("c"), at(2));
        assert_eq!(evicted.map(|e| e.job_id), Some("a".to_string()));
        assert_eq!(pending.len(), 2);
    }
}
