use std::time::Duration;

use provision_core::DEFAULT_ACTIVITY_CAPACITY;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerSettings {
    /// How long an event for a not-yet-registered job is held before it is dropped.
    pub pending_window: Duration,
    /// Upper bound on held events across all unknown jobs.
    pub pending_capacity: usize,
    pub activity_capacity: usize,
    /// How many removed job ids are remembered for dropping their late events.
    pub removed_capacity: usize,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            pending_window: Duration::from_secs(5),
            pending_capacity: 256,
            activity_capacity: DEFAULT_ACTIVITY_CAPACITY,
            removed_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectSettings {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Consecutive failed attempts before the pump gives up. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(10),
            max_attempts: None,
        }
    }
}

impl ReconnectSettings {
    /// Delay before retry number `attempt` (1-based): doubles each time, capped.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }

    pub fn exhausted(&self, failures: u32) -> bool {
        self.max_attempts.is_some_and(|max| failures > max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_until_capped() {
        let settings = ReconnectSettings::default();
        assert_eq!(settings.backoff_for(1), Duration::from_millis(250));
        assert_eq!(settings.backoff_for(2), Duration::from_millis(500));
        assert_eq!(settings.backoff_for(4), Duration::from_secs(2));
        assert_eq!(settings.backoff_for(10), Duration::from_secs(10));
        assert_eq!(settings.backoff_for(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn unlimited_attempts_never_exhaust() {
        let settings = ReconnectSettings::default();
        assert!(!settings.exhausted(u32::MAX));

        let bounded = ReconnectSettings {
            max_attempts: Some(2),
            ..ReconnectSettings::default()
        };
        assert!(!bounded.exhausted(2));
        assert!(bounded.exhausted(3));
    }
}
