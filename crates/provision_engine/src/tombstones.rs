use std::collections::{HashSet, VecDeque};

use provision_core::JobId;

/// Ids of recently removed jobs, so late events for them are dropped instead
/// of held. Remembers at most `capacity` ids; the oldest removal is forgotten
/// first.
#[derive(Debug)]
pub(crate) struct Tombstones {
    order: VecDeque<JobId>,
    ids: HashSet<JobId>,
    capacity: usize,
}

impl Tombstones {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::new(),
            ids: HashSet::new(),
            capacity: capacity.max(1),
        }
    }

    pub(crate) fn bury(&mut self, job_id: &str) {
        if !self.ids.insert(job_id.to_string()) {
            return;
        }
        self.order.push_back(job_id.to_string());
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
    }

    /// Called when an id is registered again.
    pub(crate) fn forget(&mut self, job_id: &str) {
        if self.ids.remove(job_id) {
            self.order.retain(|id| id != job_id);
        }
    }

    pub(crate) fn contains(&self, job_id: &str) -> bool {
        self.ids.contains(job_id)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.ids.len()
    }
}
