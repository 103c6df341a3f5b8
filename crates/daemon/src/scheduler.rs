//! Cancellable delayed transitions, at most one pending per VPS

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

struct Job {
    ticket: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Jobs {
    next_ticket: u64,
    by_vps: HashMap<String, Job>,
}

/// Runs a callback after a delay unless it is cancelled or replaced first.
///
/// Scheduling for a VPS that already has a pending job aborts the old job.
#[derive(Clone, Default)]
pub struct TransitionScheduler {
    jobs: Arc<Mutex<Jobs>>,
}

impl TransitionScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule<F>(&self, vps_id: &str, delay: Duration, apply: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut jobs = self.jobs.lock();
        jobs.next_ticket += 1;
        let ticket = jobs.next_ticket;

        let registry = self.jobs.clone();
        let key = vps_id.to_string();
        // The task cannot observe the map until this lock is released, so
        // its own entry is always in place before it tries to remove it.
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut jobs = registry.lock();
                if jobs.by_vps.get(&key).map(|j| j.ticket) == Some(ticket) {
                    jobs.by_vps.remove(&key);
                }
            }
            apply();
        });

        if let Some(previous) = jobs.by_vps.insert(vps_id.to_string(), Job { ticket, handle }) {
            previous.handle.abort();
            debug!("Replaced pending transition for VPS {}", vps_id);
        }
    }

    /// Abort the pending job for `vps_id`. Returns whether one was pending.
    pub fn cancel(&self, vps_id: &str) -> bool {
        match self.jobs.lock().by_vps.remove(vps_id) {
            Some(job) => {
                job.handle.abort();
                debug!("Cancelled pending transition for VPS {}", vps_id);
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, vps_id: &str) -> bool {
        self.jobs
            .lock()
            .by_vps
            .get(vps_id)
            .map_or(false, |j| !j.handle.is_finished())
    }

    pub fn pending_count(&self) -> usize {
        self.jobs.lock().by_vps.len()
    }

    /// Abort everything, used on shutdown
    pub fn cancel_all(&self) {
        for (_, job) in self.jobs.lock().by_vps.drain() {
            job.handle.abort();
        }
    }
}
