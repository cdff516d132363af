use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

use super::pool::WorkerPool;
use crate::models::aoi::AoiId;
use crate::models::job::Job;

/// Result of asking the dispatcher to check an AOI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted,
    /// A check for this AOI is already queued or running.
    RejectedDuplicate,
}

/// AOI ids that have been accepted and not yet released.
#[derive(Default)]
struct InFlightSet {
    ids: Mutex<HashSet<AoiId>>,
    idle: Notify,
}

impl InFlightSet {
    fn lock(&self) -> MutexGuard<'_, HashSet<AoiId>> {
        // A panic while holding the lock cannot leave the set half-updated.
        self.ids.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn try_acquire(self: &Arc<Self>, aoi_id: AoiId) -> Option<InFlightGuard> {
        let mut ids = self.lock();
        if !ids.insert(aoi_id) {
            return None;
        }
        metrics::gauge!("aoi_checks_in_flight").set(ids.len() as f64);

        Some(InFlightGuard {
            set: Arc::clone(self),
            aoi_id,
        })
    }

    fn release(&self, aoi_id: AoiId) {
        let remaining = {
            let mut ids = self.lock();
            ids.remove(&aoi_id);
            ids.len()
        };
        metrics::gauge!("aoi_checks_in_flight").set(remaining as f64);

        if remaining == 0 {
            self.idle.notify_waiters();
        }
    }
}

/// Holds an AOI's slot in the in-flight set. Dropping it releases the slot,
/// including when the job fails or its task panics.
pub struct InFlightGuard {
    set: Arc<InFlightSet>,
    aoi_id: AoiId,
}

impl InFlightGuard {
    pub fn aoi_id(&self) -> AoiId {
        self.aoi_id
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.release(self.aoi_id);
        tracing::trace!(aoi_id = %self.aoi_id, "Released in-flight slot");
    }
}

/// Single-flight gate in front of the worker pool.
///
/// Every submission path (scheduler, manual triggers) goes through
/// [`Dispatcher::submit`], so at most one check per AOI exists at a time.
pub struct Dispatcher {
    in_flight: Arc<InFlightSet>,
    pool: WorkerPool,
}

impl Dispatcher {
    pub fn new(pool: WorkerPool) -> Self {
        Self {
            in_flight: Arc::new(InFlightSet::default()),
            pool,
        }
    }

    /// Hand an AOI check to the worker pool unless one is already in flight.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, aoi_id: AoiId) -> SubmitOutcome {
        let Some(guard) = self.in_flight.try_acquire(aoi_id) else {
            tracing::debug!(aoi_id = %aoi_id, "Check already in flight, rejecting duplicate");
            metrics::counter!("aoi_checks_rejected_total").increment(1);
            return SubmitOutcome::RejectedDuplicate;
        };

        metrics::counter!("aoi_checks_submitted_total").increment(1);
        self.pool.spawn(Job::new(aoi_id), guard);

        SubmitOutcome::Accepted
    }

    /// Number of AOIs currently queued or running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Worker permits not currently held by a running check.
    pub fn available_slots(&self) -> usize {
        self.pool.available_slots()
    }

    pub fn is_in_flight(&self, aoi_id: AoiId) -> bool {
        self.in_flight.lock().contains(&aoi_id)
    }

    /// Resolve once no check is in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.in_flight.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}
