use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::job::{Fingerprint, JobHandle};

/// Index of pending sync jobs, keyed by fingerprint.
///
/// A fingerprint is recorded when its job is enqueued and removed the moment
/// a worker pulls the job (pending → active). An active job therefore never
/// blocks a new pending job for the same fingerprint.
#[derive(Debug, Default)]
pub struct SyncDeduper {
    pending: DashMap<Fingerprint, JobHandle>,
}

impl SyncDeduper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the handle if its fingerprint is absent. Returns whether the
    /// insert happened.
    pub fn try_record(&self, handle: &JobHandle) -> bool {
        match self.pending.entry(handle.fingerprint().clone()) {
            Entry::Vacant(entry) => {
                entry.insert(handle.clone());
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub fn lookup(&self, fingerprint: &Fingerprint) -> Option<JobHandle> {
        self.pending.get(fingerprint).map(|h| h.clone())
    }

    pub fn remove(&self, fingerprint: &Fingerprint) {
        self.pending.remove(fingerprint);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
