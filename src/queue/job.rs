use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::client::SyncRequestBody;
use crate::registry::Endpoint;

/// Which queue a sync job belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncKind {
    /// Urgent push, used to seed fresh replicas during reconfiguration
    Manual,
    /// Convergence push from the periodic scan
    Recurring,
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncKind::Manual => write!(f, "MANUAL"),
            SyncKind::Recurring => write!(f, "RECURRING"),
        }
    }
}

/// De-duplication key: at most one pending job may exist per fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub kind: SyncKind,
    pub wallet: String,
    pub target: Endpoint,
}

impl Fingerprint {
    pub fn new(kind: SyncKind, wallet: impl Into<String>, target: impl Into<Endpoint>) -> Self {
        Self {
            kind,
            wallet: wallet.into(),
            target: target.into(),
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.kind, self.wallet, self.target)
    }
}

/// A queued sync dispatch: push `wallet` from `source` to `target`
#[derive(Debug, Clone)]
pub struct SyncJob {
    pub kind: SyncKind,
    pub wallet: String,
    pub source: Endpoint,
    pub target: Endpoint,
    pub immediate: bool,
    pub enqueued_at: DateTime<Utc>,
}

impl SyncJob {
    pub fn new(
        kind: SyncKind,
        wallet: impl Into<String>,
        source: impl Into<Endpoint>,
        target: impl Into<Endpoint>,
        immediate: bool,
    ) -> Self {
        Self {
            kind,
            wallet: wallet.into(),
            source: source.into(),
            target: target.into(),
            immediate,
            enqueued_at: Utc::now(),
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new(self.kind, self.wallet.clone(), self.target.clone())
    }

    /// Wire body for `POST {target}/sync`
    pub fn request_body(&self) -> SyncRequestBody {
        SyncRequestBody {
            wallet: vec![self.wallet.clone()],
            creator_node_endpoint: self.source.clone(),
            sync_type: self.kind,
            immediate: self.immediate,
        }
    }
}

#[derive(Debug)]
struct HandleInner {
    id: Uuid,
    fingerprint: Fingerprint,
}

/// Handle to a pending sync job.
///
/// Enqueuing a fingerprint that is already pending returns a clone of the
/// original handle, so callers can compare handles to detect de-duplication.
#[derive(Debug, Clone)]
pub struct JobHandle(Arc<HandleInner>);

impl JobHandle {
    pub fn new(fingerprint: Fingerprint) -> Self {
        Self(Arc::new(HandleInner {
            id: Uuid::new_v4(),
            fingerprint,
        }))
    }

    pub fn id(&self) -> Uuid {
        self.0.id
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.0.fingerprint
    }
}

impl PartialEq for JobHandle {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for JobHandle {}
