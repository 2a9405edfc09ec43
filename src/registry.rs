//! Core data model and collaborator interfaces
//!
//! The engine owns no durable state. Everything it acts on comes in through
//! the traits defined here: the discovery service that knows which users live
//! on this node, the selection service that proposes fresh replicas, the
//! registry that records replica sets authoritatively, and the local store
//! holding this node's own clock records.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{EngineError, EngineResult};

/// Absolute base URL of a storage node
pub type Endpoint = String;

/// A user and their assigned replica set, as reported by discovery.
///
/// Secondaries may be absent for incomplete replica sets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRecord {
    pub user_id: u64,
    pub wallet: String,
    pub primary: Endpoint,
    pub secondary1: Option<Endpoint>,
    pub secondary2: Option<Endpoint>,
}

impl UserRecord {
    /// All assigned replicas in (primary, secondary1, secondary2) order,
    /// skipping empty slots.
    pub fn replicas(&self) -> Vec<&str> {
        let mut out = vec![self.primary.as_str()];
        if let Some(ref s1) = self.secondary1 {
            out.push(s1.as_str());
        }
        if let Some(ref s2) = self.secondary2 {
            out.push(s2.as_str());
        }
        out
    }

    pub fn is_primary(&self, endpoint: &str) -> bool {
        self.primary == endpoint
    }
}

/// An ordered replica-set assignment: one primary, two secondaries.
///
/// Used both for selection candidates and for the new set a reconfiguration
/// produces.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplicaSet {
    pub primary: Endpoint,
    pub secondaries: [Endpoint; 2],
}

impl ReplicaSet {
    pub fn new(primary: impl Into<Endpoint>, s1: impl Into<Endpoint>, s2: impl Into<Endpoint>) -> Self {
        Self {
            primary: primary.into(),
            secondaries: [s1.into(), s2.into()],
        }
    }
}

/// Process-wide endpoint → service-provider id map.
///
/// Populated once at startup from the registry and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct EndpointMap {
    inner: HashMap<Endpoint, u64>,
}

impl EndpointMap {
    pub fn from_entries(entries: impl IntoIterator<Item = (Endpoint, u64)>) -> Self {
        Self {
            inner: entries.into_iter().collect(),
        }
    }

    pub fn sp_id(&self, endpoint: &str) -> EngineResult<u64> {
        self.inner
            .get(endpoint)
            .copied()
            .ok_or_else(|| EngineError::UnknownEndpoint(endpoint.to_string()))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Lists the users a given node is responsible for
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Every user whose primary or secondary is `endpoint`
    async fn list_users_for(&self, endpoint: &str) -> EngineResult<Vec<UserRecord>>;
}

/// Proposes a fresh replica set, excluding blacklisted endpoints.
///
/// Tie-breaking and geographic placement are this collaborator's concern;
/// the engine only consumes the result.
#[async_trait]
pub trait Selection: Send + Sync {
    async fn auto_select(&self, blacklist: &[Endpoint]) -> EngineResult<ReplicaSet>;
}

/// Writes replica-set assignments to the authoritative registry
#[async_trait]
pub trait ReplicaRegistry: Send + Sync {
    async fn update_replica_set(
        &self,
        user_id: u64,
        primary_id: u64,
        secondary_ids: [u64; 2],
    ) -> EngineResult<()>;
}

/// This node's own clock records, one counter per wallet
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn clock_for(&self, wallet: &str) -> EngineResult<i64>;

    async fn clocks_for(&self, wallets: &[String]) -> EngineResult<HashMap<String, i64>>;
}
