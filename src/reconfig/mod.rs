//! Replica-set reconfiguration
//!
//! When a scan finds unhealthy replicas for a user, the planner asks the
//! selection collaborator for fresh candidates, classifies the surviving
//! replicas, seeds the new nodes with manual syncs, and persists the new
//! assignment through the registry. Data preservation rule: with two
//! survivors, the one holding the higher clock becomes the new primary.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::client::NodeClient;
use crate::error::EngineResult;
use crate::queue::{SyncKind, SyncQueues};
use crate::registry::{Endpoint, EndpointMap, ReplicaRegistry, ReplicaSet, Selection, UserRecord};

/// One user's reconfiguration request, built during a scan pass.
///
/// Ephemeral: lives only for the iteration that produced it.
#[derive(Debug, Clone)]
pub struct ReconfigOp {
    pub user_id: u64,
    pub wallet: String,
    pub primary: Endpoint,
    pub secondary1: Option<Endpoint>,
    pub secondary2: Option<Endpoint>,
    pub unhealthy: HashSet<Endpoint>,
}

impl ReconfigOp {
    pub fn from_user(user: &UserRecord, unhealthy: HashSet<Endpoint>) -> Self {
        Self {
            user_id: user.user_id,
            wallet: user.wallet.clone(),
            primary: user.primary.clone(),
            secondary1: user.secondary1.clone(),
            secondary2: user.secondary2.clone(),
            unhealthy,
        }
    }

    /// Assigned replicas in (primary, secondary1, secondary2) order
    pub fn current_replicas(&self) -> Vec<Endpoint> {
        let mut out = vec![self.primary.clone()];
        if let Some(ref s1) = self.secondary1 {
            out.push(s1.clone());
        }
        if let Some(ref s2) = self.secondary2 {
            out.push(s2.clone());
        }
        out
    }

    /// Replicas not marked unhealthy, in enumeration order
    pub fn healthy_replicas(&self) -> Vec<Endpoint> {
        self.current_replicas()
            .into_iter()
            .filter(|r| !self.unhealthy.contains(r))
            .collect()
    }
}

/// Decides and persists new replica sets for users with unhealthy members
pub struct ReconfigPlanner {
    selection: Arc<dyn Selection>,
    registry: Arc<dyn ReplicaRegistry>,
    client: Arc<dyn NodeClient>,
    endpoints: Arc<EndpointMap>,
    queues: Arc<SyncQueues>,
}

impl ReconfigPlanner {
    pub fn new(
        selection: Arc<dyn Selection>,
        registry: Arc<dyn ReplicaRegistry>,
        client: Arc<dyn NodeClient>,
        endpoints: Arc<EndpointMap>,
        queues: Arc<SyncQueues>,
    ) -> Self {
        Self {
            selection,
            registry,
            client,
            endpoints,
            queues,
        }
    }

    /// Run one reconfiguration.
    ///
    /// Returns `Ok(None)` when the user needs no action (no unhealthy
    /// replicas). Errors are the caller's to log; the next periodic pass
    /// re-observes the same state and retries.
    pub async fn execute(&self, op: &ReconfigOp) -> EngineResult<Option<ReplicaSet>> {
        if op.unhealthy.is_empty() {
            return Ok(None);
        }

        let blacklist = op.current_replicas();
        let candidate = self.selection.auto_select(&blacklist).await?;
        let [r1, r2] = candidate.secondaries.clone();
        let r0 = candidate.primary.clone();

        let healthy = op.healthy_replicas();
        debug!(
            "Reconfiguring user {}: {} healthy of {} assigned, candidate primary {}",
            op.user_id,
            healthy.len(),
            blacklist.len(),
            r0
        );

        // Seed syncs are (source, target) pairs; the new set and the seeds
        // depend on how many replicas survived.
        let (new_set, seeds): (ReplicaSet, Vec<(Endpoint, Endpoint)>) = match healthy.len() {
            // Total loss: adopt the full candidate set, seed everything from
            // the old primary.
            0 => (
                ReplicaSet::new(r0.clone(), r1.clone(), r2.clone()),
                vec![
                    (op.primary.clone(), r0),
                    (op.primary.clone(), r1),
                    (op.primary.clone(), r2),
                ],
            ),
            // One survivor: the original primary keeps its role, two fresh
            // secondaries get seeded from it.
            1 => (
                ReplicaSet::new(op.primary.clone(), r0.clone(), r1.clone()),
                vec![(op.primary.clone(), r0), (op.primary.clone(), r1)],
            ),
            // Two survivors: the one with the higher clock becomes primary
            // so no writes are lost; ties go to the first enumerated.
            2 => {
                let first = healthy[0].clone();
                let second = healthy[1].clone();
                let first_clock = self.client.clock_status(&first, &op.wallet).await?;
                let second_clock = self.client.clock_status(&second, &op.wallet).await?;

                let (winner, other) = if second_clock > first_clock {
                    (second, first)
                } else {
                    (first, second)
                };

                (
                    ReplicaSet::new(winner.clone(), other.clone(), r0.clone()),
                    vec![(winner.clone(), other), (winner, r0)],
                )
            }
            _ => return Ok(None),
        };

        for (source, target) in seeds {
            self.queues
                .enqueue(SyncKind::Manual, op.wallet.clone(), source, target, true)?;
        }

        let primary_id = self.endpoints.sp_id(&new_set.primary)?;
        let secondary_ids = [
            self.endpoints.sp_id(&new_set.secondaries[0])?,
            self.endpoints.sp_id(&new_set.secondaries[1])?,
        ];
        self.registry
            .update_replica_set(op.user_id, primary_id, secondary_ids)
            .await?;

        info!(
            "Replica set for user {} updated: primary {} secondaries [{}, {}]",
            op.user_id, new_set.primary, new_set.secondaries[0], new_set.secondaries[1]
        );
        Ok(Some(new_set))
    }
}
