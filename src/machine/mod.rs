//! Periodic replica-set state machine
//!
//! One cooperative task scans a deterministic shard of this node's users
//! each iteration, probes replica health, enqueues convergence syncs for
//! stale secondaries and hands users with unhealthy replicas to the
//! reconfiguration planner. Iterations never overlap; the shard slice
//! advances by one after every pass regardless of outcome.

pub mod audit;
pub mod plan;

pub use plan::{plan_user, PotentialSync, UserPlan};

use rand::Rng;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::{EngineConfig, MODULO_BASE};
use crate::error::{EngineError, EngineResult};
use crate::fleet::PeerSetView;
use crate::queue::{SyncKind, SyncQueues};
use crate::reconfig::{ReconfigOp, ReconfigPlanner};
use crate::registry::LocalStore;
use audit::DecisionTree;

/// Outcome of one iteration, for the audit log and for tests
#[derive(Debug, Clone, PartialEq)]
pub struct IterationSummary {
    pub slice: u64,
    pub users_on_slice: usize,
    pub syncs_enqueued: usize,
    pub reconfigs_issued: usize,
}

pub struct StateMachine {
    config: EngineConfig,
    view: PeerSetView,
    queues: Arc<SyncQueues>,
    planner: ReconfigPlanner,
    store: Arc<dyn LocalStore>,
    slice: u64,
}

impl StateMachine {
    pub fn new(
        config: EngineConfig,
        view: PeerSetView,
        queues: Arc<SyncQueues>,
        planner: ReconfigPlanner,
        store: Arc<dyn LocalStore>,
    ) -> Self {
        let slice = rand::thread_rng().gen_range(0..MODULO_BASE);
        Self {
            config,
            view,
            queues,
            planner,
            store,
            slice,
        }
    }

    /// Pin the starting slice instead of randomizing it
    pub fn with_initial_slice(mut self, slice: u64) -> Self {
        self.slice = slice % MODULO_BASE;
        self
    }

    pub fn current_slice(&self) -> u64 {
        self.slice
    }

    /// Run the periodic loop. Never returns under normal operation; on a
    /// metadata-only node the engine is disabled and returns immediately.
    pub async fn run(mut self) {
        if self.config.is_user_metadata_node {
            info!("Replica-set engine disabled on metadata node");
            return;
        }

        let delay = self.config.job_delay();
        info!(
            "Replica-set engine starting at slice {} with {:?} between iterations",
            self.slice, delay
        );

        loop {
            if let Err(e) = self.run_iteration().await {
                error!("Iteration failed: {}", e);
            }
            tokio::time::sleep(delay).await;
        }
    }

    /// Execute one full pass over the current slice, then advance the
    /// slice. The slice advances on failure too, so a pathological shard
    /// cannot wedge the schedule.
    pub async fn run_iteration(&mut self) -> EngineResult<IterationSummary> {
        let slice = self.slice;
        let mut tree = DecisionTree::new(format!("slice {slice}"));

        let result = self.run_slice(slice, &mut tree).await;
        if let Err(ref e) = result {
            tree.record_error("iteration", e);
        }
        tree.emit();

        self.slice = (slice + 1) % MODULO_BASE;
        result
    }

    async fn run_slice(
        &self,
        slice: u64,
        tree: &mut DecisionTree,
    ) -> EngineResult<IterationSummary> {
        // 1. Shard.
        let users = self
            .view
            .list_users()
            .await
            .map_err(|e| EngineError::DataFetch(format!("user listing failed: {e}")))?;
        let total = users.len();
        let users: Vec<_> = users
            .into_iter()
            .filter(|u| u.user_id % MODULO_BASE == slice)
            .collect();
        tree.record(
            "select_slice",
            json!({ "slice": slice, "users": users.len(), "total": total }),
        );

        // 2. Probe.
        let unhealthy = self.view.unhealthy_peers(&users).await;
        tree.record("probe_health", json!({ "unhealthy": unhealthy.len() }));

        // 3. Plan.
        let self_endpoint = self.view.self_endpoint().to_string();
        let mut potential_syncs = Vec::new();
        let mut reconfig_ops: Vec<ReconfigOp> = Vec::new();
        for user in &users {
            let plan = plan_user(&self_endpoint, user, &unhealthy);
            potential_syncs.extend(plan.potential_syncs);
            reconfig_ops.push(plan.reconfig);
        }
        tree.record(
            "plan",
            json!({
                "potential_syncs": potential_syncs.len(),
                "users_with_unhealthy": reconfig_ops
                    .iter()
                    .filter(|op| !op.unhealthy.is_empty())
                    .count(),
            }),
        );

        // 4. Group by target secondary and fetch clocks.
        let mut wallets_by_secondary: HashMap<String, Vec<String>> = HashMap::new();
        for sync in &potential_syncs {
            wallets_by_secondary
                .entry(sync.target.clone())
                .or_default()
                .push(sync.wallet.clone());
        }
        let secondary_clocks = self.view.fetch_clock_map(&wallets_by_secondary).await?;

        let wallets: Vec<String> = potential_syncs.iter().map(|s| s.wallet.clone()).collect();
        let local_clocks = self
            .store
            .clocks_for(&wallets)
            .await
            .map_err(|e| EngineError::DataFetch(format!("local clock fetch failed: {e}")))?;
        tree.record(
            "fetch_clocks",
            json!({ "secondaries": secondary_clocks.len(), "wallets": wallets.len() }),
        );

        // 5. Issue convergence syncs.
        let (issued, errors) = self.issue_sync_requests(
            &potential_syncs,
            &local_clocks,
            &secondary_clocks,
            &self_endpoint,
        );
        tree.record("issue_syncs", json!({ "issued": issued, "errors": errors }));
        if errors > issued {
            return Err(EngineError::SyncIssuing { errors, issued });
        }

        // 6. Reconfigure, one user at a time.
        let mut reconfigs_issued = 0;
        for op in &reconfig_ops {
            match self.planner.execute(op).await {
                Ok(Some(_)) => reconfigs_issued += 1,
                Ok(None) => {}
                Err(e) => {
                    warn!("Reconfiguration for user {} failed: {}", op.user_id, e);
                    tree.record(
                        "reconfig_error",
                        json!({ "user_id": op.user_id, "error": e.to_string() }),
                    );
                }
            }
        }
        tree.record("reconfigure", json!({ "issued": reconfigs_issued }));

        Ok(IterationSummary {
            slice,
            users_on_slice: users.len(),
            syncs_enqueued: issued,
            reconfigs_issued,
        })
    }

    /// Enqueue a recurring sync for every potential target whose reported
    /// clock trails this node's. A missing remote clock counts as infinitely
    /// far behind.
    fn issue_sync_requests(
        &self,
        potential_syncs: &[PotentialSync],
        local_clocks: &HashMap<String, i64>,
        secondary_clocks: &HashMap<String, HashMap<String, i64>>,
        self_endpoint: &str,
    ) -> (usize, usize) {
        let mut issued = 0;
        let mut errors = 0;

        for sync in potential_syncs {
            let Some(primary_clock) = local_clocks.get(&sync.wallet).copied() else {
                warn!("No local clock for wallet {}", sync.wallet);
                errors += 1;
                continue;
            };

            let secondary_clock = secondary_clocks
                .get(&sync.target)
                .and_then(|clocks| clocks.get(&sync.wallet))
                .copied();

            let behind = match secondary_clock {
                Some(clock) => primary_clock > clock,
                None => true,
            };
            if !behind {
                continue;
            }

            match self.queues.enqueue(
                SyncKind::Recurring,
                sync.wallet.clone(),
                self_endpoint.to_string(),
                sync.target.clone(),
                false,
            ) {
                Ok(_) => issued += 1,
                Err(e) => {
                    warn!(
                        "Failed to enqueue recurring sync for {} to {}: {}",
                        sync.wallet, sync.target, e
                    );
                    errors += 1;
                }
            }
        }

        (issued, errors)
    }
}
