use std::collections::HashSet;

use crate::reconfig::ReconfigOp;
use crate::registry::{Endpoint, UserRecord};

/// A (user, healthy secondary) pair that may need a convergence sync once
/// clocks are compared
#[derive(Debug, Clone, PartialEq)]
pub struct PotentialSync {
    pub user_id: u64,
    pub wallet: String,
    pub target: Endpoint,
}

/// Planning result for one user in one scan pass
#[derive(Debug)]
pub struct UserPlan {
    pub potential_syncs: Vec<PotentialSync>,
    pub reconfig: ReconfigOp,
}

/// Classify one user's replicas against the probe results.
///
/// When this node is the user's primary, each healthy secondary becomes a
/// potential convergence sync and each unhealthy one goes into the reconfig
/// request. When this node is a secondary, it only reports unhealthy
/// replicas; convergence is the primary's job. Missing secondary slots are
/// not peers and are never marked unhealthy.
pub fn plan_user(
    self_endpoint: &str,
    user: &UserRecord,
    unhealthy: &HashSet<Endpoint>,
) -> UserPlan {
    let mut unhealthy_replicas = HashSet::new();
    let mut potential_syncs = Vec::new();

    if user.is_primary(self_endpoint) {
        for secondary in [&user.secondary1, &user.secondary2].into_iter().flatten() {
            if unhealthy.contains(secondary) {
                unhealthy_replicas.insert(secondary.clone());
            } else {
                potential_syncs.push(PotentialSync {
                    user_id: user.user_id,
                    wallet: user.wallet.clone(),
                    target: secondary.clone(),
                });
            }
        }
    } else {
        for replica in user.replicas() {
            if replica != self_endpoint && unhealthy.contains(replica) {
                unhealthy_replicas.insert(replica.to_string());
            }
        }
    }

    UserPlan {
        potential_syncs,
        reconfig: ReconfigOp::from_user(user, unhealthy_replicas),
    }
}
