use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use crate::client::NodeClient;
use crate::error::{EngineError, EngineResult};
use crate::registry::{Discovery, Endpoint, UserRecord};

/// This node's view of its users and their peers.
///
/// Wraps the discovery collaborator and the node client behind the three
/// queries the state machine needs per iteration.
pub struct PeerSetView {
    self_endpoint: Endpoint,
    discovery: Arc<dyn Discovery>,
    client: Arc<dyn NodeClient>,
}

impl PeerSetView {
    pub fn new(
        self_endpoint: impl Into<Endpoint>,
        discovery: Arc<dyn Discovery>,
        client: Arc<dyn NodeClient>,
    ) -> Self {
        Self {
            self_endpoint: self_endpoint.into(),
            discovery,
            client,
        }
    }

    pub fn self_endpoint(&self) -> &str {
        &self.self_endpoint
    }

    /// Every user whose primary or secondary is this node. Failure here is
    /// fatal for the iteration.
    pub async fn list_users(&self) -> EngineResult<Vec<UserRecord>> {
        self.discovery.list_users_for(&self.self_endpoint).await
    }

    /// Probe the union of peer endpoints appearing in `users` (self
    /// excluded), one concurrent probe per endpoint. Returns the subset that
    /// failed.
    pub async fn unhealthy_peers(&self, users: &[UserRecord]) -> HashSet<Endpoint> {
        let endpoints: HashSet<&str> = users
            .iter()
            .flat_map(|u| u.replicas())
            .filter(|ep| *ep != self.self_endpoint)
            .collect();

        let probes = endpoints.into_iter().map(|ep| {
            let client = self.client.clone();
            async move { (ep.to_string(), client.check_health(ep).await) }
        });

        let mut unhealthy = HashSet::new();
        for (endpoint, result) in join_all(probes).await {
            if let Err(e) = result {
                debug!("Peer {} failed health probe: {}", endpoint, e);
                unhealthy.insert(endpoint);
            }
        }
        unhealthy
    }

    /// One batched clock query per target secondary, issued concurrently.
    ///
    /// A failure of any single batch fails the whole call: writing sync
    /// decisions from partial clock data is worse than skipping the
    /// iteration.
    pub async fn fetch_clock_map(
        &self,
        wallets_by_secondary: &HashMap<Endpoint, Vec<String>>,
    ) -> EngineResult<HashMap<Endpoint, HashMap<String, i64>>> {
        let fetches = wallets_by_secondary.iter().map(|(endpoint, wallets)| {
            let client = self.client.clone();
            async move {
                let clocks = client.batch_clock_status(endpoint, wallets).await;
                (endpoint.clone(), clocks)
            }
        });

        let mut out = HashMap::new();
        for (endpoint, result) in join_all(fetches).await {
            match result {
                Ok(clocks) => {
                    out.insert(endpoint, clocks);
                }
                Err(e) => {
                    return Err(EngineError::DataFetch(format!(
                        "batch clock fetch from {endpoint} failed: {e}"
                    )));
                }
            }
        }
        Ok(out)
    }
}
