//! Shared mock collaborators for engine integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use repliset::{
    Discovery, EngineConfig, EngineError, EngineResult, NodeClient, PeerSetView, ReconfigPlanner,
    ReplicaRegistry, ReplicaSet, Selection, StateMachine, SyncQueues, SyncRequestBody, UserRecord,
};
use repliset::registry::{EndpointMap, LocalStore};

pub const CN1: &str = "https://cn1.example.com";
pub const CN2: &str = "https://cn2.example.com";
pub const CN3: &str = "https://cn3.example.com";
pub const CN4: &str = "https://cn4.example.com";
pub const CN5: &str = "https://cn5.example.com";
pub const CN6: &str = "https://cn6.example.com";

/// Scripted fleet: per-node health and per-(node, wallet) clocks, plus a
/// recording of every sync request dispatched. Nodes listed in
/// `clocks_unreachable` answer health probes but fail clock queries.
#[derive(Default)]
pub struct MockNet {
    pub down: Mutex<HashSet<String>>,
    pub clocks_unreachable: Mutex<HashSet<String>>,
    pub clocks: Mutex<HashMap<(String, String), i64>>,
    pub syncs: Mutex<Vec<(String, SyncRequestBody)>>,
}

impl MockNet {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_down(&self, endpoint: &str) {
        self.down.lock().unwrap().insert(endpoint.to_string());
    }

    pub fn set_clock(&self, endpoint: &str, wallet: &str, clock: i64) {
        self.clocks
            .lock()
            .unwrap()
            .insert((endpoint.to_string(), wallet.to_string()), clock);
    }

    pub fn sync_requests(&self) -> Vec<(String, SyncRequestBody)> {
        self.syncs.lock().unwrap().clone()
    }
}

#[async_trait]
impl NodeClient for MockNet {
    async fn request_sync(&self, target: &str, body: &SyncRequestBody) -> EngineResult<()> {
        self.syncs
            .lock()
            .unwrap()
            .push((target.to_string(), body.clone()));

        // A dispatched sync lands instantly in this scripted fleet: the
        // target catches up to the source's clock.
        let mut clocks = self.clocks.lock().unwrap();
        for wallet in &body.wallet {
            let source_clock = clocks
                .get(&(body.creator_node_endpoint.clone(), wallet.clone()))
                .copied()
                .unwrap_or(0);
            clocks.insert((target.to_string(), wallet.clone()), source_clock);
        }
        Ok(())
    }

    async fn clock_status(&self, target: &str, wallet: &str) -> EngineResult<i64> {
        if self.down.lock().unwrap().contains(target)
            || self.clocks_unreachable.lock().unwrap().contains(target)
        {
            return Err(EngineError::PeerUnreachable(target.to_string()));
        }
        self.clocks
            .lock()
            .unwrap()
            .get(&(target.to_string(), wallet.to_string()))
            .copied()
            .ok_or_else(|| EngineError::MissingClock(wallet.to_string()))
    }

    async fn batch_clock_status(
        &self,
        target: &str,
        wallets: &[String],
    ) -> EngineResult<HashMap<String, i64>> {
        if self.down.lock().unwrap().contains(target)
            || self.clocks_unreachable.lock().unwrap().contains(target)
        {
            return Err(EngineError::PeerUnreachable(target.to_string()));
        }
        let clocks = self.clocks.lock().unwrap();
        Ok(wallets
            .iter()
            .filter_map(|w| {
                clocks
                    .get(&(target.to_string(), w.clone()))
                    .map(|c| (w.clone(), *c))
            })
            .collect())
    }

    async fn check_health(&self, target: &str) -> EngineResult<()> {
        if self.down.lock().unwrap().contains(target) {
            Err(EngineError::PeerUnreachable(target.to_string()))
        } else {
            Ok(())
        }
    }
}

pub struct MockDiscovery {
    pub users: Vec<UserRecord>,
}

#[async_trait]
impl Discovery for MockDiscovery {
    async fn list_users_for(&self, _: &str) -> EngineResult<Vec<UserRecord>> {
        Ok(self.users.clone())
    }
}

pub struct MockSelection {
    pub candidate: ReplicaSet,
    pub blacklists: Mutex<Vec<Vec<String>>>,
}

impl MockSelection {
    pub fn new(candidate: ReplicaSet) -> Arc<Self> {
        Arc::new(Self {
            candidate,
            blacklists: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Selection for MockSelection {
    async fn auto_select(&self, blacklist: &[String]) -> EngineResult<ReplicaSet> {
        self.blacklists.lock().unwrap().push(blacklist.to_vec());
        Ok(self.candidate.clone())
    }
}

#[derive(Default)]
pub struct MockRegistry {
    pub writes: Mutex<Vec<(u64, u64, [u64; 2])>>,
    /// Number of upcoming writes to reject
    pub fail_next: Mutex<usize>,
}

impl MockRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl ReplicaRegistry for MockRegistry {
    async fn update_replica_set(
        &self,
        user_id: u64,
        primary_id: u64,
        secondary_ids: [u64; 2],
    ) -> EngineResult<()> {
        {
            let mut fail_next = self.fail_next.lock().unwrap();
            if *fail_next > 0 {
                *fail_next -= 1;
                return Err(EngineError::Registry("scripted failure".to_string()));
            }
        }
        self.writes
            .lock()
            .unwrap()
            .push((user_id, primary_id, secondary_ids));
        Ok(())
    }
}

/// Local clock store reading the same scripted fleet as [`MockNet`], keyed
/// by this node's endpoint.
pub struct MockStore {
    pub net: Arc<MockNet>,
    pub self_endpoint: String,
}

#[async_trait]
impl LocalStore for MockStore {
    async fn clock_for(&self, wallet: &str) -> EngineResult<i64> {
        self.net.clock_status(&self.self_endpoint, wallet).await
    }

    async fn clocks_for(&self, wallets: &[String]) -> EngineResult<HashMap<String, i64>> {
        self.net
            .batch_clock_status(&self.self_endpoint, wallets)
            .await
    }
}

pub fn user(id: u64, wallet: &str, primary: &str, s1: Option<&str>, s2: Option<&str>) -> UserRecord {
    UserRecord {
        user_id: id,
        wallet: wallet.to_string(),
        primary: primary.to_string(),
        secondary1: s1.map(str::to_string),
        secondary2: s2.map(str::to_string),
    }
}

pub fn endpoint_map() -> Arc<EndpointMap> {
    Arc::new(EndpointMap::from_entries([
        (CN1.to_string(), 1),
        (CN2.to_string(), 2),
        (CN3.to_string(), 3),
        (CN4.to_string(), 4),
        (CN5.to_string(), 5),
        (CN6.to_string(), 6),
    ]))
}

pub struct Harness {
    pub machine: StateMachine,
    pub net: Arc<MockNet>,
    pub queues: Arc<SyncQueues>,
    pub registry: Arc<MockRegistry>,
    pub selection: Arc<MockSelection>,
}

pub fn default_candidate() -> ReplicaSet {
    ReplicaSet::new(CN4, CN5, CN6)
}

/// Wire a full engine over mocks with zero sync workers, so enqueued jobs
/// stay pending and countable.
pub fn harness(users: Vec<UserRecord>, initial_slice: u64) -> Harness {
    harness_opts(users, initial_slice, default_candidate(), 0, 0)
}

pub fn harness_opts(
    users: Vec<UserRecord>,
    initial_slice: u64,
    candidate: ReplicaSet,
    manual_workers: usize,
    recurring_workers: usize,
) -> Harness {
    let net = MockNet::new();
    let config = EngineConfig {
        max_manual_sync_concurrency: manual_workers,
        max_recurring_sync_concurrency: recurring_workers,
        sync_monitoring_retry_delay_ms: 5,
        max_sync_monitoring_duration_ms: 50,
        ..EngineConfig::new(CN1, 1)
    };

    let store = Arc::new(MockStore {
        net: net.clone(),
        self_endpoint: CN1.to_string(),
    });
    let queues = SyncQueues::start(&config, net.clone(), store.clone());
    let view = PeerSetView::new(CN1, Arc::new(MockDiscovery { users }), net.clone());

    let selection = MockSelection::new(candidate);
    let registry = MockRegistry::new();
    let planner = ReconfigPlanner::new(
        selection.clone(),
        registry.clone(),
        net.clone(),
        endpoint_map(),
        queues.clone(),
    );

    let machine = StateMachine::new(config, view, queues.clone(), planner, store)
        .with_initial_slice(initial_slice);

    Harness {
        machine,
        net,
        queues,
        registry,
        selection,
    }
}
