//! HTTP-backed reference collaborators
//!
//! The engine only depends on the traits in [`crate::registry`]; these
//! implementations exist so the daemon binary can run against a discovery
//! service and a registry relay. The relay performs the actual registry
//! write, so no transaction signing happens in this crate.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::client::NodeClient;
use crate::error::{EngineError, EngineResult};
use crate::registry::{
    Discovery, Endpoint, EndpointMap, LocalStore, ReplicaRegistry, ReplicaSet, Selection,
    UserRecord,
};

fn url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path)
}

#[derive(Debug, Deserialize)]
struct UsersResponse {
    data: Vec<UserRecord>,
}

/// Lists users from the discovery service
pub struct HttpDiscovery {
    http: Client,
    discovery_url: String,
}

impl HttpDiscovery {
    pub fn new(http: Client, discovery_url: impl Into<String>) -> Self {
        Self {
            http,
            discovery_url: discovery_url.into(),
        }
    }
}

#[async_trait]
impl Discovery for HttpDiscovery {
    async fn list_users_for(&self, endpoint: &str) -> EngineResult<Vec<UserRecord>> {
        let response: UsersResponse = self
            .http
            .get(url(&self.discovery_url, "users/content_node/all"))
            .query(&[("creator_node_endpoint", endpoint)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.data)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceProvider {
    pub endpoint: Endpoint,
    #[serde(rename = "spID")]
    pub sp_id: u64,
}

#[derive(Debug, Deserialize)]
struct ServiceProvidersResponse {
    data: Vec<ServiceProvider>,
}

async fn list_service_providers(
    http: &Client,
    discovery_url: &str,
) -> EngineResult<Vec<ServiceProvider>> {
    let response: ServiceProvidersResponse = http
        .get(url(discovery_url, "services/content_node"))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(response.data)
}

/// Fetch the process-wide endpoint → service-provider id map. Called once
/// at startup.
pub async fn fetch_endpoint_map(http: &Client, discovery_url: &str) -> EngineResult<EndpointMap> {
    let providers = list_service_providers(http, discovery_url).await?;
    Ok(EndpointMap::from_entries(
        providers.into_iter().map(|p| (p.endpoint, p.sp_id)),
    ))
}

/// Filter the provider list down to selection candidates, preserving
/// registry order.
fn pick_candidates(providers: &[ServiceProvider], blacklist: &[Endpoint]) -> Vec<Endpoint> {
    providers
        .iter()
        .filter(|p| !blacklist.contains(&p.endpoint))
        .map(|p| p.endpoint.clone())
        .collect()
}

/// Proposes fresh replica sets from the registered provider list, probing
/// candidates for health before picking three.
pub struct HttpSelection {
    http: Client,
    discovery_url: String,
    client: Arc<dyn NodeClient>,
}

impl HttpSelection {
    pub fn new(http: Client, discovery_url: impl Into<String>, client: Arc<dyn NodeClient>) -> Self {
        Self {
            http,
            discovery_url: discovery_url.into(),
            client,
        }
    }
}

#[async_trait]
impl Selection for HttpSelection {
    async fn auto_select(&self, blacklist: &[Endpoint]) -> EngineResult<ReplicaSet> {
        let providers = list_service_providers(&self.http, &self.discovery_url).await?;
        let mut chosen = Vec::with_capacity(3);

        for candidate in pick_candidates(&providers, blacklist) {
            if self.client.check_health(&candidate).await.is_ok() {
                chosen.push(candidate);
                if chosen.len() == 3 {
                    break;
                }
            }
        }

        if chosen.len() < 3 {
            return Err(EngineError::Selection(format!(
                "only {} healthy candidates outside the blacklist",
                chosen.len()
            )));
        }

        let mut iter = chosen.into_iter();
        Ok(ReplicaSet {
            primary: iter.next().unwrap_or_default(),
            secondaries: [
                iter.next().unwrap_or_default(),
                iter.next().unwrap_or_default(),
            ],
        })
    }
}

#[derive(Debug, Serialize)]
struct RelayUpdateBody {
    user_id: u64,
    primary_sp_id: u64,
    secondary_sp_ids: [u64; 2],
}

/// Writes replica sets through a registry relay endpoint
pub struct RelayRegistry {
    http: Client,
    relay_url: String,
}

impl RelayRegistry {
    pub fn new(http: Client, relay_url: impl Into<String>) -> Self {
        Self {
            http,
            relay_url: relay_url.into(),
        }
    }
}

#[async_trait]
impl ReplicaRegistry for RelayRegistry {
    async fn update_replica_set(
        &self,
        user_id: u64,
        primary_id: u64,
        secondary_ids: [u64; 2],
    ) -> EngineResult<()> {
        let body = RelayUpdateBody {
            user_id,
            primary_sp_id: primary_id,
            secondary_sp_ids: secondary_ids,
        };
        self.http
            .post(url(&self.relay_url, "relay/update_replica_set"))
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::Registry(e.to_string()))?
            .error_for_status()
            .map_err(|e| EngineError::Registry(e.to_string()))?;
        Ok(())
    }
}

/// [`LocalStore`] over this node's own clock endpoints
pub struct SelfClockStore {
    client: Arc<dyn NodeClient>,
    self_endpoint: Endpoint,
}

impl SelfClockStore {
    pub fn new(client: Arc<dyn NodeClient>, self_endpoint: impl Into<Endpoint>) -> Self {
        Self {
            client,
            self_endpoint: self_endpoint.into(),
        }
    }
}

#[async_trait]
impl LocalStore for SelfClockStore {
    async fn clock_for(&self, wallet: &str) -> EngineResult<i64> {
        self.client.clock_status(&self.self_endpoint, wallet).await
    }

    async fn clocks_for(&self, wallets: &[String]) -> EngineResult<HashMap<String, i64>> {
        self.client
            .batch_clock_status(&self.self_endpoint, wallets)
            .await
    }
}
