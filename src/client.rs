//! Outbound HTTP client for peer storage nodes
//!
//! All engine traffic to other nodes goes through the [`NodeClient`] trait:
//! sync dispatch, single and batched clock queries, and health probes. The
//! trait exists so tests can substitute a scripted transport.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{EngineError, EngineResult};
use crate::queue::SyncKind;

/// Body of `POST {target}/sync`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncRequestBody {
    pub wallet: Vec<String>,
    pub creator_node_endpoint: String,
    pub sync_type: SyncKind,
    pub immediate: bool,
}

#[derive(Debug, Deserialize)]
struct ClockStatusResponse {
    data: ClockStatusData,
}

#[derive(Debug, Deserialize)]
struct ClockStatusData {
    #[serde(rename = "clockValue")]
    clock_value: i64,
}

#[derive(Debug, Serialize)]
struct BatchClockRequest {
    #[serde(rename = "walletPublicKeys")]
    wallet_public_keys: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct BatchClockResponse {
    data: BatchClockData,
}

#[derive(Debug, Deserialize)]
struct BatchClockData {
    users: Vec<BatchClockEntry>,
}

#[derive(Debug, Deserialize)]
struct BatchClockEntry {
    #[serde(rename = "walletPublicKey")]
    wallet_public_key: String,
    clock: i64,
}

/// HTTP surface of a peer storage node
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// `POST {target}/sync` — ask the target to pull from the source node
    async fn request_sync(&self, target: &str, body: &SyncRequestBody) -> EngineResult<()>;

    /// `GET {target}/users/clock_status/{wallet}`
    async fn clock_status(&self, target: &str, wallet: &str) -> EngineResult<i64>;

    /// `POST {target}/users/batch_clock_status`
    async fn batch_clock_status(
        &self,
        target: &str,
        wallets: &[String],
    ) -> EngineResult<HashMap<String, i64>>;

    /// Health probe; any transport failure or non-2xx is unhealthy
    async fn check_health(&self, target: &str) -> EngineResult<()>;
}

/// reqwest-backed [`NodeClient`]
pub struct HttpNodeClient {
    http: Client,
    health_timeout: Duration,
}

impl HttpNodeClient {
    pub fn new(health_timeout: Duration) -> EngineResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            health_timeout,
        })
    }

    fn url(target: &str, path: &str) -> String {
        format!("{}/{}", target.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl NodeClient for HttpNodeClient {
    async fn request_sync(&self, target: &str, body: &SyncRequestBody) -> EngineResult<()> {
        self.http
            .post(Self::url(target, "sync"))
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn clock_status(&self, target: &str, wallet: &str) -> EngineResult<i64> {
        let response: ClockStatusResponse = self
            .http
            .get(Self::url(target, &format!("users/clock_status/{wallet}")))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.data.clock_value)
    }

    async fn batch_clock_status(
        &self,
        target: &str,
        wallets: &[String],
    ) -> EngineResult<HashMap<String, i64>> {
        let body = BatchClockRequest {
            wallet_public_keys: wallets.to_vec(),
        };
        let response: BatchClockResponse = self
            .http
            .post(Self::url(target, "users/batch_clock_status"))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response
            .data
            .users
            .into_iter()
            .map(|e| (e.wallet_public_key, e.clock))
            .collect())
    }

    async fn check_health(&self, target: &str) -> EngineResult<()> {
        let response = self
            .http
            .get(Self::url(target, "health_check"))
            .timeout(self.health_timeout)
            .send()
            .await
            .map_err(|e| EngineError::PeerUnreachable(format!("{target}: {e}")))?;

        if !response.status().is_success() {
            return Err(EngineError::PeerUnreachable(format!(
                "{target}: status {}",
                response.status()
            )));
        }
        Ok(())
    }
}
