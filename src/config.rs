use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Number of user shards. One slice is processed per iteration, so on the
/// production schedule every user is visited once per day.
pub const MODULO_BASE: u64 = 24;

/// Hard deadline for monitoring a single sync's completion.
pub const MAX_SYNC_MONITORING_MS: u64 = 360_000;

/// Delay between clock samples while monitoring a sync.
pub const SYNC_MONITORING_RETRY_DELAY_MS: u64 = 15_000;

/// Delay between state-machine iterations on the production schedule.
pub const PRODUCTION_JOB_DELAY_MS: u64 = 3_600_000;

/// Delay between state-machine iterations in dev mode.
pub const DEV_JOB_DELAY_MS: u64 = 3_000;

/// Timeout for a single peer health probe.
pub const HEALTH_PROBE_TIMEOUT_MS: u64 = 5_000;

/// Configuration for the replica-set state machine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Metadata-only nodes do not replicate user content; the engine is
    /// disabled on them.
    pub is_user_metadata_node: bool,

    /// This node's own base URL, as registered with the fleet
    pub self_endpoint: String,

    /// This node's service-provider id in the registry
    pub sp_id: u64,

    /// Selects the short dev iteration delay instead of the hourly one
    pub dev_mode: bool,

    /// Worker count for the manual (reconfiguration-driven) sync queue
    pub max_manual_sync_concurrency: usize,

    /// Worker count for the recurring (convergence) sync queue
    pub max_recurring_sync_concurrency: usize,

    /// Maximum clock distance a single export covers. A secondary further
    /// behind than this needs more than one sync to catch up.
    pub max_export_clock_range: i64,

    /// Delay between clock samples while monitoring a sync
    pub sync_monitoring_retry_delay_ms: u64,

    /// Hard deadline for monitoring a single sync
    pub max_sync_monitoring_duration_ms: u64,

    /// Timeout for a single peer health probe
    pub health_probe_timeout_ms: u64,
}

impl EngineConfig {
    pub fn new(self_endpoint: impl Into<String>, sp_id: u64) -> Self {
        Self {
            self_endpoint: self_endpoint.into(),
            sp_id,
            ..Self::default()
        }
    }

    /// Delay between state-machine iterations
    pub fn job_delay(&self) -> Duration {
        if self.dev_mode {
            Duration::from_millis(DEV_JOB_DELAY_MS)
        } else {
            Duration::from_millis(PRODUCTION_JOB_DELAY_MS)
        }
    }

    pub fn sync_monitoring_retry_delay(&self) -> Duration {
        Duration::from_millis(self.sync_monitoring_retry_delay_ms)
    }

    pub fn max_sync_monitoring_duration(&self) -> Duration {
        Duration::from_millis(self.max_sync_monitoring_duration_ms)
    }

    pub fn health_probe_timeout(&self) -> Duration {
        Duration::from_millis(self.health_probe_timeout_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            is_user_metadata_node: false,
            self_endpoint: String::new(),
            sp_id: 0,
            dev_mode: false,
            max_manual_sync_concurrency: 3,
            max_recurring_sync_concurrency: 3,
            max_export_clock_range: 10_000,
            sync_monitoring_retry_delay_ms: SYNC_MONITORING_RETRY_DELAY_MS,
            max_sync_monitoring_duration_ms: MAX_SYNC_MONITORING_MS,
            health_probe_timeout_ms: HEALTH_PROBE_TIMEOUT_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = EngineConfig::default();

        assert!(!config.is_user_metadata_node);
        assert!(!config.dev_mode);
        assert_eq!(config.max_manual_sync_concurrency, 3);
        assert_eq!(config.max_recurring_sync_concurrency, 3);
        assert_eq!(config.sync_monitoring_retry_delay_ms, 15_000);
        assert_eq!(config.max_sync_monitoring_duration_ms, 360_000);
    }

    #[test]
    fn test_job_delay_selects_schedule() {
        let mut config = EngineConfig::new("https://cn1.example.com", 1);
        assert_eq!(config.job_delay(), Duration::from_millis(3_600_000));

        config.dev_mode = true;
        assert_eq!(config.job_delay(), Duration::from_millis(3_000));
    }

    #[test]
    fn test_modulo_base_matches_daily_schedule() {
        // One slice per hour covers the whole user set in a day.
        assert_eq!(MODULO_BASE, 24);
    }

    #[test]
    fn test_config_serialization() {
        let config = EngineConfig::new("https://cn1.example.com", 7);
        let json = serde_json::to_string(&config).unwrap();
        let parsed: EngineConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.self_endpoint, "https://cn1.example.com");
        assert_eq!(parsed.sp_id, 7);
    }
}
