use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::client::NodeClient;

/// Result of monitoring one sync dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The secondary reached or passed the primary clock
    CaughtUp,
    /// The secondary still trails the primary; a successor job is needed
    AdditionalSyncRequired,
}

#[derive(Debug, Clone)]
pub struct MonitorParams {
    pub retry_delay: Duration,
    pub max_duration: Duration,
    pub max_export_clock_range: i64,
}

/// Polls the target's clock until it catches up with `primary_clock` or the
/// deadline expires.
///
/// Each sample is judged against the primary clock captured before the push:
/// a gap wider than one export window means the target needs another sync to
/// continue the walk, so monitoring stops early. Transport errors during
/// polling are tolerated until the deadline.
pub async fn monitor_sync_completion(
    client: &dyn NodeClient,
    target: &str,
    wallet: &str,
    primary_clock: i64,
    params: &MonitorParams,
) -> SyncOutcome {
    let deadline = Instant::now() + params.max_duration;

    loop {
        tokio::time::sleep(params.retry_delay).await;
        if Instant::now() >= deadline {
            debug!(
                "Sync monitoring deadline expired for {} on {}",
                wallet, target
            );
            return SyncOutcome::AdditionalSyncRequired;
        }

        match client.clock_status(target, wallet).await {
            Ok(secondary_clock) => {
                if secondary_clock.saturating_add(params.max_export_clock_range) < primary_clock {
                    debug!(
                        "Clock gap for {} on {} exceeds one export window ({} < {})",
                        wallet, target, secondary_clock, primary_clock
                    );
                    return SyncOutcome::AdditionalSyncRequired;
                }
                if secondary_clock >= primary_clock {
                    return SyncOutcome::CaughtUp;
                }
            }
            Err(e) => {
                debug!("Clock poll failed for {} on {}: {}", wallet, target, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::SyncRequestBody;
    use crate::error::{EngineError, EngineResult};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted clock source: returns samples in order, repeating the last.
    struct ScriptedClocks {
        samples: Mutex<Vec<EngineResult<i64>>>,
    }

    impl ScriptedClocks {
        fn new(samples: Vec<EngineResult<i64>>) -> Self {
            Self {
                samples: Mutex::new(samples),
            }
        }
    }

    #[async_trait]
    impl NodeClient for ScriptedClocks {
        async fn request_sync(&self, _: &str, _: &SyncRequestBody) -> EngineResult<()> {
            Ok(())
        }

        async fn clock_status(&self, _: &str, _: &str) -> EngineResult<i64> {
            let mut samples = self.samples.lock().unwrap();
            if samples.len() > 1 {
                samples.remove(0)
            } else {
                match &samples[0] {
                    Ok(v) => Ok(*v),
                    Err(_) => Err(EngineError::PeerUnreachable("scripted".to_string())),
                }
            }
        }

        async fn batch_clock_status(
            &self,
            _: &str,
            _: &[String],
        ) -> EngineResult<HashMap<String, i64>> {
            Ok(HashMap::new())
        }

        async fn check_health(&self, _: &str) -> EngineResult<()> {
            Ok(())
        }
    }

    fn params() -> MonitorParams {
        MonitorParams {
            retry_delay: Duration::from_millis(5),
            max_duration: Duration::from_millis(200),
            max_export_clock_range: 100,
        }
    }

    #[tokio::test]
    async fn test_caught_up_when_equal() {
        let client = ScriptedClocks::new(vec![Ok(10)]);
        let outcome = monitor_sync_completion(&client, "https://cn2", "0xa", 10, &params()).await;
        assert_eq!(outcome, SyncOutcome::CaughtUp);
    }

    #[tokio::test]
    async fn test_caught_up_when_ahead() {
        let client = ScriptedClocks::new(vec![Ok(12)]);
        let outcome = monitor_sync_completion(&client, "https://cn2", "0xa", 10, &params()).await;
        assert_eq!(outcome, SyncOutcome::CaughtUp);
    }

    #[tokio::test]
    async fn test_export_window_gap_stops_early() {
        // 500 + 100 < 1000: more than one export behind.
        let client = ScriptedClocks::new(vec![Ok(500)]);
        let outcome = monitor_sync_completion(&client, "https://cn2", "0xa", 1000, &params()).await;
        assert_eq!(outcome, SyncOutcome::AdditionalSyncRequired);
    }

    #[tokio::test]
    async fn test_slow_convergence_then_caught_up() {
        let client = ScriptedClocks::new(vec![Ok(8), Ok(9), Ok(10)]);
        let outcome = monitor_sync_completion(&client, "https://cn2", "0xa", 10, &params()).await;
        assert_eq!(outcome, SyncOutcome::CaughtUp);
    }

    #[tokio::test]
    async fn test_deadline_expiry() {
        // Always one behind, never catches up.
        let client = ScriptedClocks::new(vec![Ok(9)]);
        let outcome = monitor_sync_completion(&client, "https://cn2", "0xa", 10, &params()).await;
        assert_eq!(outcome, SyncOutcome::AdditionalSyncRequired);
    }

    #[tokio::test]
    async fn test_transport_errors_tolerated_until_success() {
        let client = ScriptedClocks::new(vec![
            Err(EngineError::PeerUnreachable("cn2".to_string())),
            Err(EngineError::PeerUnreachable("cn2".to_string())),
            Ok(10),
        ]);
        let outcome = monitor_sync_completion(&client, "https://cn2", "0xa", 10, &params()).await;
        assert_eq!(outcome, SyncOutcome::CaughtUp);
    }
}
