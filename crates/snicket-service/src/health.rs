use jiff::Timestamp;
use serde::Serialize;
use snicket_core::Store;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Code probed to time the storage backend; never stored.
const PROBE_CODE: &str = "health-check";

/// Probes slower than this mark the backend degraded.
const DEGRADED_THRESHOLD: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// Timing of a single storage probe.
#[derive(Debug, Clone, Serialize)]
pub struct StorageHealth {
    pub status: HealthStatus,
    pub duration: String,
}

/// A point-in-time health snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub timestamp: Timestamp,
    pub uptime: String,
    pub storage: StorageHealth,
}

/// Answers health checks by timing a throwaway lookup against the store.
pub struct HealthService<S> {
    store: Arc<S>,
    started: Instant,
}

impl<S: Store> HealthService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            started: Instant::now(),
        }
    }

    /// Runs one probe and reports its timing.
    ///
    /// A probe that errors or overruns [`DEGRADED_THRESHOLD`] degrades the
    /// overall status; the service never reports hard-down, since the
    /// caller reaching us is itself a sign of life.
    pub async fn check(&self) -> HealthReport {
        let probe_started = Instant::now();
        let probe = self.store.code_exists(PROBE_CODE).await;
        let elapsed = probe_started.elapsed();

        let status = match &probe {
            Ok(_) if elapsed <= DEGRADED_THRESHOLD => HealthStatus::Healthy,
            Ok(_) => {
                warn!(?elapsed, "storage probe is slow");
                HealthStatus::Degraded
            }
            Err(e) => {
                warn!(error = %e, "storage probe failed");
                HealthStatus::Degraded
            }
        };

        HealthReport {
            status,
            timestamp: Timestamp::now(),
            uptime: format!("{:?}", self.started.elapsed()),
            storage: StorageHealth {
                status,
                duration: format!("{:?}", elapsed),
            },
        }
    }
}
