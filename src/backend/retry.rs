//! Exponential backoff for conflict/transient-retried backend operations.
//!
//! The generalized form of bindy's `reconcilers::retry::retry_api_call`: the
//! same 100ms-initial / doubling / 10-attempt schedule (spec.md §4.4, §5,
//! §7), but matched against [`BackendError::is_transient`]/`is_conflict`
//! instead of a Kubernetes-specific status code, and with a refresh hook run
//! between attempts on `Conflict` rather than a blind retry.

use crate::constants::{
    INITIAL_RETRY_INTERVAL_MILLIS, MAX_RETRY_ATTEMPTS, RETRY_BACKOFF_MULTIPLIER,
};
use crate::errors::BackendError;
use crate::metrics;
use rand::Rng;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Exponential backoff with optional jitter, mirroring bindy's
/// `ExponentialBackoff` but without a max-elapsed-time cutoff — retry count
/// is the only bound the spec names (§4.4: "up to 10 times").
struct Backoff {
    interval: Duration,
    multiplier: f64,
    jitter_factor: f64,
}

impl Backoff {
    fn new(jitter_factor: f64) -> Self {
        Self {
            interval: Duration::from_millis(INITIAL_RETRY_INTERVAL_MILLIS),
            multiplier: RETRY_BACKOFF_MULTIPLIER,
            jitter_factor,
        }
    }

    fn next(&mut self) -> Duration {
        let current = self.apply_jitter(self.interval);
        let grown = self.interval.as_secs_f64() * self.multiplier;
        self.interval = Duration::from_secs_f64(grown);
        current
    }

    fn apply_jitter(&self, interval: Duration) -> Duration {
        if self.jitter_factor == 0.0 {
            return interval;
        }
        let secs = interval.as_secs_f64();
        let delta = secs * self.jitter_factor;
        let mut rng = rand::thread_rng();
        let jittered = rng.gen_range((secs - delta).max(0.0)..=(secs + delta));
        Duration::from_secs_f64(jittered)
    }
}

/// Run `operation` up to [`MAX_RETRY_ATTEMPTS`] times. On `Conflict`, await
/// `refresh` (re-reading the affected RRset from the provider) before
/// retrying; on `Transient`, sleep and retry without refreshing; `Fatal` is
/// returned immediately — it is not retryable by definition (spec.md §7).
///
/// `jitter_factor` is `0.0` for providers with no jitter requirement and
/// [`crate::constants::SQL_RETRY_JITTER_FACTOR`] for the SQL backend.
pub async fn retry_conflict<T, Op, OpFut, Refresh, RefreshFut>(
    operation_name: &str,
    jitter_factor: f64,
    mut operation: Op,
    mut refresh: Refresh,
) -> Result<T, BackendError>
where
    Op: FnMut() -> OpFut,
    OpFut: std::future::Future<Output = Result<T, BackendError>>,
    Refresh: FnMut() -> RefreshFut,
    RefreshFut: std::future::Future<Output = Result<(), BackendError>>,
{
    let mut backoff = Backoff::new(jitter_factor);
    let mut attempt = 0u32;
    let started_at = std::time::Instant::now();

    metrics::backend_op_started(operation_name);
    let result = loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation = operation_name, attempt, "succeeded after retry");
                    metrics::record_retry("succeeded");
                }
                metrics::record_provider_op(operation_name, "ok");
                break Ok(value);
            }
            Err(err) if attempt >= MAX_RETRY_ATTEMPTS => {
                error!(
                    operation = operation_name,
                    attempt,
                    error = %err,
                    "retry budget exhausted, giving up"
                );
                metrics::record_retry("exhausted");
                metrics::record_provider_op(operation_name, "error");
                break Err(err);
            }
            Err(err) if err.is_conflict() => {
                warn!(operation = operation_name, attempt, error = %err, "conflict, refreshing and retrying");
                metrics::record_retry("conflict");
                if let Err(refresh_err) = refresh().await {
                    metrics::record_provider_op(operation_name, "error");
                    break Err(refresh_err);
                }
                tokio::time::sleep(backoff.next()).await;
            }
            Err(err) if err.is_transient() => {
                warn!(operation = operation_name, attempt, error = %err, "transient failure, retrying");
                metrics::record_retry("transient");
                tokio::time::sleep(backoff.next()).await;
            }
            Err(err) => {
                metrics::record_provider_op(operation_name, "error");
                break Err(err);
            }
        }
    };
    metrics::backend_op_finished(operation_name);
    metrics::record_backend_op(
        operation_name,
        "unknown",
        if result.is_ok() { "ok" } else { "error" },
        started_at.elapsed(),
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn succeeds_without_retry() {
        let result: Result<u32, BackendError> =
            retry_conflict("noop", 0.0, || async { Ok(7) }, || async { Ok(()) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_on_conflict_then_succeeds() {
        let attempts = AtomicU32::new(0);
        let refreshes = AtomicU32::new(0);
        let result = retry_conflict(
            "publish",
            0.0,
            || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(BackendError::Conflict {
                            name: "web1".into(),
                            kind: RecordKind::A,
                            reason: "stale etag".into(),
                        })
                    } else {
                        Ok(())
                    }
                }
            },
            || {
                refreshes.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            },
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(refreshes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), BackendError> = retry_conflict(
            "publish",
            0.0,
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(BackendError::Transient("timeout".into())) }
            },
            || async { Ok(()) },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), MAX_RETRY_ATTEMPTS);
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), BackendError> = retry_conflict(
            "publish",
            0.0,
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(BackendError::Fatal("malformed request".into())) }
            },
            || async { Ok(()) },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
