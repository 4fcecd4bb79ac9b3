//! Event Processor (spec.md §4.7): the single-threaded consumer of runtime
//! events that keeps the managed zone in sync with running containers after
//! the startup [`crate::reconciler::Reconciler`] pass.

use crate::backend::Backend;
use crate::container::Container;
use crate::errors::{BackendError, EventError};
use crate::labels::parse_labels;
use crate::metrics;
use crate::record::{DNSRecord, RecordKind};
use crate::runtime::RuntimeEvent;
use crate::synth::{synthesize_container, SynthConfig};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Tracks, per running container, the records this agent last published for
/// it, and drives publish/suppress through one `Backend` as runtime events
/// arrive. Owns no lock: the caller guarantees single-threaded delivery
/// (spec.md §4.7: "single-threaded consumer").
pub struct EventProcessor<'a, B: Backend + ?Sized> {
    backend: &'a B,
    cfg: SynthConfig<'a>,
    published: HashMap<String, Vec<DNSRecord>>,
}

impl<'a, B: Backend + ?Sized> EventProcessor<'a, B> {
    #[must_use]
    pub fn new(backend: &'a B, cfg: SynthConfig<'a>) -> Self {
        Self {
            backend,
            cfg,
            published: HashMap::new(),
        }
    }

    /// Seed bookkeeping for a container already converged by the startup
    /// Reconciler, so a later stop event knows what to suppress without
    /// re-synthesizing from labels that may have since changed.
    pub fn seed(&mut self, container_id: &str, records: Vec<DNSRecord>) {
        self.published.insert(container_id.to_string(), records);
    }

    /// Handle one runtime event. Errors are logged and counted in the
    /// exceptions metric, never propagated — the event loop must not
    /// terminate on a single bad event (spec.md §7 `Unexpected`).
    pub async fn handle(&mut self, event: RuntimeEvent, container: Option<Container>) {
        match event {
            RuntimeEvent::Started { container_id } => {
                metrics::record_runtime_event("started");
                let Some(container) = container else {
                    warn!(container_id, "start event for unknown container, ignoring");
                    return;
                };
                if let Err(err) = self.handle_start(&container).await {
                    metrics::record_event_exception("start");
                    warn!(container_id, error = %err, "failed to publish records for started container");
                }
            }
            RuntimeEvent::Stopped {
                container_id,
                exit_code,
                requested,
            } => {
                metrics::record_runtime_event("stopped");
                if let Err(err) = self.handle_stop(&container_id, exit_code, requested).await {
                    metrics::record_event_exception("stop");
                    warn!(container_id, error = %err, "failed to suppress records for stopped container");
                }
            }
            RuntimeEvent::Other { kind } => {
                metrics::record_runtime_event("ignored");
                debug!(kind, "ignoring unclassified runtime event");
            }
        }
    }

    async fn handle_start(&mut self, container: &Container) -> Result<(), EventError> {
        let services = parse_labels(&container.labels, &container.name);
        let records = synthesize_container(container, &services, &self.cfg);
        for record in &records {
            self.backend
                .publish_record(record)
                .await
                .map_err(|e| EventError(e.to_string()))?;
        }
        info!(
            container = %container.name,
            records = records.len(),
            "published records for started container"
        );
        self.published.insert(container.id.clone(), records);
        Ok(())
    }

    async fn handle_stop(
        &mut self,
        container_id: &str,
        exit_code: i64,
        requested: bool,
    ) -> Result<(), EventError> {
        let Some(records) = self.published.remove(container_id) else {
            debug!(container_id, "stop event for container with no tracked records");
            return Ok(());
        };

        // Graceful: exit_code == 0, or the operator explicitly requested the
        // stop. Anything else keeps records in place pending a supervisor
        // restart (spec.md §4.7 / §6 exit-record retention).
        let graceful = exit_code == 0 || requested;
        if !graceful {
            info!(container_id, exit_code, "container exited ungracefully, retaining records");
            self.published.insert(container_id.to_string(), records);
            return Ok(());
        }

        suppress_all(self.backend, &records)
            .await
            .map_err(|e| EventError(e.to_string()))?;
        info!(container_id, "suppressed records for stopped container");
        Ok(())
    }

    /// Graceful shutdown (TERM signal): suppress every record this host has
    /// published, then return (spec.md §4.7 / §6 signal semantics).
    pub async fn shutdown_withdraw(&mut self) {
        for (container_id, records) in self.published.drain() {
            if let Err(err) = suppress_all(self.backend, &records).await {
                warn!(container_id, error = %err, "failed to withdraw records during shutdown");
            }
        }
    }

    /// Restart (HUP signal): exit without suppressing anything, trusting a
    /// supervisor to bring the process back and reconcile again (spec.md §6).
    pub fn restart_without_suppression(&self) {
        info!(
            containers = self.published.len(),
            "restarting without withdrawing records"
        );
    }
}

async fn suppress_all<B: Backend + ?Sized>(
    backend: &B,
    records: &[DNSRecord],
) -> Result<(), BackendError> {
    for record in records.iter().filter(|r| r.kind() == RecordKind::Srv) {
        backend.suppress_shared_record(record).await?;
    }
    for record in records
        .iter()
        .filter(|r| matches!(r.kind(), RecordKind::A | RecordKind::Aaaa | RecordKind::Cname))
    {
        backend.suppress_record(record).await?;
    }
    Ok(())
}

/// Process-wide log verbosity, adjustable at runtime by `USR1`/`USR2`
/// (spec.md §4.7: "bounded at endpoints").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }

    /// `USR1`: one step more verbose, clamped at `Debug`.
    #[must_use]
    pub fn more_verbose(self) -> Self {
        match self {
            Self::Error => Self::Warn,
            Self::Warn => Self::Info,
            Self::Info | Self::Debug => Self::Debug,
        }
    }

    /// `USR2`: one step less verbose, clamped at `Error`.
    #[must_use]
    pub fn less_verbose(self) -> Self {
        match self {
            Self::Debug => Self::Info,
            Self::Info => Self::Warn,
            Self::Warn | Self::Error => Self::Error,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" | "trace" => Ok(Self::Debug),
            _ => Err(()),
        }
    }
}
