//! Error taxonomy for the DNS-SD agent.
//!
//! Mirrors the classification the engine is built around: configuration
//! errors are fatal at boot, label-parse errors drop one service and
//! continue, and backend errors are either transient (retry), a conflict
//! (refresh and retry) or fatal (log and skip).

use thiserror::Error;

/// Startup configuration errors. The only fatal path in the agent: on any of
/// these the process logs a message and exits.
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("{var} must not contain a dot (short hostname required): {value}")]
    HostnameHasDot { var: &'static str, value: String },

    #[error("{var} is not a valid value: {value} ({reason})")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("unknown BACKEND {0:?}: expected one of route53, sql, etag-cloud, log-only")]
    UnknownBackend(String),
}

/// Errors from parsing one service's container labels. Each variant
/// corresponds to one validation rule in the label schema; the caller drops
/// the offending service and continues with the rest.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("service name {0:?} must be 1-15 characters matching RFC 6335 (alnum/hyphen, not starting or ending with hyphen)")]
    InvalidServiceName(String),

    #[error("service {service:?} has no port label and cannot be published")]
    MissingPort { service: String },

    #[error("service {service:?} port {value} is out of range 1-65535")]
    InvalidPort { service: String, value: i64 },

    #[error("service {service:?} protocol {value:?} is not one of tcp, udp, both")]
    InvalidProtocol { service: String, value: String },

    #[error("service {service:?} {field} {value} is out of range 0-65535")]
    InvalidPriorityOrWeight {
        service: String,
        field: &'static str,
        value: i64,
    },

    #[error("service {service:?} instance name exceeds 63 octets")]
    InstanceTooLong { service: String },

    #[error("service {service:?} tag key {key:?} contains a disallowed character")]
    InvalidTagKey { service: String, key: String },

    #[error("service {service:?} tag {key:?}={value:?} exceeds 255 octets (key+value+'=')")]
    TagEntryTooLong {
        service: String,
        key: String,
        value: String,
    },

    #[error("service {service:?} alias {alias:?} is not a valid relative DNS name")]
    InvalidAlias { service: String, alias: String },
}

/// Errors surfaced by a `Backend` implementation.
///
/// `is_transient` and `is_conflict` drive the retry loop in
/// [`crate::backend::retry`]; every other variant is treated as `Fatal` (log
/// and skip, per spec.md §7).
#[derive(Error, Debug)]
pub enum BackendError {
    /// Throttling, connection reset, DNS-server timeout: retry with backoff.
    #[error("transient backend failure: {0}")]
    Transient(String),

    /// Optimistic-concurrency conflict: the stored RRset's version token no
    /// longer matches. The caller must refresh the affected RRset and retry.
    #[error("conflicting write for {name} {kind:?}: {reason}")]
    Conflict {
        name: String,
        kind: crate::record::RecordKind,
        reason: String,
    },

    /// A request we constructed was rejected as malformed — indicates a bug
    /// in the synthesizer or backend adapter, not a transient condition.
    #[error("malformed request to backend: {0}")]
    Fatal(String),
}

impl BackendError {
    /// Whether this error should be retried with exponential backoff without
    /// first refreshing any cached state.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Whether this error represents an optimistic-concurrency conflict that
    /// should be resolved by refreshing the affected RRset before retrying.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Unexpected failure while processing one runtime event. Counted in the
/// exceptions metric; must never terminate the event loop.
#[derive(Error, Debug)]
#[error("event handling failed: {0}")]
pub struct EventError(pub String);
