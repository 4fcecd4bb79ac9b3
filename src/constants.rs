//! Global constants for the DNS-SD agent.
//!
//! Numeric and string constants used throughout the crate, organized by
//! category.

// ============================================================================
// Environment variable names
// ============================================================================

pub const ENV_HOSTNAME: &str = "HOSTNAME";
pub const ENV_BASE_DOMAIN: &str = "BASE_DOMAIN";
pub const ENV_BACKEND: &str = "BACKEND";
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
pub const ENV_IPV6_ONLY: &str = "IPV6_ONLY";
pub const ENV_ENABLE_METRICS: &str = "ENABLE_METRICS";
pub const ENV_RECORD_TTL: &str = "RECORD_TTL";
pub const ENV_HOST_IP_ADDRESS: &str = "HOST_IP_ADDRESS";
pub const ENV_DOCKER_HOST: &str = "DOCKER_HOST";

/// Default unix socket path for the container runtime, used when
/// `DOCKER_HOST` is unset.
pub const DEFAULT_DOCKER_HOST: &str = "unix:///var/run/docker.sock";

/// Default record TTL in seconds, used when `RECORD_TTL` is unset.
pub const DEFAULT_RECORD_TTL_SECS: u32 = 60;

/// Maximum valid `RECORD_TTL` (2^31 - 1, per the 32-bit signed TTL field in
/// the original protocol).
pub const MAX_RECORD_TTL_SECS: u32 = 0x7FFF_FFFF;

// ============================================================================
// Label schema
// ============================================================================

/// Prefix for all recognized container labels, e.g.
/// `org.discourse.service._http.port`.
pub const LABEL_PREFIX: &str = "org.discourse.service.";

// ============================================================================
// Metrics server
// ============================================================================

pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";
pub const METRICS_SERVER_PORT: u16 = 9218;
pub const METRICS_SERVER_PATH: &str = "/metrics";

// ============================================================================
// Retry / backoff
// ============================================================================

/// Maximum number of attempts for a conflict/transient-retried backend
/// operation (initial attempt + 9 retries).
pub const MAX_RETRY_ATTEMPTS: u32 = 10;

/// Initial retry interval (100ms), per the record cache's conflict-retry
/// contract.
pub const INITIAL_RETRY_INTERVAL_MILLIS: u64 = 100;

/// Backoff multiplier (doubling).
pub const RETRY_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Randomization factor applied to SQL-backend retry sleeps only, per the
/// spec's note that SQL-variant retries add jitter.
pub const SQL_RETRY_JITTER_FACTOR: f64 = 0.1;

// ============================================================================
// Service instance grammar (RFC 6335 §5.1 + RFC 6763)
// ============================================================================

pub const SERVICE_NAME_MIN_LEN: usize = 1;
pub const SERVICE_NAME_MAX_LEN: usize = 15;

/// Maximum length (octets) of a DNS-SD instance name.
pub const INSTANCE_NAME_MAX_OCTETS: usize = 63;

/// Maximum length (octets) of a single TXT `key=value` entry, including the
/// `=` separator.
pub const TXT_ENTRY_MAX_OCTETS: usize = 255;

/// The TXT key that, when present, is always emitted first.
pub const TXT_VERSION_KEY: &str = "txtvers";

// ============================================================================
// Shutdown
// ============================================================================

/// Grace period the event loop waits for an in-flight write to finish before
/// teardown suppression gives up waiting for it.
pub const SHUTDOWN_GRACE_SECS: u64 = 10;
