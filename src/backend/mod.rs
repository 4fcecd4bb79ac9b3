//! Backend contract (spec.md §4.3) and its concrete implementations.
//!
//! `Backend` is the abstraction bindy expresses as `Bind9Manager` for a
//! single DNS server: a thin trait with a handful of idempotent operations,
//! implemented once per provider. Every provider drives its operations
//! through [`retry::retry_conflict`], since a connection drop or pool
//! exhaustion (`BackendError::Transient`) is possible against any of them,
//! not only the two whose writes are guarded by an explicit conflict code
//! (route53's `InvalidChangeBatch`, the etag-conditional HTTP backend's
//! `412`/`409`). The SQL backend additionally avoids one conflict case
//! up front via `ON CONFLICT DO NOTHING` on the SRV/PTR add-to-set insert,
//! but still retries the surrounding transaction like every other op.

pub mod etag_cloud;
pub mod logonly;
pub mod retry;
pub mod route53;
pub mod shared;
pub mod sql;
pub mod wire;

use crate::errors::BackendError;
use crate::record::DNSRecord;
use async_trait::async_trait;

/// The operations every DNS-SD backend must provide (spec.md §4.3).
///
/// All records passed to and returned from these methods are relative to
/// the base zone (see [`crate::record::DNSRecord::to_relative`]); absolute
/// conversion is the caller's job.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Every managed record currently visible in the zone. Records outside
    /// {A, AAAA, SRV, TXT, PTR, CNAME} or not subordinate to the base zone
    /// are filtered out by the implementation, with a WARN for the latter.
    async fn dns_records(&self) -> Result<Vec<DNSRecord>, BackendError>;

    /// Publish one record. A/AAAA/CNAME: upsert (RRset becomes exactly
    /// `{r}`). SRV/PTR: add-to-set (union into the RRset). TXT: replace
    /// (RRset becomes exactly `{r}`).
    async fn publish_record(&self, record: &DNSRecord) -> Result<(), BackendError>;

    /// Remove one record. A/AAAA/SRV/CNAME: delete `(name, type, value)`.
    /// TXT: delete the whole RRset at `(name, TXT)`.
    async fn suppress_record(&self, record: &DNSRecord) -> Result<(), BackendError>;

    /// Atomically remove an SRV record and, if no SRV remains at its name,
    /// its sibling TXT RRset and its PTR entry in the parent `_svc._proto`
    /// RRset (spec.md §4.3's refcount-like shared-record semantics).
    ///
    /// The default implementation is the generic `{read, decide, apply,
    /// verify}` state machine from spec.md §9, built from `suppress_record`
    /// and `dns_records`; backends capable of a single transaction (the SQL
    /// backend) override this with a tighter, atomic implementation.
    async fn suppress_shared_record(&self, srv: &DNSRecord) -> Result<(), BackendError> {
        shared::suppress_shared_srv(self, srv).await
    }
}
