//! The generic shared-SRV cleanup state machine (spec.md §9: "expressed as a
//! small state machine: `{read, decide, apply, verify}`").
//!
//! Used as [`super::Backend::suppress_shared_record`]'s default
//! implementation by every backend except the SQL one, which collapses the
//! same four steps into a single transaction (spec.md §4.5).

use super::Backend;
use crate::errors::BackendError;
use crate::record::{DNSRecord, RData, RecordKind, Tags};

/// Remove `srv` and, if it was the last SRV record at that name, its sibling
/// TXT RRset and its entry in the parent `_svc._proto` PTR RRset.
///
/// Step order: **apply** the SRV removal first (so a crash after this point
/// still leaves TXT/PTR cleanup as a no-op retry target next time), **read**
/// the post-removal state, **decide** whether any sibling SRV remains, then
/// **apply** the sibling cleanup if not. There is no separate **verify**
/// step here because `dns_records()` in the read step already serves as the
/// verification the state machine's name implies.
pub async fn suppress_shared_srv<B: Backend + ?Sized>(
    backend: &B,
    srv: &DNSRecord,
) -> Result<(), BackendError> {
    backend.suppress_record(srv).await?;

    let remaining = backend.dns_records().await?;
    let siblings_remain = remaining
        .iter()
        .any(|r| r.kind() == RecordKind::Srv && r.name == srv.name);
    if siblings_remain {
        return Ok(());
    }

    // No SRV remains at this name: the TXT RRset is orphaned and this
    // instance's PTR entry is stale. Delete both.
    let txt = DNSRecord::new(srv.name.clone(), srv.ttl, RData::Txt(Tags::new()));
    backend.suppress_record(&txt).await?;

    let parent = srv.name.base_name();
    let ptr = DNSRecord::new(parent, srv.ttl, RData::Ptr(srv.name.clone()));
    backend.suppress_record(&ptr).await?;

    Ok(())
}
