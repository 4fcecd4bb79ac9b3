//! Startup Reconciler (spec.md §4.6): diff desired vs. observed zone state
//! once at boot and emit the mutations that converge them.
//!
//! Grounded on the shape of bindy's reconcile loop (compute desired state,
//! diff against what the cluster/zone actually has, apply the delta) —
//! generalized here from a Kubernetes object diff to a DNS RRset diff.

use crate::backend::Backend;
use crate::errors::BackendError;
use crate::record::{DNSRecord, RData, RecordKind};
use hickory_proto::rr::Name;
use std::str::FromStr;
use tracing::{info, warn};

/// Whether `name` (absolute or relative to `base`) falls under `host_root`
/// (an absolute `<host>.<base>` name) — the "agent's host subtree" test from
/// spec.md §4.6.
fn under_host(name: &Name, host_root: &Name, base: &Name) -> bool {
    let absolute = if name.is_fqdn() {
        name.clone()
    } else {
        name.clone().append_domain(base).unwrap_or_else(|_| name.clone())
    };
    absolute == *host_root || host_root.zone_of(&absolute)
}

/// Whether an observed record is owned by this host and therefore a
/// candidate for suppression when it is not in the desired set (spec.md
/// §4.6 bullet 1).
fn is_owned(record: &DNSRecord, host_root: &Name, base: &Name) -> bool {
    match &record.data {
        RData::A(_) | RData::Aaaa(_) => under_host(&record.name, host_root, base),
        RData::Srv(srv) => under_host(&srv.target, host_root, base),
        RData::Cname(target) => under_host(target, host_root, base),
        // TXT is cleaned up as a side effect of shared-SRV removal; PTR
        // removal is only ever performed by shared-SRV cleanup (spec.md
        // §4.6 bullet 3) — neither is suppressed directly here.
        RData::Txt(_) | RData::Ptr(_) | RData::Opaque(_) => false,
    }
}

/// Runs the startup reconciliation described in spec.md §4.6 against one
/// backend: `desired` is the union of synthesized records for every running
/// container on this host.
pub struct Reconciler<'a> {
    pub host: &'a str,
    pub base_domain: &'a Name,
}

impl Reconciler<'_> {
    fn host_root(&self) -> Name {
        Name::from_str(self.host)
            .and_then(|n| n.append_domain(self.base_domain))
            .expect("HOSTNAME is validated dot-free at config load time")
    }

    /// Diff `desired` against the backend's current `dns_records()` and
    /// publish/suppress the difference.
    ///
    /// Publish order: addresses, then SRV, then TXT, then PTR, then CNAME
    /// (spec.md §4.6: "publish addresses before SRV before PTR"). Suppress
    /// order is the reverse: SRV (via shared removal, which itself cleans
    /// up TXT and PTR) before addresses/CNAME.
    pub async fn run<B: Backend + ?Sized>(
        &self,
        backend: &B,
        desired: &[DNSRecord],
    ) -> Result<(), BackendError> {
        let observed = backend.dns_records().await?;
        let host_root = self.host_root();

        let to_suppress: Vec<&DNSRecord> = observed
            .iter()
            .filter(|r| !desired.contains(r) && is_owned(r, &host_root, self.base_domain))
            .collect();

        for record in to_suppress.iter().filter(|r| r.kind() == RecordKind::Srv) {
            info!(name = %record.name, "suppressing SRV no longer desired");
            backend.suppress_shared_record(record).await?;
        }
        for record in to_suppress
            .iter()
            .filter(|r| matches!(r.kind(), RecordKind::A | RecordKind::Aaaa | RecordKind::Cname))
        {
            info!(name = %record.name, kind = %record.kind(), "suppressing record no longer desired");
            backend.suppress_record(record).await?;
        }

        for kind in [
            RecordKind::A,
            RecordKind::Aaaa,
            RecordKind::Srv,
            RecordKind::Txt,
            RecordKind::Ptr,
            RecordKind::Cname,
        ] {
            for record in desired.iter().filter(|r| r.kind() == kind && !observed.contains(r)) {
                if let Err(err) = backend.publish_record(record).await {
                    warn!(name = %record.name, kind = %kind, error = %err, "failed to publish desired record");
                    return Err(err);
                }
            }
        }

        Ok(())
    }
}
