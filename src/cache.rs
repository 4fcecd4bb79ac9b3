//! `RecordCache` — per-backend in-memory mirror of the managed zone
//! (spec.md §4.4).
//!
//! A plain `HashMap`-backed arena keyed by `(Name, RecordKind)`, as spec.md
//! §9 calls for ("an arena keyed by these pairs avoids reference cycles"),
//! generalizing bindy's pattern of small `Clone`able state structs
//! (`RndcKeyData` and friends) threaded through operations rather than a
//! shared mutable global guarded by a lock — the cache itself lives behind
//! the single writer task, so no internal locking is needed.

use crate::record::{DNSRecord, RecordKind};
use hickory_proto::rr::Name;
use std::collections::HashMap;

/// An opaque token used for conditional writes: an etag string, or a
/// snapshot of the RRset's values used for list-based conflict detection
/// (spec.md §4.4, §9: "Tokens are opaque strings (etag) or nil").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionToken {
    Etag(String),
    Snapshot(Vec<DNSRecord>),
}

/// All records sharing a `(name, type)` pair, plus the shared TTL and
/// optional version token for conditional writes.
#[derive(Debug, Clone, Default)]
pub struct CachedRrset {
    pub records: Vec<DNSRecord>,
    pub ttl: u32,
    pub version: Option<VersionToken>,
}

/// The in-memory mirror of one backend's managed zone contents, keyed by
/// `(name, type)`.
#[derive(Debug, Default)]
pub struct RecordCache {
    rrsets: HashMap<(Name, RecordKind), CachedRrset>,
}

impl RecordCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rrsets: HashMap::new(),
        }
    }

    #[must_use]
    pub fn get(&self, name: &Name, kind: RecordKind) -> Option<&CachedRrset> {
        self.rrsets.get(&(name.clone(), kind))
    }

    #[must_use]
    pub fn all_of_type(&self, kind: RecordKind) -> Vec<&DNSRecord> {
        self.rrsets
            .iter()
            .filter(|((_, k), _)| *k == kind)
            .flat_map(|(_, rrset)| rrset.records.iter())
            .collect()
    }

    /// Add `record` to the RRset at its `(name, type)`, creating the RRset
    /// if absent (the in-memory mirror of an add-to-set publish).
    pub fn add(&mut self, record: DNSRecord) {
        let key = (record.name.clone(), record.kind());
        let ttl = record.ttl;
        let rrset = self.rrsets.entry(key).or_insert_with(|| CachedRrset {
            records: Vec::new(),
            ttl,
            version: None,
        });
        if !rrset.records.contains(&record) {
            rrset.records.push(record);
        }
    }

    /// Remove `record` from its RRset, dropping the RRset entirely if it is
    /// now empty.
    pub fn remove(&mut self, record: &DNSRecord) {
        let key = (record.name.clone(), record.kind());
        if let Some(rrset) = self.rrsets.get_mut(&key) {
            rrset.records.retain(|r| r != record);
            if rrset.records.is_empty() {
                self.rrsets.remove(&key);
            }
        }
    }

    /// Replace the RRset at `(name, type)` with exactly `records` (the
    /// in-memory mirror of an upsert/replace publish).
    pub fn set(&mut self, name: &Name, kind: RecordKind, records: Vec<DNSRecord>, ttl: u32) {
        let key = (name.clone(), kind);
        if records.is_empty() {
            self.rrsets.remove(&key);
            return;
        }
        self.rrsets.insert(
            key,
            CachedRrset {
                records,
                ttl,
                version: None,
            },
        );
    }

    pub fn set_version(&mut self, name: &Name, kind: RecordKind, version: Option<VersionToken>) {
        if let Some(rrset) = self.rrsets.get_mut(&(name.clone(), kind)) {
            rrset.version = version;
        }
    }

    /// Drop every cached RRset — the next read repopulates from the
    /// provider. Used before retrying a `Conflict` when the provider does
    /// not support narrower refresh.
    pub fn refresh_all(&mut self) {
        self.rrsets.clear();
    }

    /// Drop the cached RRset at `(name, type)` only, forcing a fresh read
    /// from the provider on next access.
    pub fn refresh(&mut self, name: &Name, kind: RecordKind) {
        self.rrsets.remove(&(name.clone(), kind));
    }

    /// Repopulate the cache from a fresh `dns_records()` read, replacing
    /// all prior state.
    pub fn load(&mut self, records: Vec<DNSRecord>) {
        self.rrsets.clear();
        for record in records {
            self.add(record);
        }
    }

    #[must_use]
    pub fn all(&self) -> Vec<DNSRecord> {
        self.rrsets
            .values()
            .flat_map(|rrset| rrset.records.iter().cloned())
            .collect()
    }
}
