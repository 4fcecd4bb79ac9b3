//! The [`DNSRecord`] value type and the RRset identity/equality rules it
//! implements.
//!
//! Record names are built on [`hickory_proto::rr::Name`] so that case-folding,
//! absolute/relative conversion, and DNS wire-format correctness come from a
//! well-tested DNS library rather than ad hoc string handling, the same way
//! bindy's `bind9/records/*.rs` build records against `hickory_client::rr`.

use hickory_proto::rr::Name;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// The record types this agent manages. `Soa`, `Ns`, `Mx`, `Caa` appear only
/// when reading backend state (spec.md §3) and are never synthesized or
/// published by this agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKind {
    A,
    Aaaa,
    Srv,
    Txt,
    Ptr,
    Cname,
    // Observed-only, read from backend state but never written by this agent.
    Soa,
    Ns,
    Mx,
    Caa,
}

impl RecordKind {
    /// Record kinds this agent ever publishes or suppresses. Used to filter
    /// `dns_records()` output down to the managed subset (spec.md §4.3).
    #[must_use]
    pub fn is_managed(self) -> bool {
        matches!(
            self,
            Self::A | Self::Aaaa | Self::Srv | Self::Txt | Self::Ptr | Self::Cname
        )
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::A => "A",
            Self::Aaaa => "AAAA",
            Self::Srv => "SRV",
            Self::Txt => "TXT",
            Self::Ptr => "PTR",
            Self::Cname => "CNAME",
            Self::Soa => "SOA",
            Self::Ns => "NS",
            Self::Mx => "MX",
            Self::Caa => "CAA",
        };
        f.write_str(s)
    }
}

/// An ordered `key=value` (or bare boolean) TXT tag list, with the
/// `txtvers` key (if present) always sorted first and all others left in
/// insertion order (spec.md §3).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags(Vec<(String, Option<Vec<u8>>)>);

impl Tags {
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Insert a tag, preserving the `txtvers`-first ordering invariant.
    pub fn insert(&mut self, key: impl Into<String>, value: Option<Vec<u8>>) {
        let key = key.into();
        if key == crate::constants::TXT_VERSION_KEY {
            self.0.insert(0, (key, value));
        } else {
            self.0.push((key, value));
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&[u8]>)> {
        self.0
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    /// Render as the TXT RRset's character-strings: one `key=value` (or bare
    /// `key`) string per tag, or a single empty string if there are no tags
    /// (spec.md §4.2 bullet 3, pinned per §9's "TXT empty-record case").
    #[must_use]
    pub fn to_strings(&self) -> Vec<String> {
        if self.0.is_empty() {
            return vec![String::new()];
        }
        self.0
            .iter()
            .map(|(k, v)| match v {
                Some(val) => format!("{k}={}", String::from_utf8_lossy(val)),
                None => k.clone(),
            })
            .collect()
    }
}

/// SRV record data: priority, weight, port, and target name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrvData {
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
    pub target: Name,
}

/// The type-tagged payload of a [`DNSRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RData {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    Srv(SrvData),
    Txt(Tags),
    Ptr(Name),
    Cname(Name),
    /// Observed-only payloads (SOA/NS/MX/CAA) are kept opaque — this agent
    /// never interprets or re-synthesizes them.
    Opaque(String),
}

impl RData {
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::A(_) => RecordKind::A,
            Self::Aaaa(_) => RecordKind::Aaaa,
            Self::Srv(_) => RecordKind::Srv,
            Self::Txt(_) => RecordKind::Txt,
            Self::Ptr(_) => RecordKind::Ptr,
            Self::Cname(_) => RecordKind::Cname,
            Self::Opaque(_) => RecordKind::Soa,
        }
    }
}

/// An immutable DNS record: `(name, ttl, type, data)`.
///
/// Per spec.md §3: two `DNSRecord`s are equal iff `(name, type, data)` are
/// equal — TTL is not part of identity, and names compare case-insensitively
/// (enforced by `Name`'s own `Eq`, which already folds case per RFC 4343).
#[derive(Debug, Clone)]
pub struct DNSRecord {
    pub name: Name,
    pub ttl: u32,
    pub data: RData,
}

impl DNSRecord {
    #[must_use]
    pub fn new(name: Name, ttl: u32, data: RData) -> Self {
        Self { name, ttl, data }
    }

    #[must_use]
    pub fn kind(&self) -> RecordKind {
        self.data.kind()
    }

    /// Make `name` absolute against `base` if it is not already
    /// fully-qualified (spec.md §3 "may be absolute or relative to the base
    /// zone").
    #[must_use]
    pub fn to_absolute(&self, base: &Name) -> Self {
        let name = if self.name.is_fqdn() {
            self.name.clone()
        } else {
            self.name
                .clone()
                .append_domain(base)
                .unwrap_or_else(|_| self.name.clone())
        };
        Self {
            name,
            ttl: self.ttl,
            data: self.data.clone(),
        }
    }

    /// Make `name` relative to `base`, dropping the zone suffix, the
    /// canonical in-memory form used by the [`crate::cache::RecordCache`] and
    /// every `Backend` implementation (spec.md §4.3: "relative to the base
    /// zone"). Returns `None` when `name` is absolute but not subordinate to
    /// `base` — the "records not subordinate to the base zone are dropped
    /// with a warning" rule (spec.md §4.3).
    #[must_use]
    pub fn to_relative(&self, base: &Name) -> Option<Self> {
        if !self.name.is_fqdn() {
            // Already relative; nothing to strip.
            return Some(self.clone());
        }
        if self.name == *base {
            return Some(Self {
                name: Name::root(),
                ttl: self.ttl,
                data: self.data.clone(),
            });
        }
        if !base.zone_of(&self.name) {
            return None;
        }
        Some(Self {
            name: self.name.relativize(base),
            ttl: self.ttl,
            data: self.data.clone(),
        })
    }
}

impl PartialEq for DNSRecord {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.data == other.data
    }
}

impl Eq for DNSRecord {}

/// Parse a relative-or-absolute DNS name the way container labels and zone
/// config express them (lowercase ASCII, Net-Unicode left to the caller).
pub fn parse_name(s: &str) -> Result<Name, hickory_proto::error::ProtoError> {
    Name::from_str(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_ttl() {
        let n = parse_name("web1.h1.svc.example.").unwrap();
        let a = DNSRecord::new(n.clone(), 60, RData::A(Ipv4Addr::new(10, 0, 0, 5)));
        let b = DNSRecord::new(n, 300, RData::A(Ipv4Addr::new(10, 0, 0, 5)));
        assert_eq!(a, b);
    }

    #[test]
    fn equality_is_case_insensitive_on_name() {
        let a = DNSRecord::new(
            parse_name("Web1.H1.svc.example.").unwrap(),
            60,
            RData::A(Ipv4Addr::new(10, 0, 0, 5)),
        );
        let b = DNSRecord::new(
            parse_name("web1.h1.svc.example.").unwrap(),
            60,
            RData::A(Ipv4Addr::new(10, 0, 0, 5)),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn different_data_is_not_equal() {
        let n = parse_name("web1.h1.svc.example.").unwrap();
        let a = DNSRecord::new(n.clone(), 60, RData::A(Ipv4Addr::new(10, 0, 0, 5)));
        let b = DNSRecord::new(n, 60, RData::A(Ipv4Addr::new(10, 0, 0, 6)));
        assert_ne!(a, b);
    }

    #[test]
    fn tags_emit_single_empty_string_when_empty() {
        let tags = Tags::new();
        assert_eq!(tags.to_strings(), vec![String::new()]);
    }

    #[test]
    fn tags_put_txtvers_first() {
        let mut tags = Tags::new();
        tags.insert("path", Some(b"/".to_vec()));
        tags.insert("txtvers", Some(b"1".to_vec()));
        let rendered = tags.to_strings();
        assert_eq!(rendered[0], "txtvers=1");
        assert_eq!(rendered[1], "path=/");
    }

    #[test]
    fn to_absolute_appends_base_once() {
        let base = parse_name("svc.example.").unwrap();
        let rel = DNSRecord::new(
            parse_name("web1.h1").unwrap(),
            60,
            RData::A(Ipv4Addr::new(10, 0, 0, 5)),
        );
        let abs = rel.to_absolute(&base);
        assert_eq!(abs.name, parse_name("web1.h1.svc.example.").unwrap());
        assert!(abs.name.is_fqdn());
    }

    #[test]
    fn to_relative_strips_base_suffix() {
        let base = parse_name("svc.example.").unwrap();
        let abs = DNSRecord::new(
            parse_name("web1.h1.svc.example.").unwrap(),
            60,
            RData::A(Ipv4Addr::new(10, 0, 0, 5)),
        );
        let rel = abs.to_relative(&base).unwrap();
        assert_eq!(rel.name, parse_name("web1.h1").unwrap());
    }

    #[test]
    fn to_relative_rejects_out_of_zone_name() {
        let base = parse_name("svc.example.").unwrap();
        let abs = DNSRecord::new(
            parse_name("web1.other.example.").unwrap(),
            60,
            RData::A(Ipv4Addr::new(10, 0, 0, 5)),
        );
        assert!(abs.to_relative(&base).is_none());
    }
}
