//! Shared wire-format helpers for backends that store record data as plain
//! strings (`route53`, `sql`, `etag_cloud`): render an [`RData`] to its
//! provider-agnostic string form and parse it back.

use crate::record::{parse_name, RData, SrvData, Tags};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

#[must_use]
pub fn render(data: &RData) -> String {
    match data {
        RData::A(ip) => ip.to_string(),
        RData::Aaaa(ip) => ip.to_string(),
        RData::Cname(name) | RData::Ptr(name) => name.to_ascii(),
        RData::Srv(srv) => {
            format!("{} {} {} {}", srv.priority, srv.weight, srv.port, srv.target.to_ascii())
        }
        RData::Txt(tags) => tags.to_strings().join("\u{0}"),
        RData::Opaque(s) => s.clone(),
    }
}

#[must_use]
pub fn parse(kind: &str, value: &str) -> Option<RData> {
    match kind.to_ascii_uppercase().as_str() {
        "A" => Ipv4Addr::from_str(value).ok().map(RData::A),
        "AAAA" => Ipv6Addr::from_str(value).ok().map(RData::Aaaa),
        "CNAME" => parse_name(value).ok().map(RData::Cname),
        "PTR" => parse_name(value).ok().map(RData::Ptr),
        "SRV" => {
            let mut parts = value.split_whitespace();
            let priority = parts.next()?.parse().ok()?;
            let weight = parts.next()?.parse().ok()?;
            let port = parts.next()?.parse().ok()?;
            let target = parse_name(parts.next()?).ok()?;
            Some(RData::Srv(SrvData {
                priority,
                weight,
                port,
                target,
            }))
        }
        "TXT" => {
            let mut tags = Tags::new();
            for entry in value.split('\u{0}') {
                match entry.split_once('=') {
                    Some((k, v)) => tags.insert(k, Some(v.as_bytes().to_vec())),
                    None if !entry.is_empty() => tags.insert(entry, None),
                    None => {}
                }
            }
            Some(RData::Txt(tags))
        }
        _ => Some(RData::Opaque(value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_record_round_trips() {
        let data = RData::A(Ipv4Addr::new(10, 0, 0, 5));
        let rendered = render(&data);
        assert_eq!(parse("A", &rendered), Some(data));
    }

    #[test]
    fn srv_record_round_trips() {
        let data = RData::Srv(SrvData {
            priority: 1,
            weight: 2,
            port: 80,
            target: parse_name("web1.h1.svc.example.").unwrap(),
        });
        let rendered = render(&data);
        assert_eq!(parse("SRV", &rendered), Some(data));
    }
}
