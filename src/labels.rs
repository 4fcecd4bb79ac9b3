//! Label Parser — turns a container's label set into zero or more
//! [`ServiceInstance`] specs (spec.md §4.1).
//!
//! Labels follow the schema `org.discourse.service._<svc>.<attr>`. Any
//! validation failure for one service drops that service (with a `WARN` log)
//! and continues parsing the rest — label parsing must never abort the whole
//! container, the way bindy's CRD validation rejects one bad resource without
//! taking down the controller.

use crate::constants::{
    INSTANCE_NAME_MAX_OCTETS, LABEL_PREFIX, SERVICE_NAME_MAX_LEN, SERVICE_NAME_MIN_LEN,
    TXT_ENTRY_MAX_OCTETS,
};
use crate::errors::ParseError;
use crate::record::Tags;
use std::collections::BTreeMap;
use tracing::warn;

/// Transport protocol a service instance is published under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
    Both,
}

impl Protocol {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Some(Self::Tcp),
            "udp" => Some(Self::Udp),
            "both" => Some(Self::Both),
            _ => None,
        }
    }

    /// The set of wire protocols (`_tcp`/`_udp`) this selection emits records
    /// under (spec.md §4.2: "for each protocol tag P in {tcp, udp} selected
    /// by S.protocol").
    #[must_use]
    pub fn wire_protocols(self) -> &'static [&'static str] {
        match self {
            Self::Tcp => &["tcp"],
            Self::Udp => &["udp"],
            // For `both`, TCP is listed first so callers that need a single
            // preferred protocol (the "TCP wins" rule in spec.md §9) can take
            // wire_protocols()[0].
            Self::Both => &["tcp", "udp"],
        }
    }
}

/// One service parsed from a single container's labels (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInstance {
    pub service_name: String,
    pub port: u16,
    pub protocol: Protocol,
    pub priority: u16,
    pub weight: u16,
    pub instance: String,
    pub tags: Tags,
    pub aliases: Vec<String>,
}

fn is_valid_service_name(name: &str) -> bool {
    let len = name.len();
    if !(SERVICE_NAME_MIN_LEN..=SERVICE_NAME_MAX_LEN).contains(&len) {
        return false;
    }
    let bytes = name.as_bytes();
    if bytes.first() == Some(&b'-') || bytes.last() == Some(&b'-') {
        return false;
    }
    bytes
        .iter()
        .all(|b| b.is_ascii_alphanumeric() || *b == b'-')
}

fn is_valid_tag_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .bytes()
            .all(|b| (0x20..=0x7E).contains(&b) && b != b'=')
}

/// One `org.discourse.service._<svc>.<attr>` label, split into its service
/// name and attribute.
struct LabelKey<'a> {
    service: &'a str,
    attr: &'a str,
}

fn split_label(key: &str) -> Option<LabelKey<'_>> {
    let rest = key.strip_prefix(LABEL_PREFIX)?;
    let rest = rest.strip_prefix('_')?;
    let (service, attr) = rest.split_once('.')?;
    Some(LabelKey { service, attr })
}

/// Per-service accumulator built up while scanning the label map, before
/// validation converts it into a [`ServiceInstance`].
#[derive(Default)]
struct RawService {
    port: Option<String>,
    protocol: Option<String>,
    priority: Option<String>,
    weight: Option<String>,
    instance: Option<String>,
    aliases: Option<String>,
    tags_bool: Option<String>,
    tag_entries: Vec<(String, String)>,
}

/// Parse every `org.discourse.service.*` label on a container into zero or
/// more [`ServiceInstance`]s, dropping (and logging) any service whose labels
/// fail validation.
///
/// `default_instance` is the container name, used when no `instance` label is
/// present (spec.md §3: "default: container name").
#[must_use]
pub fn parse_labels(
    labels: &BTreeMap<String, String>,
    default_instance: &str,
) -> Vec<ServiceInstance> {
    let mut raw: BTreeMap<&str, RawService> = BTreeMap::new();

    for (key, value) in labels {
        let Some(LabelKey { service, attr }) = split_label(key) else {
            continue;
        };
        let entry = raw.entry(service).or_default();
        if attr == "port" {
            entry.port = Some(value.clone());
        } else if attr == "protocol" {
            entry.protocol = Some(value.clone());
        } else if attr == "priority" {
            entry.priority = Some(value.clone());
        } else if attr == "weight" {
            entry.weight = Some(value.clone());
        } else if attr == "instance" {
            entry.instance = Some(value.clone());
        } else if attr == "aliases" {
            entry.aliases = Some(value.clone());
        } else if attr == "tags" {
            entry.tags_bool = Some(value.clone());
        } else if let Some(tag_key) = attr.strip_prefix("tag.") {
            entry.tag_entries.push((tag_key.to_string(), value.clone()));
        }
    }

    let mut out = Vec::with_capacity(raw.len());
    for (service, raw_service) in raw {
        match build_service(service, raw_service, default_instance) {
            Ok(instance) => out.push(instance),
            Err(err) => {
                warn!(service, error = %err, "dropping service: label validation failed");
            }
        }
    }
    out
}

fn build_service(
    service: &str,
    raw: RawService,
    default_instance: &str,
) -> Result<ServiceInstance, ParseError> {
    let service_name = service.to_ascii_lowercase();
    if !is_valid_service_name(&service_name) {
        return Err(ParseError::InvalidServiceName(service_name));
    }

    let Some(port_str) = raw.port else {
        return Err(ParseError::MissingPort {
            service: service_name,
        });
    };
    let port_num: i64 = port_str.parse().map_err(|_| ParseError::InvalidPort {
        service: service_name.clone(),
        value: -1,
    })?;
    if !(1..=65535).contains(&port_num) {
        return Err(ParseError::InvalidPort {
            service: service_name,
            value: port_num,
        });
    }
    let port = port_num as u16;

    let protocol = match raw.protocol {
        Some(p) => Protocol::parse(&p).ok_or_else(|| ParseError::InvalidProtocol {
            service: service_name.clone(),
            value: p,
        })?,
        None => Protocol::Tcp,
    };

    let priority = parse_bounded(&service_name, "priority", raw.priority)?;
    let weight = parse_bounded(&service_name, "weight", raw.weight)?;

    let instance = raw.instance.unwrap_or_else(|| default_instance.to_string());
    if instance.as_bytes().len() > INSTANCE_NAME_MAX_OCTETS {
        return Err(ParseError::InstanceTooLong {
            service: service_name,
        });
    }

    let mut tags = Tags::new();
    for (key, value) in raw.tag_entries {
        validate_tag(&service_name, &key, Some(value.as_bytes()))?;
        tags.insert(key, Some(value.into_bytes()));
    }
    if let Some(bool_tags) = raw.tags_bool {
        for key in bool_tags.lines().map(str::trim).filter(|l| !l.is_empty()) {
            validate_tag(&service_name, key, None)?;
            tags.insert(key, None);
        }
    }

    let aliases = raw
        .aliases
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    for alias in &aliases {
        if crate::record::parse_name(alias).is_err() {
            return Err(ParseError::InvalidAlias {
                service: service_name.clone(),
                alias: alias.clone(),
            });
        }
    }

    Ok(ServiceInstance {
        service_name,
        port,
        protocol,
        priority,
        weight,
        instance,
        tags,
        aliases,
    })
}

fn parse_bounded(
    service: &str,
    field: &'static str,
    raw: Option<String>,
) -> Result<u16, ParseError> {
    let Some(raw) = raw else { return Ok(0) };
    let value: i64 = raw
        .parse()
        .map_err(|_| ParseError::InvalidPriorityOrWeight {
            service: service.to_string(),
            field,
            value: -1,
        })?;
    if !(0..=65535).contains(&value) {
        return Err(ParseError::InvalidPriorityOrWeight {
            service: service.to_string(),
            field,
            value,
        });
    }
    Ok(value as u16)
}

fn validate_tag(service: &str, key: &str, value: Option<&[u8]>) -> Result<(), ParseError> {
    if !is_valid_tag_key(key) {
        return Err(ParseError::InvalidTagKey {
            service: service.to_string(),
            key: key.to_string(),
        });
    }
    // txtvers is never length-bounded beyond the generic rule; measure
    // key + '=' + value against the 255-octet budget.
    let value_len = value.map_or(0, <[u8]>::len);
    let total = key.len() + usize::from(value.is_some()) + value_len;
    if total > TXT_ENTRY_MAX_OCTETS {
        return Err(ParseError::TagEntryTooLong {
            service: service.to_string(),
            key: key.to_string(),
            value: value
                .map(|v| String::from_utf8_lossy(v).into_owned())
                .unwrap_or_default(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parses_minimal_http_service() {
        let l = labels(&[
            ("org.discourse.service._http.port", "80"),
            ("org.discourse.service._http.tag.path", "/"),
        ]);
        let parsed = parse_labels(&l, "web1");
        assert_eq!(parsed.len(), 1);
        let svc = &parsed[0];
        assert_eq!(svc.service_name, "http");
        assert_eq!(svc.port, 80);
        assert_eq!(svc.instance, "web1");
        assert_eq!(svc.protocol, Protocol::Tcp);
        assert_eq!(svc.tags.to_strings(), vec!["path=/".to_string()]);
    }

    #[test]
    fn drops_service_missing_port_but_keeps_others() {
        let l = labels(&[
            ("org.discourse.service._bad.protocol", "tcp"),
            ("org.discourse.service._http.port", "80"),
        ]);
        let parsed = parse_labels(&l, "c1");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].service_name, "http");
    }

    #[test]
    fn drops_service_with_invalid_port() {
        let l = labels(&[("org.discourse.service._http.port", "70000")]);
        assert!(parse_labels(&l, "c1").is_empty());
    }

    #[test]
    fn parses_dns_udp_service() {
        let l = labels(&[
            ("org.discourse.service._dns.port", "53"),
            ("org.discourse.service._dns.protocol", "udp"),
        ]);
        let parsed = parse_labels(&l, "c1");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].protocol, Protocol::Udp);
        assert_eq!(parsed[0].protocol.wire_protocols(), &["udp"]);
    }

    #[test]
    fn boolean_tags_have_no_value() {
        let l = labels(&[
            ("org.discourse.service._http.port", "80"),
            ("org.discourse.service._http.tags", "secure\nbeta"),
        ]);
        let parsed = parse_labels(&l, "c1");
        let rendered = parsed[0].tags.to_strings();
        assert!(rendered.contains(&"secure".to_string()));
        assert!(rendered.contains(&"beta".to_string()));
    }

    #[test]
    fn parse_is_deterministic() {
        let l = labels(&[
            ("org.discourse.service._http.port", "80"),
            ("org.discourse.service._http.tag.path", "/"),
            ("org.discourse.service._http.tag.txtvers", "1"),
        ]);
        let a = parse_labels(&l, "web1");
        let b = parse_labels(&l, "web1");
        assert_eq!(a, b);
    }
}
