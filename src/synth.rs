//! Record Synthesizer — maps a [`Container`] + [`ServiceInstance`] to its
//! desired set of [`DNSRecord`]s (spec.md §4.2).

use crate::container::Container;
use crate::labels::ServiceInstance;
use crate::record::{parse_name, DNSRecord, RData, SrvData};
use hickory_proto::rr::Name;
use std::net::Ipv4Addr;
use std::str::FromStr;
use tracing::warn;

/// Inputs that parameterize address selection and are otherwise fixed per
/// agent instance (spec.md §6 configuration).
#[derive(Debug, Clone, Copy)]
pub struct SynthConfig<'a> {
    pub host: &'a str,
    pub base_domain: &'a Name,
    pub ttl: u32,
    pub host_ip_address: Option<Ipv4Addr>,
    pub ipv6_only: bool,
}

/// Why a service produced no records — logged at WARN, never a hard error
/// (spec.md §4.2: "emit a warning and produce no records for S").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisWarning {
    NoUsableHostIp { service: String, port: u16 },
    NoAddressAvailable { service: String },
}

impl std::fmt::Display for SynthesisWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoUsableHostIp { service, port } => write!(
                f,
                "service {service:?} port {port} is published but no usable host IP is configured"
            ),
            Self::NoAddressAvailable { service } => {
                write!(f, "service {service:?} has no usable container address")
            }
        }
    }
}

enum Address {
    Host(Ipv4Addr),
    Container,
}

/// Resolve the address-selection policy of spec.md §4.2 bullet 1 for one
/// `(container, service)` pair.
fn select_address(
    container: &Container,
    service: &ServiceInstance,
    cfg: &SynthConfig<'_>,
) -> Result<Address, SynthesisWarning> {
    if let Some(bindings) = container.published_ports.get(&service.port) {
        if let Some(binding) = bindings
            .iter()
            .find(|b| b.host_ip != Ipv4Addr::UNSPECIFIED)
        {
            return Ok(Address::Host(binding.host_ip));
        }
        if let Some(ip) = cfg.host_ip_address.filter(|ip| *ip != Ipv4Addr::UNSPECIFIED) {
            return Ok(Address::Host(ip));
        }
        return Err(SynthesisWarning::NoUsableHostIp {
            service: service.service_name.clone(),
            port: service.port,
        });
    }
    Ok(Address::Container)
}

/// The owner name and port a service's SRV record resolves to, and the
/// address record(s) that must accompany it, for one resolved [`Address`].
struct Target {
    name: Name,
    port: u16,
    a: Option<Ipv4Addr>,
    aaaa: Option<std::net::Ipv6Addr>,
}

fn resolve_target(
    container: &Container,
    service: &ServiceInstance,
    addr: Address,
    cfg: &SynthConfig<'_>,
) -> Result<Target, SynthesisWarning> {
    match addr {
        Address::Host(host_ip) => {
            let bindings = container
                .published_ports
                .get(&service.port)
                .expect("select_address only returns Address::Host when published_ports has an entry");
            let host_port = bindings
                .iter()
                .find(|b| b.host_ip == host_ip)
                .or_else(|| bindings.first())
                .map(|b| b.host_port)
                .unwrap_or(service.port);
            let name = host_owner_name(cfg.host, cfg.base_domain);
            Ok(Target {
                name,
                port: host_port,
                a: Some(host_ip),
                aaaa: None,
            })
        }
        Address::Container => {
            if container.ipv4.is_none() && container.ipv6.is_none() {
                return Err(SynthesisWarning::NoAddressAvailable {
                    service: service.service_name.clone(),
                });
            }
            let name = container_owner_name(&container.name, cfg.host, cfg.base_domain);
            Ok(Target {
                name,
                port: service.port,
                a: container.ipv4,
                aaaa: container.ipv6,
            })
        }
    }
}

fn host_owner_name(host: &str, base: &Name) -> Name {
    Name::from_str(host)
        .and_then(|n| n.append_domain(base))
        .expect("HOSTNAME is validated dot-free at config load time")
}

fn container_owner_name(container: &str, host: &str, base: &Name) -> Name {
    let label = format!("{container}.{host}");
    Name::from_str(&label)
        .and_then(|n| n.append_domain(base))
        .unwrap_or_else(|_| host_owner_name(host, base))
}

fn service_owner_name(instance: &str, service: &str, proto: &str, base: &Name) -> Name {
    let label = format!("{instance}._{service}._{proto}");
    parse_name(&label)
        .and_then(|n| n.append_domain(base))
        .expect("service/instance names are validated by the label parser before synthesis")
}

fn ptr_owner_name(service: &str, proto: &str, base: &Name) -> Name {
    let label = format!("_{service}._{proto}");
    parse_name(&label)
        .and_then(|n| n.append_domain(base))
        .expect("service names are validated by the label parser before synthesis")
}

/// Synthesize the desired record set for one `(container, service)` pair,
/// following spec.md §4.2. Returns `Ok(vec![])` when no records are produced
/// (e.g. `ipv6_only` suppresses the only available address family), and
/// `Err` only for the "no usable address at all" warning cases.
pub fn synthesize(
    container: &Container,
    service: &ServiceInstance,
    cfg: &SynthConfig<'_>,
) -> Result<Vec<DNSRecord>, SynthesisWarning> {
    let addr = select_address(container, service, cfg)?;
    let target = resolve_target(container, service, addr, cfg)?;

    let mut out = Vec::new();

    let emit_a = target.a.is_some() && !cfg.ipv6_only;
    let emit_aaaa = target.aaaa.is_some();
    if !emit_a && !emit_aaaa {
        warn!(
            service = %service.service_name,
            "ipv6_only configured but service has no AAAA address; no records produced"
        );
        return Ok(out);
    }
    if let (true, Some(ip)) = (emit_a, target.a) {
        out.push(DNSRecord::new(target.name.clone(), cfg.ttl, RData::A(ip)));
    }
    if let (true, Some(ip)) = (emit_aaaa, target.aaaa) {
        out.push(DNSRecord::new(target.name.clone(), cfg.ttl, RData::Aaaa(ip)));
    }

    // "For protocol=both the TCP-protocol address takes precedence if the
    // two disagree" — both protocols resolve the same target here, so this
    // only matters when callers synthesize tcp and udp separately against
    // diverging state; we resolve once and reuse the result for both.
    for proto in service.protocol.wire_protocols() {
        let srv_name = service_owner_name(&service.instance, &service.service_name, proto, cfg.base_domain);
        out.push(DNSRecord::new(
            srv_name.clone(),
            cfg.ttl,
            RData::Srv(SrvData {
                priority: service.priority,
                weight: service.weight,
                port: target.port,
                target: target.name.clone(),
            }),
        ));
        out.push(DNSRecord::new(
            srv_name.clone(),
            cfg.ttl,
            RData::Txt(service.tags.clone()),
        ));
        let ptr_name = ptr_owner_name(&service.service_name, proto, cfg.base_domain);
        out.push(DNSRecord::new(ptr_name, cfg.ttl, RData::Ptr(srv_name)));
    }

    for alias in &service.aliases {
        if let Ok(alias_name) = parse_name(alias).and_then(|n| n.append_domain(cfg.base_domain)) {
            out.push(DNSRecord::new(
                alias_name,
                cfg.ttl,
                RData::Cname(target.name.clone()),
            ));
        }
    }

    Ok(out)
}

/// Synthesize the full desired record set for every parsed service on one
/// container, logging and skipping any service whose address cannot be
/// resolved.
#[must_use]
pub fn synthesize_container(
    container: &Container,
    services: &[ServiceInstance],
    cfg: &SynthConfig<'_>,
) -> Vec<DNSRecord> {
    let mut out = Vec::new();
    for service in services {
        match synthesize(container, service, cfg) {
            Ok(records) => out.extend(records),
            Err(warning) => warn!(%warning, "synthesis produced no records"),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::Protocol;
    use crate::record::Tags;
    use std::collections::BTreeMap;
    use std::net::Ipv6Addr;

    fn base_cfg(base: &Name) -> SynthConfig<'_> {
        SynthConfig {
            host: "h1",
            base_domain: base,
            ttl: 60,
            host_ip_address: None,
            ipv6_only: false,
        }
    }

    fn container(ipv4: Option<Ipv4Addr>) -> Container {
        Container {
            id: "c1".into(),
            name: "web1".into(),
            labels: BTreeMap::new(),
            ipv4,
            ipv6: None,
            published_ports: BTreeMap::new(),
            exit_code: None,
            stopped_by_request: false,
        }
    }

    fn http_service() -> ServiceInstance {
        let mut tags = Tags::new();
        tags.insert("path", Some(b"/".to_vec()));
        ServiceInstance {
            service_name: "http".into(),
            port: 80,
            protocol: Protocol::Tcp,
            priority: 0,
            weight: 0,
            instance: "web1".into(),
            tags,
            aliases: Vec::new(),
        }
    }

    #[test]
    fn scenario_1_unpublished_container_address() {
        let base = parse_name("svc.example.").unwrap();
        let cfg = base_cfg(&base);
        let c = container(Some(Ipv4Addr::new(10, 0, 0, 5)));
        let svc = http_service();
        let records = synthesize(&c, &svc, &cfg).unwrap();

        let a = DNSRecord::new(
            parse_name("web1.h1.svc.example.").unwrap(),
            60,
            RData::A(Ipv4Addr::new(10, 0, 0, 5)),
        );
        assert!(records.contains(&a));

        let srv = DNSRecord::new(
            parse_name("web1._http._tcp.svc.example.").unwrap(),
            60,
            RData::Srv(SrvData {
                priority: 0,
                weight: 0,
                port: 80,
                target: parse_name("web1.h1.svc.example.").unwrap(),
            }),
        );
        assert!(records.contains(&srv));

        let ptr = DNSRecord::new(
            parse_name("_http._tcp.svc.example.").unwrap(),
            60,
            RData::Ptr(parse_name("web1._http._tcp.svc.example.").unwrap()),
        );
        assert!(records.contains(&ptr));
        assert_eq!(records.len(), 4);
    }

    #[test]
    fn scenario_3_udp_only_emits_no_tcp_names() {
        let base = parse_name("svc.example.").unwrap();
        let cfg = base_cfg(&base);
        let c = container(Some(Ipv4Addr::new(10, 0, 0, 5)));
        let mut svc = ServiceInstance {
            service_name: "dns".into(),
            port: 53,
            protocol: Protocol::Udp,
            ..http_service()
        };
        svc.tags = Tags::new();
        let records = synthesize(&c, &svc, &cfg).unwrap();
        assert!(records
            .iter()
            .all(|r| !r.name.to_ascii().contains("_tcp")));
        assert!(records
            .iter()
            .any(|r| r.name.to_ascii().contains("_udp")));
    }

    #[test]
    fn scenario_4_published_port_targets_host_name() {
        let base = parse_name("svc.example.").unwrap();
        let cfg = base_cfg(&base);
        let mut c = container(Some(Ipv4Addr::new(10, 0, 0, 5)));
        c.published_ports.insert(
            8080,
            vec![crate::container::HostBinding {
                host_ip: Ipv4Addr::new(203, 0, 113, 7),
                host_port: 80,
            }],
        );
        let svc = ServiceInstance {
            service_name: "http".into(),
            port: 8080,
            protocol: Protocol::Tcp,
            ..http_service()
        };
        let records = synthesize(&c, &svc, &cfg).unwrap();

        let host_a = DNSRecord::new(
            parse_name("h1.svc.example.").unwrap(),
            60,
            RData::A(Ipv4Addr::new(203, 0, 113, 7)),
        );
        assert!(records.contains(&host_a));
        assert!(!records
            .iter()
            .any(|r| r.name.to_ascii().starts_with("web1.h1")));

        let srv = records
            .iter()
            .find(|r| matches!(r.data, RData::Srv(_)))
            .unwrap();
        if let RData::Srv(s) = &srv.data {
            assert_eq!(s.port, 80);
            assert_eq!(s.target, parse_name("h1.svc.example.").unwrap());
        }
    }

    #[test]
    fn published_with_zero_host_ip_and_no_default_warns() {
        let base = parse_name("svc.example.").unwrap();
        let cfg = base_cfg(&base);
        let mut c = container(Some(Ipv4Addr::new(10, 0, 0, 5)));
        c.published_ports.insert(
            80,
            vec![crate::container::HostBinding {
                host_ip: Ipv4Addr::UNSPECIFIED,
                host_port: 8080,
            }],
        );
        let svc = http_service();
        let err = synthesize(&c, &svc, &cfg).unwrap_err();
        assert!(matches!(err, SynthesisWarning::NoUsableHostIp { .. }));
    }

    #[test]
    fn ipv6_only_suppresses_a_record() {
        let base = parse_name("svc.example.").unwrap();
        let cfg = SynthConfig {
            ipv6_only: true,
            ..base_cfg(&base)
        };
        let mut c = container(Some(Ipv4Addr::new(10, 0, 0, 5)));
        c.ipv6 = Some(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 5));
        let svc = http_service();
        let records = synthesize(&c, &svc, &cfg).unwrap();
        assert!(!records.iter().any(|r| matches!(r.data, RData::A(_))));
        assert!(records.iter().any(|r| matches!(r.data, RData::Aaaa(_))));
    }

    #[test]
    fn aliases_produce_cname_to_target() {
        let base = parse_name("svc.example.").unwrap();
        let cfg = base_cfg(&base);
        let c = container(Some(Ipv4Addr::new(10, 0, 0, 5)));
        let svc = ServiceInstance {
            aliases: vec!["www".into()],
            ..http_service()
        };
        let records = synthesize(&c, &svc, &cfg).unwrap();
        let cname = records
            .iter()
            .find(|r| matches!(r.data, RData::Cname(_)))
            .unwrap();
        assert_eq!(cname.name, parse_name("www.svc.example.").unwrap());
    }

    #[test]
    fn merging_two_containers_preserves_all_srv_and_unions_ptr() {
        let base = parse_name("svc.example.").unwrap();
        let cfg = base_cfg(&base);
        let c1 = container(Some(Ipv4Addr::new(10, 0, 0, 5)));
        let mut c2 = container(Some(Ipv4Addr::new(10, 0, 0, 6)));
        c2.name = "web2".into();
        let mut svc2 = http_service();
        svc2.instance = "web2".into();

        let mut all = synthesize(&c1, &http_service(), &cfg).unwrap();
        all.extend(synthesize(&c2, &svc2, &cfg).unwrap());

        let srv_count = all.iter().filter(|r| matches!(r.data, RData::Srv(_))).count();
        assert_eq!(srv_count, 2);

        let ptr_targets: std::collections::HashSet<_> = all
            .iter()
            .filter_map(|r| match &r.data {
                RData::Ptr(target) => Some(target.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(ptr_targets.len(), 2);
    }
}
