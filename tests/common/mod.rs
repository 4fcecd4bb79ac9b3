//! Shared fixtures for the integration suite: an in-memory `Backend` double
//! (the same role bindy's `tests/common/mod.rs` fills with a fake
//! `Bind9Manager`) plus a couple of container/label builders.

use async_trait::async_trait;
use ddns_sd_agent::backend::Backend;
use ddns_sd_agent::container::{Container, HostBinding};
use ddns_sd_agent::errors::BackendError;
use ddns_sd_agent::record::{DNSRecord, RecordKind};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::Mutex;

/// An in-memory zone: enough of `dns_records`/`publish_record`/
/// `suppress_record` to drive the Reconciler and Event Processor end to end
/// without a real DNS provider.
#[derive(Default)]
pub struct FakeBackend {
    records: Mutex<Vec<DNSRecord>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(records: Vec<DNSRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    pub fn snapshot(&self) -> Vec<DNSRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn dns_records(&self) -> Result<Vec<DNSRecord>, BackendError> {
        Ok(self.snapshot())
    }

    async fn publish_record(&self, record: &DNSRecord) -> Result<(), BackendError> {
        let mut records = self.records.lock().unwrap();
        match record.kind() {
            RecordKind::A | RecordKind::Aaaa | RecordKind::Cname | RecordKind::Txt => {
                records.retain(|r| !(r.name == record.name && r.kind() == record.kind()));
                records.push(record.clone());
            }
            RecordKind::Srv | RecordKind::Ptr => {
                if !records.contains(record) {
                    records.push(record.clone());
                }
            }
            RecordKind::Soa | RecordKind::Ns | RecordKind::Mx | RecordKind::Caa => {
                records.push(record.clone())
            }
        }
        Ok(())
    }

    async fn suppress_record(&self, record: &DNSRecord) -> Result<(), BackendError> {
        let mut records = self.records.lock().unwrap();
        if record.kind() == RecordKind::Txt {
            records.retain(|r| !(r.name == record.name && r.kind() == RecordKind::Txt));
        } else {
            records.retain(|r| r != record);
        }
        Ok(())
    }
}

pub fn web1(ipv4: Ipv4Addr, port: u16) -> Container {
    let mut labels = BTreeMap::new();
    labels.insert("org.discourse.service._http.port".to_string(), port.to_string());
    labels.insert("org.discourse.service._http.tag.path".to_string(), "/".to_string());
    Container {
        id: "c-web1".into(),
        name: "web1".into(),
        labels,
        ipv4: Some(ipv4),
        ipv6: None,
        published_ports: BTreeMap::new(),
        exit_code: None,
        stopped_by_request: false,
    }
}

pub fn dns_udp_container(ipv4: Ipv4Addr) -> Container {
    let mut labels = BTreeMap::new();
    labels.insert("org.discourse.service._dns.port".to_string(), "53".to_string());
    labels.insert("org.discourse.service._dns.protocol".to_string(), "udp".to_string());
    Container {
        id: "c-dns".into(),
        name: "dnscache".into(),
        labels,
        ipv4: Some(ipv4),
        ipv6: None,
        published_ports: BTreeMap::new(),
        exit_code: None,
        stopped_by_request: false,
    }
}

pub fn published_http_container(host_ip: Ipv4Addr, host_port: u16) -> Container {
    let mut labels = BTreeMap::new();
    labels.insert("org.discourse.service._http.port".to_string(), "8080".to_string());
    let mut published_ports = BTreeMap::new();
    published_ports.insert(8080, vec![HostBinding { host_ip, host_port }]);
    Container {
        id: "c-web2".into(),
        name: "web2".into(),
        labels,
        ipv4: Some(Ipv4Addr::new(10, 0, 0, 9)),
        ipv6: None,
        published_ports,
        exit_code: None,
        stopped_by_request: false,
    }
}
