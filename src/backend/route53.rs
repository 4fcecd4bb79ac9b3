//! Change-batch cloud backend: translates each abstract operation into
//! Route 53 `CREATE`/`DELETE`/`UPSERT` actions (spec.md §4.5).
//!
//! Grounded on the retrieval pack's AWS DNS provider, which drives the same
//! `aws-sdk-route53` `ChangeBatch`/`Change`/`ResourceRecordSet` builder
//! chain for `change_resource_record_sets`/`list_resource_record_sets`.

use super::retry::retry_conflict;
use super::Backend;
use crate::errors::BackendError;
use crate::record::{parse_name, DNSRecord, RData, RecordKind, SrvData, Tags};
use async_trait::async_trait;
use aws_sdk_route53::types::{Change, ChangeAction, ChangeBatch, ResourceRecord, ResourceRecordSet, RrType};
use aws_sdk_route53::Client;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use tracing::warn;

pub struct Route53Backend {
    client: Client,
    hosted_zone_id: String,
    base_domain: hickory_proto::rr::Name,
}

impl Route53Backend {
    #[must_use]
    pub fn new(client: Client, hosted_zone_id: String, base_domain: hickory_proto::rr::Name) -> Self {
        Self {
            client,
            hosted_zone_id,
            base_domain,
        }
    }

    fn to_rr_type(kind: RecordKind) -> RrType {
        match kind {
            RecordKind::A => RrType::A,
            RecordKind::Aaaa => RrType::Aaaa,
            RecordKind::Srv => RrType::Srv,
            RecordKind::Txt => RrType::Txt,
            RecordKind::Ptr => RrType::Ptr,
            RecordKind::Cname => RrType::Cname,
            RecordKind::Soa => RrType::Soa,
            RecordKind::Ns => RrType::Ns,
            RecordKind::Mx => RrType::Mx,
            RecordKind::Caa => RrType::Caa,
        }
    }

    fn value_string(data: &RData) -> String {
        match data {
            RData::A(ip) => ip.to_string(),
            RData::Aaaa(ip) => ip.to_string(),
            RData::Cname(name) | RData::Ptr(name) => name.to_ascii(),
            RData::Srv(srv) => format!(
                "{} {} {} {}",
                srv.priority,
                srv.weight,
                srv.port,
                srv.target.to_ascii()
            ),
            RData::Txt(tags) => tags
                .to_strings()
                .into_iter()
                .map(|s| format!("\"{}\"", s.replace('"', "\\\"")))
                .collect::<Vec<_>>()
                .join(" "),
            RData::Opaque(s) => s.clone(),
        }
    }

    async fn change(
        &self,
        action: ChangeAction,
        name: &hickory_proto::rr::Name,
        ttl: u32,
        kind: RecordKind,
        values: &[String],
    ) -> Result<(), BackendError> {
        let rrs = ResourceRecordSet::builder()
            .name(name.to_ascii())
            .r#type(Self::to_rr_type(kind))
            .ttl(i64::from(ttl))
            .set_resource_records(Some(
                values
                    .iter()
                    .map(|v| {
                        ResourceRecord::builder()
                            .value(v.clone())
                            .build()
                            .map_err(|e| BackendError::Fatal(e.to_string()))
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            ))
            .build()
            .map_err(|e| BackendError::Fatal(e.to_string()))?;
        let change = Change::builder()
            .action(action)
            .resource_record_set(rrs)
            .build()
            .map_err(|e| BackendError::Fatal(e.to_string()))?;
        let batch = ChangeBatch::builder()
            .changes(change)
            .build()
            .map_err(|e| BackendError::Fatal(e.to_string()))?;

        self.client
            .change_resource_record_sets()
            .hosted_zone_id(&self.hosted_zone_id)
            .change_batch(batch)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e, name, kind))?;
        Ok(())
    }
}

fn classify_sdk_error<E: std::fmt::Display>(
    err: &E,
    name: &hickory_proto::rr::Name,
    kind: RecordKind,
) -> BackendError {
    let message = err.to_string();
    if message.contains("InvalidChangeBatch") {
        BackendError::Conflict {
            name: name.to_ascii(),
            kind,
            reason: message,
        }
    } else if message.contains("Throttling") || message.contains("PriorRequestNotComplete") {
        BackendError::Transient(message)
    } else {
        BackendError::Fatal(message)
    }
}

#[async_trait]
impl Backend for Route53Backend {
    async fn dns_records(&self) -> Result<Vec<DNSRecord>, BackendError> {
        let output = self
            .client
            .list_resource_record_sets()
            .hosted_zone_id(&self.hosted_zone_id)
            .send()
            .await
            .map_err(|e| BackendError::Transient(e.to_string()))?;

        let mut out = Vec::new();
        for rrs in output.resource_record_sets() {
            let Ok(name) = parse_name(rrs.name()) else {
                continue;
            };
            let Some(relative) = DNSRecord::new(name.clone(), 0, RData::Opaque(String::new()))
                .to_relative(&self.base_domain)
            else {
                warn!(name = %rrs.name(), base = %self.base_domain, "record outside base zone, dropped");
                continue;
            };
            let ttl = u32::try_from(rrs.ttl().unwrap_or(0)).unwrap_or(0);
            let values: Vec<&str> = rrs
                .resource_records()
                .iter()
                .map(aws_sdk_route53::types::ResourceRecord::value)
                .collect();
            for value in values {
                let Some(data) = parse_rdata(rrs.r#type(), value) else {
                    continue;
                };
                if !data.kind().is_managed() {
                    continue;
                }
                out.push(DNSRecord::new(relative.name.clone(), ttl, data));
            }
        }
        Ok(out)
    }

    async fn publish_record(&self, record: &DNSRecord) -> Result<(), BackendError> {
        retry_conflict(
            "publish_record",
            0.0,
            || self.publish_record_once(record),
            || async { Ok(()) },
        )
        .await
    }

    async fn suppress_record(&self, record: &DNSRecord) -> Result<(), BackendError> {
        retry_conflict(
            "suppress_record",
            0.0,
            || self.suppress_record_once(record),
            || async { Ok(()) },
        )
        .await
    }
}

impl Route53Backend {
    async fn publish_record_once(&self, record: &DNSRecord) -> Result<(), BackendError> {
        let absolute = record.to_absolute(&self.base_domain);
        match record.kind() {
            RecordKind::A | RecordKind::Aaaa | RecordKind::Cname | RecordKind::Txt => {
                self.change(
                    ChangeAction::Upsert,
                    &absolute.name,
                    record.ttl,
                    record.kind(),
                    &[Self::value_string(&record.data)],
                )
                .await
            }
            RecordKind::Srv | RecordKind::Ptr => {
                // add-to-set: merge with whatever is already published at
                // this name for this type before upserting.
                let existing = self.dns_records().await?;
                let mut values: Vec<String> = existing
                    .iter()
                    .filter(|r| r.name == record.name && r.kind() == record.kind())
                    .map(|r| Self::value_string(&r.data))
                    .collect();
                let new_value = Self::value_string(&record.data);
                if !values.contains(&new_value) {
                    values.push(new_value);
                }
                self.change(
                    ChangeAction::Upsert,
                    &absolute.name,
                    record.ttl,
                    record.kind(),
                    &values,
                )
                .await
            }
            other => Err(BackendError::Fatal(format!(
                "route53 backend does not publish {other} records"
            ))),
        }
    }

    async fn suppress_record_once(&self, record: &DNSRecord) -> Result<(), BackendError> {
        let absolute = record.to_absolute(&self.base_domain);
        match record.kind() {
            RecordKind::Txt => {
                self.change(
                    ChangeAction::Delete,
                    &absolute.name,
                    record.ttl,
                    record.kind(),
                    &[],
                )
                .await
            }
            RecordKind::Srv | RecordKind::Ptr => {
                let existing = self.dns_records().await?;
                let removed_value = Self::value_string(&record.data);
                let remaining: Vec<String> = existing
                    .iter()
                    .filter(|r| r.name == record.name && r.kind() == record.kind())
                    .map(|r| Self::value_string(&r.data))
                    .filter(|v| *v != removed_value)
                    .collect();
                if remaining.is_empty() {
                    self.change(
                        ChangeAction::Delete,
                        &absolute.name,
                        record.ttl,
                        record.kind(),
                        &[removed_value],
                    )
                    .await
                } else {
                    self.change(
                        ChangeAction::Upsert,
                        &absolute.name,
                        record.ttl,
                        record.kind(),
                        &remaining,
                    )
                    .await
                }
            }
            _ => {
                self.change(
                    ChangeAction::Delete,
                    &absolute.name,
                    record.ttl,
                    record.kind(),
                    &[Self::value_string(&record.data)],
                )
                .await
            }
        }
    }
}

fn parse_rdata(kind: RrType, value: &str) -> Option<RData> {
    match kind {
        RrType::A => Ipv4Addr::from_str(value).ok().map(RData::A),
        RrType::Aaaa => Ipv6Addr::from_str(value).ok().map(RData::Aaaa),
        RrType::Cname => parse_name(value).ok().map(RData::Cname),
        RrType::Ptr => parse_name(value).ok().map(RData::Ptr),
        RrType::Srv => {
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
        RrType::Txt => {
            let mut tags = Tags::new();
            for entry in value.trim_matches('"').split("\" \"") {
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
