//! Etag-conditional cloud backend: a generic REST zone API (Cloudflare-style)
//! over `reqwest`, using `If-Match`/`If-None-Match` for optimistic
//! concurrency (spec.md §4.5).
//!
//! Modeled on the retrieval pack's `Provider`/`DnsProvider` trait shape: a
//! thin client wrapping `records()`/`apply()`-style calls, adapted to this
//! crate's `Backend` contract and bindy's `Bind9Manager`-style thin HTTP
//! adapter construction (a `reqwest::Client` plus a base URL and token).

use super::retry::retry_conflict;
use super::Backend;
use crate::cache::{RecordCache, VersionToken};
use crate::errors::BackendError;
use crate::record::{parse_name, DNSRecord, RData, RecordKind};
use async_trait::async_trait;
use hickory_proto::rr::Name;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

pub struct EtagCloudBackend {
    client: Client,
    base_url: String,
    api_token: String,
    zone_id: String,
    base_domain: hickory_proto::rr::Name,
    /// Per-RRset etags observed on GET/PUT responses, consulted to choose
    /// `If-Match`/`If-None-Match` on the next write (spec.md §4.4, §4.5).
    cache: Mutex<RecordCache>,
}

impl EtagCloudBackend {
    #[must_use]
    pub fn new(
        base_url: String,
        api_token: String,
        zone_id: String,
        base_domain: hickory_proto::rr::Name,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_token,
            zone_id,
            base_domain,
            cache: Mutex::new(RecordCache::new()),
        }
    }

    fn record_url(&self, name: &str, kind: RecordKind) -> String {
        format!(
            "{}/zones/{}/records/{}/{}",
            self.base_url, self.zone_id, kind, name
        )
    }

    fn absolute_name(&self, relative: &Name) -> Name {
        relative
            .clone()
            .append_domain(&self.base_domain)
            .unwrap_or_else(|_| relative.clone())
    }

    /// Re-fetches the single RRset at `(name, kind)` and refreshes its
    /// cached etag. Used as the `refresh` hook between conflict retries, and
    /// on 404 it drops the stale cache entry so the next write falls back to
    /// `If-None-Match: *`.
    async fn refresh_rrset(&self, name: &Name, kind: RecordKind) -> Result<(), BackendError> {
        let absolute = self.absolute_name(name).to_ascii();
        let url = self.record_url(&absolute, kind);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| BackendError::Transient(e.to_string()))?;
        if resp.status() == StatusCode::NOT_FOUND {
            self.cache.lock().await.refresh(name, kind);
            return Ok(());
        }
        if !resp.status().is_success() {
            return Err(classify_status(resp.status(), &absolute, kind));
        }
        let etag = etag_header(&resp);
        self.cache
            .lock()
            .await
            .set_version(name, kind, etag.map(VersionToken::Etag));
        Ok(())
    }
}

fn etag_header(resp: &reqwest::Response) -> Option<String> {
    resp.headers()
        .get(reqwest::header::ETAG)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Wire representation of one RRset, as the remote API would serve it —
/// values plus the etag covering the whole RRset.
#[derive(Debug, Serialize, Deserialize)]
struct RRsetPayload {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    ttl: u32,
    values: Vec<String>,
    #[serde(default)]
    etag: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    records: Vec<RRsetPayload>,
}

fn classify_status(status: StatusCode, name: &str, kind: RecordKind) -> BackendError {
    match status {
        StatusCode::PRECONDITION_FAILED | StatusCode::CONFLICT => BackendError::Conflict {
            name: name.to_string(),
            kind,
            reason: format!("etag mismatch ({status})"),
        },
        StatusCode::TOO_MANY_REQUESTS
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => BackendError::Transient(status.to_string()),
        _ => BackendError::Fatal(format!("unexpected status {status}")),
    }
}

#[async_trait]
impl Backend for EtagCloudBackend {
    async fn dns_records(&self) -> Result<Vec<DNSRecord>, BackendError> {
        let url = format!("{}/zones/{}/records", self.base_url, self.zone_id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| BackendError::Transient(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(classify_status(resp.status(), &url, RecordKind::A));
        }
        let body: ListResponse = resp
            .json()
            .await
            .map_err(|e| BackendError::Fatal(e.to_string()))?;

        let mut out = Vec::new();
        for rrset in body.records {
            let Ok(name) = parse_name(&rrset.name) else {
                continue;
            };
            let Some(relative) = DNSRecord::new(name, 0, RData::Opaque(String::new()))
                .to_relative(&self.base_domain)
            else {
                warn!(name = %rrset.name, "record outside base zone, dropped");
                continue;
            };
            let mut kind_seen = None;
            for value in &rrset.values {
                let Some(data) = super::wire::parse(&rrset.kind, value) else {
                    continue;
                };
                if !data.kind().is_managed() {
                    continue;
                }
                kind_seen = Some(data.kind());
                out.push(DNSRecord::new(relative.name.clone(), rrset.ttl, data));
            }
            if let Some(kind) = kind_seen {
                self.cache.lock().await.set_version(
                    &relative.name,
                    kind,
                    rrset.etag.clone().map(VersionToken::Etag),
                );
            }
        }
        Ok(out)
    }

    async fn publish_record(&self, record: &DNSRecord) -> Result<(), BackendError> {
        retry_conflict(
            "publish_record",
            0.0,
            || self.publish_record_once(record),
            || self.refresh_rrset(&record.name, record.kind()),
        )
        .await
    }

    async fn suppress_record(&self, record: &DNSRecord) -> Result<(), BackendError> {
        retry_conflict(
            "suppress_record",
            0.0,
            || self.suppress_record_once(record),
            || self.refresh_rrset(&record.name, record.kind()),
        )
        .await
    }
}

impl EtagCloudBackend {
    async fn publish_record_once(&self, record: &DNSRecord) -> Result<(), BackendError> {
        let absolute = record.to_absolute(&self.base_domain);
        let name = absolute.name.to_ascii();
        let url = self.record_url(&name, record.kind());

        let payload = RRsetPayload {
            name: name.clone(),
            kind: record.kind().to_string(),
            ttl: record.ttl,
            values: vec![super::wire::render(&record.data)],
            etag: None,
        };

        let cached_etag = self
            .cache
            .lock()
            .await
            .get(&record.name, record.kind())
            .and_then(|rrset| match &rrset.version {
                Some(VersionToken::Etag(tag)) => Some(tag.clone()),
                _ => None,
            });

        let mut req = self
            .client
            .put(&url)
            .bearer_auth(&self.api_token)
            .json(&payload);
        req = match &cached_etag {
            Some(etag) => req.header("If-Match", etag.as_str()),
            None => req.header("If-None-Match", "*"),
        };

        let resp = req
            .send()
            .await
            .map_err(|e| BackendError::Transient(e.to_string()))?;
        if resp.status().is_success() {
            let etag = etag_header(&resp);
            self.cache
                .lock()
                .await
                .set_version(&record.name, record.kind(), etag.map(VersionToken::Etag));
            return Ok(());
        }
        Err(classify_status(resp.status(), &name, record.kind()))
    }

    async fn suppress_record_once(&self, record: &DNSRecord) -> Result<(), BackendError> {
        let absolute = record.to_absolute(&self.base_domain);
        let name = absolute.name.to_ascii();
        let url = self.record_url(&name, record.kind());

        let cached_etag = self
            .cache
            .lock()
            .await
            .get(&record.name, record.kind())
            .and_then(|rrset| match &rrset.version {
                Some(VersionToken::Etag(tag)) => Some(tag.clone()),
                _ => None,
            });

        let mut req = self.client.delete(&url).bearer_auth(&self.api_token);
        if let Some(etag) = &cached_etag {
            req = req.header("If-Match", etag.as_str());
        }

        let resp = req
            .send()
            .await
            .map_err(|e| BackendError::Transient(e.to_string()))?;
        if resp.status().is_success() || resp.status() == StatusCode::NOT_FOUND {
            self.cache.lock().await.refresh(&record.name, record.kind());
            return Ok(());
        }
        Err(classify_status(resp.status(), &name, record.kind()))
    }
}
