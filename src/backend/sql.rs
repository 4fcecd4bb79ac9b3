//! SQL-row backend: one row per `(name, type, content)` (spec.md §4.5).
//!
//! Uses `sqlx` against Postgres — the ecosystem enrichment this crate adds
//! for the one backend variant bindy has no direct counterpart for (bindy
//! talks to BIND9 over rndc/zone files, never a SQL-row zone table). The
//! shared-SRV cleanup collapses spec.md §4.3's refcount arithmetic into a
//! single transaction, as spec.md §4.5 calls for explicitly.

use super::retry::retry_conflict;
use super::wire;
use super::Backend;
use crate::constants::SQL_RETRY_JITTER_FACTOR;
use crate::errors::BackendError;
use crate::record::{parse_name, DNSRecord, RData, RecordKind};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::warn;

pub struct SqlBackend {
    pool: PgPool,
    table: String,
    base_domain: hickory_proto::rr::Name,
}

impl SqlBackend {
    #[must_use]
    pub fn new(pool: PgPool, table: String, base_domain: hickory_proto::rr::Name) -> Self {
        Self {
            pool,
            table,
            base_domain,
        }
    }

    fn classify(err: sqlx::Error) -> BackendError {
        Self::classify_for(&String::new(), RecordKind::A, err)
    }

    fn classify_for(name: &str, kind: RecordKind, err: sqlx::Error) -> BackendError {
        match &err {
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                BackendError::Transient(err.to_string())
            }
            sqlx::Error::Database(db) if db.is_unique_violation() => BackendError::Conflict {
                name: name.to_string(),
                kind,
                reason: err.to_string(),
            },
            _ => BackendError::Fatal(err.to_string()),
        }
    }
}

#[async_trait]
impl Backend for SqlBackend {
    async fn dns_records(&self) -> Result<Vec<DNSRecord>, BackendError> {
        retry_conflict(
            "dns_records",
            SQL_RETRY_JITTER_FACTOR,
            || self.dns_records_once(),
            || async { Ok(()) },
        )
        .await
    }

    async fn publish_record(&self, record: &DNSRecord) -> Result<(), BackendError> {
        retry_conflict(
            "publish_record",
            SQL_RETRY_JITTER_FACTOR,
            || self.publish_record_once(record),
            || async { Ok(()) },
        )
        .await
    }

    async fn suppress_record(&self, record: &DNSRecord) -> Result<(), BackendError> {
        retry_conflict(
            "suppress_record",
            SQL_RETRY_JITTER_FACTOR,
            || self.suppress_record_once(record),
            || async { Ok(()) },
        )
        .await
    }

    /// Collapses spec.md §4.5's SQL shared-SRV cleanup into one transaction:
    /// delete the SRV row, count remaining SRV rows at the name, and if zero
    /// delete TXT rows at the name and the matching PTR row at the parent.
    async fn suppress_shared_record(&self, srv: &DNSRecord) -> Result<(), BackendError> {
        retry_conflict(
            "suppress_shared_record",
            SQL_RETRY_JITTER_FACTOR,
            || self.suppress_shared_record_once(srv),
            || async { Ok(()) },
        )
        .await
    }
}

impl SqlBackend {
    async fn dns_records_once(&self) -> Result<Vec<DNSRecord>, BackendError> {
        let query = format!("SELECT name, type, content, ttl FROM {} ", self.table);
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(Self::classify)?;

        let mut out = Vec::new();
        for row in rows {
            let name_str: String = row.try_get("name").map_err(Self::classify)?;
            let type_str: String = row.try_get("type").map_err(Self::classify)?;
            let content: String = row.try_get("content").map_err(Self::classify)?;
            let ttl: i64 = row.try_get("ttl").map_err(Self::classify)?;

            let Ok(name) = parse_name(&name_str) else {
                continue;
            };
            let Some(relative) = DNSRecord::new(name, 0, RData::Opaque(String::new()))
                .to_relative(&self.base_domain)
            else {
                warn!(name = %name_str, "record outside base zone, dropped");
                continue;
            };
            let Some(data) = wire::parse(&type_str, &content) else {
                continue;
            };
            if !data.kind().is_managed() {
                continue;
            }
            out.push(DNSRecord::new(
                relative.name,
                u32::try_from(ttl).unwrap_or(0),
                data,
            ));
        }
        Ok(out)
    }

    async fn publish_record_once(&self, record: &DNSRecord) -> Result<(), BackendError> {
        let name = record.name.to_ascii();
        let kind = record.kind().to_string();
        let content = wire::render(&record.data);
        match record.kind() {
            RecordKind::A | RecordKind::Aaaa | RecordKind::Cname | RecordKind::Txt => {
                let delete = format!("DELETE FROM {} WHERE name = $1 AND type = $2", self.table);
                let insert = format!(
                    "INSERT INTO {} (name, type, content, ttl) VALUES ($1, $2, $3, $4)",
                    self.table
                );
                let mut tx = self.pool.begin().await.map_err(Self::classify)?;
                sqlx::query(&delete)
                    .bind(&name)
                    .bind(&kind)
                    .execute(&mut *tx)
                    .await
                    .map_err(Self::classify)?;
                sqlx::query(&insert)
                    .bind(&name)
                    .bind(&kind)
                    .bind(&content)
                    .bind(i64::from(record.ttl))
                    .execute(&mut *tx)
                    .await
                    .map_err(Self::classify)?;
                tx.commit().await.map_err(Self::classify)?;
                Ok(())
            }
            RecordKind::Srv | RecordKind::Ptr => {
                let insert = format!(
                    "INSERT INTO {} (name, type, content, ttl) VALUES ($1, $2, $3, $4) \
                     ON CONFLICT (name, type, content) DO NOTHING",
                    self.table
                );
                sqlx::query(&insert)
                    .bind(&name)
                    .bind(&kind)
                    .bind(&content)
                    .bind(i64::from(record.ttl))
                    .execute(&self.pool)
                    .await
                    .map_err(|e| Self::classify_for(&name, record.kind(), e))?;
                Ok(())
            }
            other => Err(BackendError::Fatal(format!(
                "sql backend does not publish {other} records"
            ))),
        }
    }

    async fn suppress_record_once(&self, record: &DNSRecord) -> Result<(), BackendError> {
        let name = record.name.to_ascii();
        let kind = record.kind().to_string();
        match record.kind() {
            RecordKind::Txt => {
                let delete = format!("DELETE FROM {} WHERE name = $1 AND type = $2", self.table);
                sqlx::query(&delete)
                    .bind(&name)
                    .bind(&kind)
                    .execute(&self.pool)
                    .await
                    .map_err(Self::classify)?;
                Ok(())
            }
            _ => {
                let content = wire::render(&record.data);
                let delete = format!(
                    "DELETE FROM {} WHERE name = $1 AND type = $2 AND content = $3",
                    self.table
                );
                sqlx::query(&delete)
                    .bind(&name)
                    .bind(&kind)
                    .bind(&content)
                    .execute(&self.pool)
                    .await
                    .map_err(Self::classify)?;
                Ok(())
            }
        }
    }

    async fn suppress_shared_record_once(&self, srv: &DNSRecord) -> Result<(), BackendError> {
        let name = srv.name.to_ascii();
        let srv_content = wire::render(&srv.data);
        let mut tx = self.pool.begin().await.map_err(Self::classify)?;

        let delete_srv = format!(
            "DELETE FROM {} WHERE name = $1 AND type = 'SRV' AND content = $2",
            self.table
        );
        sqlx::query(&delete_srv)
            .bind(&name)
            .bind(&srv_content)
            .execute(&mut *tx)
            .await
            .map_err(Self::classify)?;

        let count_query = format!(
            "SELECT COUNT(*) AS n FROM {} WHERE name = $1 AND type = 'SRV'",
            self.table
        );
        let remaining: i64 = sqlx::query(&count_query)
            .bind(&name)
            .fetch_one(&mut *tx)
            .await
            .map_err(Self::classify)?
            .try_get("n")
            .map_err(Self::classify)?;

        if remaining == 0 {
            let delete_txt = format!("DELETE FROM {} WHERE name = $1 AND type = 'TXT'", self.table);
            sqlx::query(&delete_txt)
                .bind(&name)
                .execute(&mut *tx)
                .await
                .map_err(Self::classify)?;

            let parent = srv.name.base_name().to_ascii();
            let delete_ptr = format!(
                "DELETE FROM {} WHERE name = $1 AND type = 'PTR' AND content = $2",
                self.table
            );
            sqlx::query(&delete_ptr)
                .bind(&parent)
                .bind(&name)
                .execute(&mut *tx)
                .await
                .map_err(Self::classify)?;
        }

        tx.commit().await.map_err(Self::classify)?;
        Ok(())
    }
}
