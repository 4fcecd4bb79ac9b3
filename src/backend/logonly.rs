//! Log-only backend: emits lines, never touches a real zone. Used for dry
//! runs (spec.md §4.5).

use super::Backend;
use crate::errors::BackendError;
use crate::record::DNSRecord;
use async_trait::async_trait;
use tracing::info;

#[derive(Debug, Default)]
pub struct LogOnlyBackend;

impl LogOnlyBackend {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Backend for LogOnlyBackend {
    async fn dns_records(&self) -> Result<Vec<DNSRecord>, BackendError> {
        Ok(Vec::new())
    }

    async fn publish_record(&self, record: &DNSRecord) -> Result<(), BackendError> {
        info!(name = %record.name, kind = %record.kind(), "would publish");
        Ok(())
    }

    async fn suppress_record(&self, record: &DNSRecord) -> Result<(), BackendError> {
        info!(name = %record.name, kind = %record.kind(), "would suppress");
        Ok(())
    }

    async fn suppress_shared_record(&self, srv: &DNSRecord) -> Result<(), BackendError> {
        info!(name = %srv.name, "would suppress shared SRV and reclaim siblings if last");
        Ok(())
    }
}
