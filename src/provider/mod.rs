pub mod rate_limit;
pub mod static_zone;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::dns::{
    DnskeyRecord, DomainName, Nsec3Record, NsecRecord, RecordType, ResponseStatus, SoaRecord,
};
pub use crate::error::ProviderError;

pub use rate_limit::RateLimitedProvider;
pub use static_zone::{Denial, StaticZone, StaticZoneBuilder};

/// A typed record carried in a response, resolved once from its RR type
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponseRecord {
    Nsec(NsecRecord),
    Nsec3(Nsec3Record),
    Soa(SoaRecord),
    Dnskey(DnskeyRecord),
}

/// The parts of a DNS response the walker looks at
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryResponse {
    pub status: ResponseStatus,
    pub records: Vec<ResponseRecord>,
}

impl QueryResponse {
    pub fn new(status: ResponseStatus) -> Self {
        Self {
            status,
            records: Vec::new(),
        }
    }

    pub fn with_record(mut self, record: ResponseRecord) -> Self {
        self.records.push(record);
        self
    }

    pub fn status(&self) -> ResponseStatus {
        self.status
    }

    pub fn find_nsec(&self) -> Vec<&NsecRecord> {
        self.records
            .iter()
            .filter_map(|r| match r {
                ResponseRecord::Nsec(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    pub fn find_nsec3(&self) -> Vec<&Nsec3Record> {
        self.records
            .iter()
            .filter_map(|r| match r {
                ResponseRecord::Nsec3(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    pub fn find_soa(&self) -> Vec<&SoaRecord> {
        self.records
            .iter()
            .filter_map(|r| match r {
                ResponseRecord::Soa(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn find_dnskey(&self) -> Vec<&DnskeyRecord> {
        self.records
            .iter()
            .filter_map(|r| match r {
                ResponseRecord::Dnskey(k) => Some(k),
                _ => None,
            })
            .collect()
    }
}

/// Transport-side details of an answered query
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryMeta {
    /// Label of the server that answered
    pub server: String,
    pub elapsed: Duration,
}

/// Sends one query and classifies the answer.
///
/// Retry, timeout and transport selection live behind this trait; the
/// walker only sees the final outcome.
#[async_trait]
pub trait QueryProvider: Send + Sync {
    async fn query(
        &self,
        name: &DomainName,
        rtype: RecordType,
    ) -> Result<(QueryResponse, QueryMeta), ProviderError>;
}

#[async_trait]
impl<P: QueryProvider + ?Sized> QueryProvider for Arc<P> {
    async fn query(
        &self,
        name: &DomainName,
        rtype: RecordType,
    ) -> Result<(QueryResponse, QueryMeta), ProviderError> {
        (**self).query(name, rtype).await
    }
}
