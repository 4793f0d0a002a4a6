//! Persistence of scans and their discovered records.
//!
//! A sink mirrors a relational layout: one scan row per run plus record,
//! parameter and log rows keyed by the scan id.

pub mod jsonl;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dns::{DomainName, Nsec3Record, NsecRecord, RecordClass, TypeSet};
use crate::dnssec::{Nsec3Parameters, OwnerHash};
use crate::error::Result;
use crate::scan::{ScanType, Severity};
use crate::walk::ZoneType;

pub use jsonl::JsonlSink;
pub use memory::MemorySink;

pub type ScanId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRow {
    pub id: ScanId,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Login of the user running the scan, empty when unknown
    pub initiated_by: String,
    pub zone: DomainName,
    pub scan_type: ScanType,
    pub zone_type: ZoneType,
    pub exit_code: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NsecRow {
    pub scan_id: ScanId,
    pub owner: DomainName,
    pub next_owner: DomainName,
    pub ttl: u32,
    pub class: RecordClass,
    pub types: TypeSet,
}

impl NsecRow {
    pub fn new(scan_id: ScanId, record: &NsecRecord) -> Self {
        Self {
            scan_id,
            owner: record.owner.clone(),
            next_owner: record.next_owner.clone(),
            ttl: record.ttl,
            class: record.class,
            types: record.types.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nsec3Row {
    pub scan_id: ScanId,
    pub owner: DomainName,
    pub hashed_owner: OwnerHash,
    pub next_hashed_owner: OwnerHash,
    pub ttl: u32,
    pub class: RecordClass,
    pub types: TypeSet,
}

impl Nsec3Row {
    pub fn new(scan_id: ScanId, record: &Nsec3Record) -> Self {
        Self {
            scan_id,
            owner: record.owner.clone(),
            hashed_owner: record.hashed_owner.clone(),
            next_hashed_owner: record.next_hashed_owner.clone(),
            ttl: record.ttl,
            class: record.class,
            types: record.types.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParametersRow {
    pub scan_id: ScanId,
    #[serde(flatten)]
    pub parameters: Nsec3Parameters,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRow {
    pub scan_id: ScanId,
    pub time: DateTime<Utc>,
    pub severity: Severity,
    pub message: String,
}

/// Destination for scan bookkeeping.
///
/// Calls for one scan arrive in order from a single task. Record rows are
/// written as they are accepted, so a sink holds the partial chain of an
/// aborted walk.
#[async_trait]
pub trait ScanSink: Send + Sync {
    async fn create_scan(
        &self,
        zone: &DomainName,
        scan_type: ScanType,
        zone_type: ZoneType,
    ) -> Result<ScanId>;

    async fn finish_scan(&self, scan_id: ScanId, exit_code: i32) -> Result<()>;

    async fn update_zone_type(&self, scan_id: ScanId, zone_type: ZoneType) -> Result<()>;

    async fn add_nsec_record(&self, scan_id: ScanId, record: &NsecRecord) -> Result<()>;

    async fn add_nsec3_record(&self, scan_id: ScanId, record: &Nsec3Record) -> Result<()>;

    /// Called once for every distinct parameter set of a chain
    async fn add_nsec3_parameters(&self, scan_id: ScanId, parameters: &Nsec3Parameters)
    -> Result<()>;

    async fn add_log(&self, scan_id: ScanId, severity: Severity, message: &str) -> Result<()>;
}

/// Login name recorded as the scan initiator
pub(crate) fn initiated_by() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_default()
}
