use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

use super::{LogRow, Nsec3Row, NsecRow, ParametersRow, ScanId, ScanRow, ScanSink, initiated_by};
use crate::dns::{DomainName, Nsec3Record, NsecRecord};
use crate::dnssec::Nsec3Parameters;
use crate::error::Result;
use crate::scan::{ScanType, Severity};
use crate::walk::ZoneType;

/// Changes to an existing scan row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanUpdate {
    pub scan_id: ScanId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_type: Option<ZoneType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

/// One line of a JSON-lines sink file, tagged with the table it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "table", rename_all = "snake_case")]
pub enum JsonlRow {
    Scans(ScanRow),
    ScanUpdates(ScanUpdate),
    NsecResourceRecords(NsecRow),
    Nsec3ResourceRecords(Nsec3Row),
    Nsec3Parameters(ParametersRow),
    Logs(LogRow),
}

/// Appends every row as a JSON object on its own line
pub struct JsonlSink {
    writer: Mutex<BufWriter<File>>,
    next_id: AtomicU64,
}

impl JsonlSink {
    /// Create (or truncate) the sink file
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        info!("Writing scan rows to {}", path.as_ref().display());
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
            next_id: AtomicU64::new(1),
        })
    }

    /// Read every row back from a sink file
    pub fn read_rows(path: impl AsRef<Path>) -> Result<Vec<JsonlRow>> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let mut rows = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            rows.push(serde_json::from_str(&line)?);
        }
        Ok(rows)
    }

    fn write_row(&self, row: &JsonlRow) -> Result<()> {
        let line = serde_json::to_string(row)?;
        let mut writer = self.writer.lock();
        writeln!(writer, "{}", line)?;
        // flush per row so an interrupted scan keeps what it found
        writer.flush()?;
        Ok(())
    }
}

#[async_trait]
impl ScanSink for JsonlSink {
    async fn create_scan(
        &self,
        zone: &DomainName,
        scan_type: ScanType,
        zone_type: ZoneType,
    ) -> Result<ScanId> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.write_row(&JsonlRow::Scans(ScanRow {
            id,
            start_time: Utc::now(),
            end_time: None,
            initiated_by: initiated_by(),
            zone: zone.clone(),
            scan_type,
            zone_type,
            exit_code: None,
        }))?;
        Ok(id)
    }

    async fn finish_scan(&self, scan_id: ScanId, exit_code: i32) -> Result<()> {
        self.write_row(&JsonlRow::ScanUpdates(ScanUpdate {
            scan_id,
            end_time: Some(Utc::now()),
            exit_code: Some(exit_code),
            ..Default::default()
        }))
    }

    async fn update_zone_type(&self, scan_id: ScanId, zone_type: ZoneType) -> Result<()> {
        self.write_row(&JsonlRow::ScanUpdates(ScanUpdate {
            scan_id,
            zone_type: Some(zone_type),
            ..Default::default()
        }))
    }

    async fn add_nsec_record(&self, scan_id: ScanId, record: &NsecRecord) -> Result<()> {
        self.write_row(&JsonlRow::NsecResourceRecords(NsecRow::new(scan_id, record)))
    }

    async fn add_nsec3_record(&self, scan_id: ScanId, record: &Nsec3Record) -> Result<()> {
        self.write_row(&JsonlRow::Nsec3ResourceRecords(Nsec3Row::new(
            scan_id, record,
        )))
    }

    async fn add_nsec3_parameters(
        &self,
        scan_id: ScanId,
        parameters: &Nsec3Parameters,
    ) -> Result<()> {
        self.write_row(&JsonlRow::Nsec3Parameters(ParametersRow {
            scan_id,
            parameters: parameters.clone(),
        }))
    }

    async fn add_log(&self, scan_id: ScanId, severity: Severity, message: &str) -> Result<()> {
        self.write_row(&JsonlRow::Logs(LogRow {
            scan_id,
            time: Utc::now(),
            severity,
            message: message.to_string(),
        }))
    }
}
