use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tracing::debug;

use super::{LogRow, Nsec3Row, NsecRow, ParametersRow, ScanId, ScanRow, ScanSink, initiated_by};
use crate::dns::{DomainName, Nsec3Record, NsecRecord};
use crate::dnssec::Nsec3Parameters;
use crate::error::{Result, WalkError};
use crate::scan::{ScanType, Severity};
use crate::walk::ZoneType;

#[derive(Default)]
struct Tables {
    scans: Vec<ScanRow>,
    nsec: Vec<NsecRow>,
    nsec3: Vec<Nsec3Row>,
    parameters: Vec<ParametersRow>,
    logs: Vec<LogRow>,
}

/// Keeps every table in memory; inspected by tests and by callers that
/// want the rows after the scan.
#[derive(Default)]
pub struct MemorySink {
    tables: Mutex<Tables>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scans(&self) -> Vec<ScanRow> {
        self.tables.lock().scans.clone()
    }

    pub fn scan(&self, id: ScanId) -> Option<ScanRow> {
        self.tables.lock().scans.iter().find(|s| s.id == id).cloned()
    }

    pub fn nsec_records(&self, scan_id: ScanId) -> Vec<NsecRow> {
        self.tables
            .lock()
            .nsec
            .iter()
            .filter(|r| r.scan_id == scan_id)
            .cloned()
            .collect()
    }

    pub fn nsec3_records(&self, scan_id: ScanId) -> Vec<Nsec3Row> {
        self.tables
            .lock()
            .nsec3
            .iter()
            .filter(|r| r.scan_id == scan_id)
            .cloned()
            .collect()
    }

    pub fn parameters(&self, scan_id: ScanId) -> Vec<Nsec3Parameters> {
        self.tables
            .lock()
            .parameters
            .iter()
            .filter(|r| r.scan_id == scan_id)
            .map(|r| r.parameters.clone())
            .collect()
    }

    pub fn logs(&self, scan_id: ScanId) -> Vec<LogRow> {
        self.tables
            .lock()
            .logs
            .iter()
            .filter(|r| r.scan_id == scan_id)
            .cloned()
            .collect()
    }

    fn with_scan<F>(&self, id: ScanId, f: F) -> Result<()>
    where
        F: FnOnce(&mut ScanRow),
    {
        let mut tables = self.tables.lock();
        let scan = tables
            .scans
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| WalkError::Sink(format!("unknown scan id {}", id)))?;
        f(scan);
        Ok(())
    }
}

#[async_trait]
impl ScanSink for MemorySink {
    async fn create_scan(
        &self,
        zone: &DomainName,
        scan_type: ScanType,
        zone_type: ZoneType,
    ) -> Result<ScanId> {
        let mut tables = self.tables.lock();
        let id = tables.scans.len() as ScanId + 1;
        tables.scans.push(ScanRow {
            id,
            start_time: Utc::now(),
            end_time: None,
            initiated_by: initiated_by(),
            zone: zone.clone(),
            scan_type,
            zone_type,
            exit_code: None,
        });
        debug!("Created scan {} for {}", id, zone);
        Ok(id)
    }

    async fn finish_scan(&self, scan_id: ScanId, exit_code: i32) -> Result<()> {
        self.with_scan(scan_id, |scan| {
            scan.end_time = Some(Utc::now());
            scan.exit_code = Some(exit_code);
        })
    }

    async fn update_zone_type(&self, scan_id: ScanId, zone_type: ZoneType) -> Result<()> {
        self.with_scan(scan_id, |scan| scan.zone_type = zone_type)
    }

    async fn add_nsec_record(&self, scan_id: ScanId, record: &NsecRecord) -> Result<()> {
        self.tables.lock().nsec.push(NsecRow::new(scan_id, record));
        Ok(())
    }

    async fn add_nsec3_record(&self, scan_id: ScanId, record: &Nsec3Record) -> Result<()> {
        self.tables.lock().nsec3.push(Nsec3Row::new(scan_id, record));
        Ok(())
    }

    async fn add_nsec3_parameters(
        &self,
        scan_id: ScanId,
        parameters: &Nsec3Parameters,
    ) -> Result<()> {
        self.tables.lock().parameters.push(ParametersRow {
            scan_id,
            parameters: parameters.clone(),
        });
        Ok(())
    }

    async fn add_log(&self, scan_id: ScanId, severity: Severity, message: &str) -> Result<()> {
        self.tables.lock().logs.push(LogRow {
            scan_id,
            time: Utc::now(),
            severity,
            message: message.to_string(),
        });
        Ok(())
    }
}
