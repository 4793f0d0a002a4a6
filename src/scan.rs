//! One complete scan: identity checks, type detection and the walk, with
//! the scan's bookkeeping in the sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::WalkConfig;
use crate::dns::{ChainRecord, DomainName};
use crate::dnssec::Nsec3Parameters;
use crate::error::{Result, WalkError};
use crate::output::OutputWriter;
use crate::provider::QueryProvider;
use crate::sink::{ScanId, ScanSink};
use crate::walk::{
    CancelToken, Nsec3Walker, NsecWalker, Recorder, SinkBinding, WalkOutcome, WalkStatus,
    ZoneType, check_dnskey, detect_zone_type, validate_soa,
};

pub const EXIT_OK: i32 = 0;
pub const EXIT_FATAL: i32 = 1;
pub const EXIT_PARTIAL: i32 = 2;
pub const EXIT_UNKNOWN_TYPE: i32 = 3;

/// Chain type requested for a scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    /// Detect the chain type first
    #[default]
    Auto,
    Nsec,
    Nsec3,
}

impl ScanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanType::Auto => "auto",
            ScanType::Nsec => "nsec",
            ScanType::Nsec3 => "nsec3",
        }
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanType {
    type Err = WalkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(ScanType::Auto),
            "nsec" => Ok(ScanType::Nsec),
            "nsec3" => Ok(ScanType::Nsec3),
            _ => Err(WalkError::InvalidRecord(format!("unknown scan type: {}", s))),
        }
    }
}

/// Scan log severity, stored with the upper-case names used in the logs table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub time: DateTime<Utc>,
    pub severity: Severity,
    pub message: String,
}

/// Everything a scan produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub zone: DomainName,
    pub scan_type: ScanType,
    pub zone_type: ZoneType,
    /// A DNSKEY was found at the apex
    pub signed: bool,
    pub records: Vec<ChainRecord>,
    /// Every parameter set seen; the first belongs to the primary chain
    #[serde(default)]
    pub nsec3_parameters: Vec<Nsec3Parameters>,
    pub status: WalkStatus,
    #[serde(default)]
    pub queries: usize,
    #[serde(default)]
    pub log: Vec<LogEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_id: Option<ScanId>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ScanResult {
    pub fn exit_code(&self) -> i32 {
        match (&self.status, self.zone_type) {
            (WalkStatus::Closed, _) => EXIT_OK,
            (WalkStatus::Aborted(_), _) => EXIT_PARTIAL,
            (WalkStatus::NotWalked, ZoneType::Unknown) => EXIT_UNKNOWN_TYPE,
            (WalkStatus::NotWalked, _) => EXIT_OK,
        }
    }

    /// Distinct NSEC3 digests with their parameters, in discovery order
    pub fn nsec3_records(&self) -> impl Iterator<Item = &crate::dns::Nsec3Record> {
        self.records.iter().filter_map(ChainRecord::as_nsec3)
    }
}

/// Runs scans against one provider
pub struct Scanner<P> {
    provider: P,
    config: WalkConfig,
    sink: Option<Arc<dyn ScanSink>>,
}

impl<P: QueryProvider> Scanner<P> {
    pub fn new(provider: P, config: WalkConfig) -> Self {
        Self {
            provider,
            config,
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ScanSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn config(&self) -> &WalkConfig {
        &self.config
    }

    /// Scan `zone`. Fatal validation errors are logged as CRITICAL and the
    /// scan is finished with exit code 1 before the error is returned.
    pub async fn run(
        &self,
        zone: &DomainName,
        scan_type: ScanType,
        output: Option<Box<dyn OutputWriter>>,
        cancel: CancelToken,
    ) -> Result<ScanResult> {
        let started_at = Utc::now();
        info!("Starting {} scan of {}", scan_type, zone);

        let binding = match &self.sink {
            Some(sink) => {
                let scan_id = sink.create_scan(zone, scan_type, ZoneType::Unknown).await?;
                Some(SinkBinding {
                    sink: Arc::clone(sink),
                    scan_id,
                })
            }
            None => None,
        };
        let mut recorder = Recorder::new(binding, output);

        let (zone_type, signed, outcome) =
            match self.scan(zone, scan_type, &mut recorder, cancel).await {
                Ok(parts) => parts,
                Err(e) => {
                    let step = e.failed_step().unwrap_or("scan");
                    recorder
                        .log(Severity::Critical, format!("{} failed: {}", step, e))
                        .await;
                    if let Err(finish_err) = recorder.finish_scan(EXIT_FATAL).await {
                        error!("Failed to finish scan: {}", finish_err);
                    }
                    return Err(e);
                }
            };

        let mut result = ScanResult {
            zone: zone.clone(),
            scan_type,
            zone_type,
            signed,
            records: outcome.records,
            nsec3_parameters: outcome.parameters,
            status: outcome.status,
            queries: outcome.queries,
            log: Vec::new(),
            scan_id: recorder.scan_id(),
            started_at,
            finished_at: Utc::now(),
        };
        let exit_code = result.exit_code();
        recorder
            .log(
                Severity::Info,
                format!(
                    "scan finished: {} records, {} queries, exit code {}",
                    result.records.len(),
                    result.queries,
                    exit_code
                ),
            )
            .await;
        recorder.finish_scan(exit_code).await?;
        result.log = recorder.take_log();
        Ok(result)
    }

    async fn scan(
        &self,
        zone: &DomainName,
        scan_type: ScanType,
        recorder: &mut Recorder,
        cancel: CancelToken,
    ) -> Result<(ZoneType, bool, WalkOutcome)> {
        validate_soa(zone, &self.provider).await?;
        let signed = check_dnskey(zone, &self.provider).await?;
        if !signed {
            recorder
                .log(
                    Severity::Warning,
                    format!("no DNSKEY at {}, zone does not appear to be signed", zone),
                )
                .await;
        }

        let zone_type = match scan_type {
            ScanType::Auto => {
                detect_zone_type(zone, &self.provider, self.config.detect_attempts, recorder)
                    .await?
            }
            ScanType::Nsec => ZoneType::Nsec,
            ScanType::Nsec3 => ZoneType::Nsec3,
        };
        recorder.zone_type(zone_type).await?;

        let outcome = match zone_type {
            ZoneType::Nsec => {
                NsecWalker::new(zone.clone(), &self.provider, &self.config)
                    .with_cancel(cancel)
                    .walk(recorder)
                    .await?
            }
            ZoneType::Nsec3 => {
                Nsec3Walker::new(zone.clone(), &self.provider, &self.config)
                    .with_cancel(cancel)
                    .walk(recorder)
                    .await?
            }
            ZoneType::NoDnssec | ZoneType::Unknown => {
                if zone_type == ZoneType::NoDnssec {
                    recorder
                        .log(Severity::Info, "zone has no NSEC or NSEC3 chain to walk")
                        .await;
                }
                WalkOutcome {
                    records: Vec::new(),
                    parameters: Vec::new(),
                    status: WalkStatus::NotWalked,
                    queries: 0,
                }
            }
        };
        recorder.finish_output(outcome.records.len())?;
        Ok((zone_type, signed, outcome))
    }
}
