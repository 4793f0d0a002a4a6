use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::ZoneType;
use crate::dns::ChainRecord;
use crate::dnssec::Nsec3Parameters;
use crate::error::Result;
use crate::output::OutputWriter;
use crate::scan::{LogEntry, Severity};
use crate::sink::{ScanId, ScanSink};

/// A sink together with the scan its rows belong to
#[derive(Clone)]
pub struct SinkBinding {
    pub sink: Arc<dyn ScanSink>,
    pub scan_id: ScanId,
}

/// Fans accepted records and log entries out to the optional sink and
/// output writer, and keeps the scan log.
#[derive(Default)]
pub struct Recorder {
    sink: Option<SinkBinding>,
    output: Option<Box<dyn OutputWriter>>,
    log: Vec<LogEntry>,
}

impl Recorder {
    pub fn new(sink: Option<SinkBinding>, output: Option<Box<dyn OutputWriter>>) -> Self {
        Self {
            sink,
            output,
            log: Vec::new(),
        }
    }

    /// Records go nowhere; only the log is kept
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn scan_id(&self) -> Option<ScanId> {
        self.sink.as_ref().map(|b| b.scan_id)
    }

    pub async fn record(&mut self, record: &ChainRecord) -> Result<()> {
        if let Some(output) = self.output.as_mut() {
            output.write_record(record)?;
        }
        if let Some(binding) = &self.sink {
            match record {
                ChainRecord::Nsec(r) => binding.sink.add_nsec_record(binding.scan_id, r).await?,
                ChainRecord::Nsec3(r) => binding.sink.add_nsec3_record(binding.scan_id, r).await?,
            }
        }
        Ok(())
    }

    pub async fn parameters(&mut self, parameters: &Nsec3Parameters) -> Result<()> {
        if let Some(binding) = &self.sink {
            binding
                .sink
                .add_nsec3_parameters(binding.scan_id, parameters)
                .await?;
        }
        Ok(())
    }

    pub async fn zone_type(&mut self, zone_type: ZoneType) -> Result<()> {
        if let Some(binding) = &self.sink {
            binding
                .sink
                .update_zone_type(binding.scan_id, zone_type)
                .await?;
        }
        Ok(())
    }

    /// Emit a scan log entry as a tracing event and store it
    pub async fn log(&mut self, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        match severity {
            Severity::Info => info!("{}", message),
            Severity::Warning => warn!("{}", message),
            Severity::Error | Severity::Critical => error!("{}", message),
        }
        if let Some(binding) = &self.sink {
            if let Err(e) = binding
                .sink
                .add_log(binding.scan_id, severity, &message)
                .await
            {
                error!("Failed to store log entry: {}", e);
            }
        }
        self.log.push(LogEntry {
            time: Utc::now(),
            severity,
            message,
        });
    }

    pub fn finish_output(&mut self, count: usize) -> Result<()> {
        if let Some(output) = self.output.as_mut() {
            output.write_record_count(count)?;
        }
        Ok(())
    }

    pub async fn finish_scan(&mut self, exit_code: i32) -> Result<()> {
        if let Some(binding) = &self.sink {
            binding.sink.finish_scan(binding.scan_id, exit_code).await?;
        }
        Ok(())
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn take_log(&mut self) -> Vec<LogEntry> {
        std::mem::take(&mut self.log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::{NsecRecord, TypeSet};
    use crate::scan::ScanType;
    use crate::sink::MemorySink;

    #[tokio::test]
    async fn test_detached_keeps_log() {
        let mut recorder = Recorder::detached();
        recorder.log(Severity::Warning, "drift").await;
        assert_eq!(recorder.entries().len(), 1);
        assert_eq!(recorder.take_log()[0].message, "drift");
        assert!(recorder.entries().is_empty());
    }

    #[tokio::test]
    async fn test_records_reach_sink() {
        let sink = Arc::new(MemorySink::new());
        let zone: crate::dns::DomainName = "example.".parse().unwrap();
        let scan_id = sink
            .create_scan(&zone, ScanType::Nsec, ZoneType::Nsec)
            .await
            .unwrap();
        let mut recorder = Recorder::new(
            Some(SinkBinding {
                sink: sink.clone(),
                scan_id,
            }),
            None,
        );
        let rec = NsecRecord::new(zone.clone(), zone.clone(), 60, TypeSet::new());
        recorder.record(&rec.into()).await.unwrap();
        recorder.log(Severity::Info, "done").await;
        assert_eq!(sink.nsec_records(scan_id).len(), 1);
        assert_eq!(sink.logs(scan_id).len(), 1);
    }
}
