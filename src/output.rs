//! Writers for discovered records and whole scan results.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

use crate::dns::ChainRecord;
use crate::error::Result;
use crate::scan::ScanResult;

/// Receives accepted records in discovery order
pub trait OutputWriter: Send {
    fn write_record(&mut self, record: &ChainRecord) -> Result<()>;

    /// Called once when the walk ends, with the number of records written
    fn write_record_count(&mut self, count: usize) -> Result<()>;
}

/// Zone-file style presentation lines
pub struct ZoneTextWriter<W: Write + Send> {
    out: W,
}

impl ZoneTextWriter<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        info!("Writing records to {}", path.as_ref().display());
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write + Send> ZoneTextWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> OutputWriter for ZoneTextWriter<W> {
    fn write_record(&mut self, record: &ChainRecord) -> Result<()> {
        writeln!(self.out, "{}", record)?;
        Ok(())
    }

    fn write_record_count(&mut self, count: usize) -> Result<()> {
        writeln!(self.out, ";; records found: {}", count)?;
        self.out.flush()?;
        Ok(())
    }
}

/// One JSON object per record, followed by a count object
pub struct JsonResultWriter<W: Write + Send> {
    out: W,
}

impl JsonResultWriter<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write + Send> JsonResultWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> OutputWriter for JsonResultWriter<W> {
    fn write_record(&mut self, record: &ChainRecord) -> Result<()> {
        serde_json::to_writer(&mut self.out, record)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn write_record_count(&mut self, count: usize) -> Result<()> {
        serde_json::to_writer(&mut self.out, &serde_json::json!({ "record_count": count }))?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}

/// Write a scan result as pretty-printed JSON
pub fn save_scan_result(result: &ScanResult, path: impl AsRef<Path>) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer_pretty(&mut writer, result)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    info!(
        "Saved scan of {} ({} records) to {}",
        result.zone,
        result.records.len(),
        path.as_ref().display()
    );
    Ok(())
}

pub fn load_scan_result(path: impl AsRef<Path>) -> Result<ScanResult> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    Ok(serde_json::from_reader(reader)?)
}
