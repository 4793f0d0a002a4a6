use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use super::random_probe_name;
use super::recorder::Recorder;
use crate::dns::{DomainName, RecordType, ResponseStatus};
use crate::error::{Result, WalkError};
use crate::provider::{QueryProvider, QueryResponse};
use crate::scan::Severity;

/// Kind of authenticated denial a zone uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneType {
    Nsec,
    Nsec3,
    NoDnssec,
    Unknown,
}

impl ZoneType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneType::Nsec => "nsec",
            ZoneType::Nsec3 => "nsec3",
            ZoneType::NoDnssec => "no_dnssec",
            ZoneType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ZoneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ZoneType {
    type Err = WalkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "nsec" => Ok(ZoneType::Nsec),
            "nsec3" => Ok(ZoneType::Nsec3),
            "no_dnssec" => Ok(ZoneType::NoDnssec),
            "unknown" => Ok(ZoneType::Unknown),
            _ => Err(WalkError::InvalidRecord(format!("unknown zone type: {}", s))),
        }
    }
}

/// Detector state; everything but `Probing` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectState {
    Probing,
    Nsec,
    Nsec3,
    Unsigned,
}

/// Classify the answer to one probe.
///
/// Denial records win over the status so a wildcard zone answering
/// NOERROR with an NSEC still resolves. A NOERROR without denial records
/// means the probe hit an existing name and leaves the state at `Probing`.
pub fn classify(response: &QueryResponse) -> Result<DetectState> {
    if !response.find_nsec().is_empty() {
        return Ok(DetectState::Nsec);
    }
    if !response.find_nsec3().is_empty() {
        return Ok(DetectState::Nsec3);
    }
    match response.status {
        ResponseStatus::NxDomain => Ok(DetectState::Unsigned),
        ResponseStatus::NoError => Ok(DetectState::Probing),
        other => Err(WalkError::UnexpectedStatus(other)),
    }
}

/// Probe random names below `zone` until the denial type is known or
/// `max_attempts` probes (0 = unlimited) all hit existing names.
pub async fn detect_zone_type<P>(
    zone: &DomainName,
    provider: &P,
    max_attempts: u32,
    recorder: &mut Recorder,
) -> Result<ZoneType>
where
    P: QueryProvider + ?Sized,
{
    recorder.log(Severity::Info, "detecting zone type...").await;

    let mut attempts = 0u32;
    while max_attempts == 0 || attempts < max_attempts {
        let probe = random_probe_name(zone)?;
        let (response, meta) = provider
            .query(&probe, RecordType::A)
            .await
            .map_err(|source| WalkError::Query {
                name: probe.clone(),
                source,
            })?;
        debug!(
            "Detection probe {} -> {} from {}",
            probe, response.status, meta.server
        );

        match classify(&response)? {
            DetectState::Nsec => {
                recorder.log(Severity::Info, "zone uses NSEC records").await;
                return Ok(ZoneType::Nsec);
            }
            DetectState::Nsec3 => {
                recorder.log(Severity::Info, "zone uses NSEC3 records").await;
                return Ok(ZoneType::Nsec3);
            }
            DetectState::Unsigned => {
                recorder
                    .log(Severity::Info, "zone does not use DNSSEC denial records")
                    .await;
                return Ok(ZoneType::NoDnssec);
            }
            DetectState::Probing => {
                recorder
                    .log(Severity::Info, format!("hit an existing owner name: {}", probe))
                    .await;
            }
        }
        attempts += 1;
    }

    recorder
        .log(
            Severity::Error,
            format!("failed to detect zone type after {} attempt(s)", attempts),
        )
        .await;
    Ok(ZoneType::Unknown)
}
