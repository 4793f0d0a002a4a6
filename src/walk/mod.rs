//! Zone validation, type detection and the two chain walkers.

pub mod cancel;
pub mod chain;
pub mod detect;
pub mod nsec;
pub mod nsec3;
pub mod recorder;
pub mod validate;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::dns::{ChainRecord, DomainName, RecordType, ResponseStatus};
use crate::dnssec::Nsec3Parameters;
use crate::error::Result;
use crate::provider::{QueryProvider, QueryResponse};

pub use cancel::{CancelHandle, CancelToken, cancel_pair};
pub use detect::{ZoneType, detect_zone_type};
pub use nsec::NsecWalker;
pub use nsec3::Nsec3Walker;
pub use recorder::{Recorder, SinkBinding};
pub use validate::{check_dnskey, validate_soa};

/// Why a walk stopped before the chain closed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    Cancelled,
    /// Consecutive probes produced nothing new
    NoProgress { frontier: String, retries: u32 },
    /// A query kept failing after its retries
    QueryFailed { name: DomainName, error: String },
    /// An NSEC3 record used a hash algorithm query names cannot be hashed with
    UnsupportedAlgorithm { algorithm: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalkStatus {
    Closed,
    Aborted(AbortReason),
    /// No chain to walk (unsigned or undetected zone)
    NotWalked,
}

impl WalkStatus {
    pub fn is_closed(&self) -> bool {
        matches!(self, WalkStatus::Closed)
    }
}

/// Everything a walker hands back, closed or not
#[derive(Debug, Clone)]
pub struct WalkOutcome {
    /// Accepted records in discovery order
    pub records: Vec<ChainRecord>,
    /// Every distinct NSEC3 parameter set, first seen first
    pub parameters: Vec<Nsec3Parameters>,
    pub status: WalkStatus,
    pub queries: usize,
}

/// A hex label built from a random bit width of 30 to 60 bits
pub(crate) fn random_probe_label() -> String {
    let mut rng = rand::rng();
    let bits = 30 + rng.random_range(0..31u32);
    let value = rng.random::<u64>() & ((1u64 << bits) - 1);
    format!("{:x}", value)
}

/// A random probe name directly below `zone`
pub(crate) fn random_probe_name(zone: &DomainName) -> Result<DomainName> {
    zone.prepend(random_probe_label().as_bytes())
}

/// Query, treating provider errors and SERVFAIL as failures and retrying
/// them up to `retries` more times. The last failure is returned as text.
pub(crate) async fn query_with_retry<P>(
    provider: &P,
    name: &DomainName,
    rtype: RecordType,
    retries: u32,
) -> std::result::Result<QueryResponse, String>
where
    P: QueryProvider + ?Sized,
{
    let mut attempt = 0;
    loop {
        let failure = match provider.query(name, rtype).await {
            Ok((response, meta)) if response.status != ResponseStatus::ServFail => {
                trace!(
                    "{} {} -> {} from {} in {:?}",
                    name, rtype, response.status, meta.server, meta.elapsed
                );
                return Ok(response);
            }
            Ok((response, meta)) => format!("{} from {}", response.status, meta.server),
            Err(e) => e.to_string(),
        };
        if attempt >= retries {
            return Err(failure);
        }
        attempt += 1;
        debug!(
            "Query {} {} failed ({}), retry {}/{}",
            name, rtype, failure, attempt, retries
        );
    }
}
