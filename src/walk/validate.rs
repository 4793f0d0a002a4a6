use tracing::{debug, info};

use crate::dns::{DomainName, RecordType};
use crate::error::{Result, WalkError};
use crate::provider::QueryProvider;

/// Confirm `zone` is an apex by its SOA.
///
/// Fails when no SOA comes back or when the SOA owner is not the zone.
pub async fn validate_soa<P>(zone: &DomainName, provider: &P) -> Result<()>
where
    P: QueryProvider + ?Sized,
{
    info!("Checking SOA of {}", zone);
    let (response, meta) = provider
        .query(zone, RecordType::SOA)
        .await
        .map_err(|source| WalkError::Query {
            name: zone.clone(),
            source,
        })?;
    debug!("SOA answer from {} in {:?}", meta.server, meta.elapsed);

    let soa = response
        .find_soa()
        .into_iter()
        .next()
        .ok_or_else(|| WalkError::MissingSoa { zone: zone.clone() })?;
    if soa.owner != *zone {
        return Err(WalkError::SoaOwnerMismatch {
            zone: zone.clone(),
            owner: soa.owner.clone(),
        });
    }
    Ok(())
}

/// Returns whether the zone publishes a DNSKEY at its apex.
///
/// A missing DNSKEY only means the zone is unsigned; a DNSKEY under any
/// other owner is rejected.
pub async fn check_dnskey<P>(zone: &DomainName, provider: &P) -> Result<bool>
where
    P: QueryProvider + ?Sized,
{
    info!("Checking DNSKEY of {}", zone);
    let (response, _) = provider
        .query(zone, RecordType::DNSKEY)
        .await
        .map_err(|source| WalkError::Query {
            name: zone.clone(),
            source,
        })?;

    match response.find_dnskey().into_iter().next() {
        None => Ok(false),
        Some(key) if key.owner != *zone => Err(WalkError::DnskeyOwnerMismatch {
            zone: zone.clone(),
            owner: key.owner.clone(),
        }),
        Some(_) => Ok(true),
    }
}
