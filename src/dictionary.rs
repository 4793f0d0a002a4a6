//! Offline recovery of NSEC3 owner names from a word list.
//!
//! Each candidate is placed under the zone apex, hashed with the chain's
//! parameters and looked up in the set of observed digests.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::dns::{ChainRecord, DomainName};
use crate::dnssec::{Nsec3Parameters, OwnerHash, nsec3_hash};
use crate::error::{Result, WalkError};
use crate::scan::ScanResult;

/// A digest whose plaintext owner was found
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryMatch {
    pub hashed_owner: OwnerHash,
    pub name: DomainName,
}

/// Matches candidates against the digests of one parameter set
#[derive(Clone)]
pub struct DictionaryMatcher {
    zone: DomainName,
    parameters: Nsec3Parameters,
    digests: Arc<HashSet<OwnerHash>>,
}

impl DictionaryMatcher {
    pub fn new<I>(zone: DomainName, parameters: Nsec3Parameters, digests: I) -> Result<Self>
    where
        I: IntoIterator<Item = OwnerHash>,
    {
        parameters.algorithm()?;
        Ok(Self {
            zone,
            parameters,
            digests: Arc::new(digests.into_iter().collect()),
        })
    }

    /// One matcher per chain seen in the scan, each holding the digests
    /// produced under it. Records differing only in their flags share a
    /// matcher.
    pub fn from_scan(result: &ScanResult) -> Result<Vec<Self>> {
        let mut grouped: Vec<(Nsec3Parameters, Vec<OwnerHash>)> = result
            .nsec3_parameters
            .iter()
            .map(|p| (p.clone(), Vec::new()))
            .collect();
        for record in result.records.iter().filter_map(ChainRecord::as_nsec3) {
            match grouped
                .iter_mut()
                .find(|(p, _)| p.same_chain(&record.parameters))
            {
                Some((_, digests)) => digests.push(record.hashed_owner.clone()),
                None => grouped.push((
                    record.parameters.clone(),
                    vec![record.hashed_owner.clone()],
                )),
            }
        }
        grouped
            .into_iter()
            .filter(|(_, digests)| !digests.is_empty())
            .map(|(params, digests)| Self::new(result.zone.clone(), params, digests))
            .collect()
    }

    pub fn parameters(&self) -> &Nsec3Parameters {
        &self.parameters
    }

    pub fn digest_count(&self) -> usize {
        self.digests.len()
    }

    /// Hash one candidate and check it against the digest set.
    ///
    /// Candidates are relative to the apex and may span several labels;
    /// ones that do not form a valid name in the zone are skipped.
    pub fn match_candidate(&self, candidate: &str) -> Option<DictionaryMatch> {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return None;
        }
        let name = match DomainName::from_relative(candidate, &self.zone) {
            Ok(name) if name.is_subdomain_of(&self.zone) => name,
            Ok(name) => {
                debug!("Skipping candidate {} outside {}", name, self.zone);
                return None;
            }
            Err(e) => {
                debug!("Skipping candidate {:?}: {}", candidate, e);
                return None;
            }
        };
        let hash = nsec3_hash(&name, &self.parameters).ok()?;
        self.digests.contains(&hash).then_some(DictionaryMatch {
            hashed_owner: hash,
            name,
        })
    }

    /// Match `words` on `workers` blocking tasks (see
    /// [`crate::config::WalkConfig::effective_workers`]). Results are sorted by digest.
    pub async fn run(&self, words: Vec<String>, workers: usize) -> Result<Vec<DictionaryMatch>> {
        let workers = workers.max(1);
        let total = words.len();
        let shard_size = total.div_ceil(workers).max(1);
        let found: Arc<DashMap<OwnerHash, DomainName>> = Arc::new(DashMap::new());

        let mut words = words;
        let mut handles = Vec::with_capacity(workers);
        while !words.is_empty() {
            let rest = words.split_off(shard_size.min(words.len()));
            let shard = std::mem::replace(&mut words, rest);
            let matcher = self.clone();
            let found = Arc::clone(&found);
            handles.push(tokio::task::spawn_blocking(move || {
                for word in &shard {
                    if let Some(hit) = matcher.match_candidate(word) {
                        found.entry(hit.hashed_owner).or_insert(hit.name);
                    }
                }
            }));
        }

        for joined in futures::future::join_all(handles).await {
            joined.map_err(|e| WalkError::Worker(e.to_string()))?;
        }

        let mut matches: Vec<DictionaryMatch> = found
            .iter()
            .map(|entry| DictionaryMatch {
                hashed_owner: entry.key().clone(),
                name: entry.value().clone(),
            })
            .collect();
        matches.sort_by(|a, b| a.hashed_owner.cmp(&b.hashed_owner));

        info!(
            "Dictionary matched {} of {} digests from {} candidates",
            matches.len(),
            self.digests.len(),
            total
        );
        Ok(matches)
    }
}

/// Fill in the plaintext owner of every NSEC3 record with a match.
/// Returns the number of records updated.
pub fn attach_matches(records: &mut [ChainRecord], matches: &[DictionaryMatch]) -> usize {
    let by_hash: BTreeMap<&OwnerHash, &DomainName> = matches
        .iter()
        .map(|m| (&m.hashed_owner, &m.name))
        .collect();
    let mut updated = 0;
    for record in records.iter_mut() {
        if let ChainRecord::Nsec3(rec) = record {
            if let Some(name) = by_hash.get(&rec.hashed_owner) {
                rec.plaintext_owner = Some((*name).clone());
                updated += 1;
            }
        }
    }
    updated
}

/// Read candidates, one per line. Blank lines and `#` comments are skipped.
pub fn read_wordlist(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path.as_ref())?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}
