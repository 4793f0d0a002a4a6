use std::collections::BTreeMap;
use tracing::{debug, trace};

use super::cancel::CancelToken;
use super::chain::Chain;
use super::recorder::Recorder;
use super::{AbortReason, WalkOutcome, WalkStatus, query_with_retry, random_probe_name};
use crate::config::WalkConfig;
use crate::dns::{ChainRecord, DomainName, Nsec3Record, RecordType};
use crate::dnssec::{Nsec3Parameters, OwnerHash, nsec3_hash};
use crate::error::Result;
use crate::provider::QueryProvider;
use crate::scan::Severity;

/// Hash-space intervals covered by accepted NSEC3 records, owner to next
#[derive(Debug, Default, Clone)]
pub struct Coverage {
    spans: BTreeMap<OwnerHash, OwnerHash>,
}

impl Coverage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, owner: OwnerHash, next: OwnerHash) {
        self.spans.insert(owner, next);
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// True if an accepted record already proves `hash`
    pub fn covers(&self, hash: &OwnerHash) -> bool {
        if let Some((owner, next)) = self.spans.range(..=hash.clone()).next_back() {
            if next > owner {
                if hash < next {
                    return true;
                }
            } else {
                // wrap record, covers everything from its owner up
                return true;
            }
        }
        // below the smallest owner only the wrap record reaches
        match self.spans.iter().next_back() {
            Some((owner, next)) => next <= owner && hash < next,
            None => false,
        }
    }

    /// Every next digest is a known owner, there is exactly one wrap
    /// record and it points at the smallest owner.
    pub fn is_closed(&self) -> bool {
        let Some(first) = self.spans.keys().next() else {
            return false;
        };
        let mut wraps = 0;
        for (owner, next) in &self.spans {
            if !self.spans.contains_key(next) {
                return false;
            }
            if next <= owner {
                if next != first {
                    return false;
                }
                wraps += 1;
            }
        }
        wraps == 1
    }
}

/// Maps the hashed owner ring of an NSEC3 zone by probing random names
/// that fall into hash ranges not yet covered.
pub struct Nsec3Walker<'a, P: ?Sized> {
    zone: DomainName,
    provider: &'a P,
    config: &'a WalkConfig,
    cancel: CancelToken,
}

/// Walk state that survives from one probe to the next
struct Progress {
    chain: Chain<Nsec3Record>,
    current: Option<Nsec3Parameters>,
    /// One entry per distinct chain (algorithm, iterations, salt), holding
    /// the first parameters seen for it and its coverage
    sets: Vec<(Nsec3Parameters, Coverage)>,
}

/// What became of one NSEC3 record from a response
enum Verdict {
    Accepted,
    Ignored,
    /// Hashed with an algorithm no probe can be computed for
    Unhashable(u8),
}

impl Progress {
    fn coverage(&self, params: &Nsec3Parameters) -> Option<&Coverage> {
        self.sets
            .iter()
            .find(|(p, _)| p.same_chain(params))
            .map(|(_, c)| c)
    }

    fn coverage_mut(&mut self, params: &Nsec3Parameters) -> Option<&mut Coverage> {
        self.sets
            .iter_mut()
            .find(|(p, _)| p.same_chain(params))
            .map(|(_, c)| c)
    }

    fn is_closed(&self) -> bool {
        self.current
            .as_ref()
            .and_then(|p| self.coverage(p))
            .is_some_and(Coverage::is_closed)
    }
}

impl<'a, P> Nsec3Walker<'a, P>
where
    P: QueryProvider + ?Sized,
{
    pub fn new(zone: DomainName, provider: &'a P, config: &'a WalkConfig) -> Self {
        Self {
            zone,
            provider,
            config,
            cancel: CancelToken::never(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn walk(&self, recorder: &mut Recorder) -> Result<WalkOutcome> {
        recorder
            .log(Severity::Info, format!("starting NSEC3 walk of {}", self.zone))
            .await;

        let mut progress = Progress {
            chain: Chain::new(),
            current: None,
            sets: Vec::new(),
        };
        let mut stalls = 0u32;
        let mut queries = 0usize;

        let status = 'walk: loop {
            if progress.is_closed() {
                break WalkStatus::Closed;
            }
            if self.cancel.is_cancelled() {
                recorder
                    .log(Severity::Warning, "walk cancelled, keeping partial chain")
                    .await;
                break WalkStatus::Aborted(AbortReason::Cancelled);
            }

            let accepted = match self.next_probe(&progress)? {
                Some((probe, probe_hash)) => {
                    if self.config.log_probes {
                        debug!("NSEC3 probe {}", probe);
                    }
                    queries += 1;
                    let response = match query_with_retry(
                        self.provider,
                        &probe,
                        RecordType::A,
                        self.config.max_query_retries,
                    )
                    .await
                    {
                        Ok(response) => response,
                        Err(error) => {
                            recorder
                                .log(
                                    Severity::Error,
                                    format!("query for {} failed: {}, aborting walk", probe, error),
                                )
                                .await;
                            break WalkStatus::Aborted(AbortReason::QueryFailed {
                                name: probe,
                                error,
                            });
                        }
                    };
                    let mut accepted = 0;
                    for record in response.find_nsec3() {
                        match self
                            .accept(&mut progress, record, &probe, probe_hash.as_ref(), recorder)
                            .await?
                        {
                            Verdict::Accepted => accepted += 1,
                            Verdict::Ignored => {}
                            Verdict::Unhashable(algorithm) => {
                                recorder
                                    .log(
                                        Severity::Warning,
                                        format!(
                                            "unsupported NSEC3 hash algorithm {} at {}, stopping with {} records",
                                            algorithm,
                                            record.owner,
                                            progress.chain.len()
                                        ),
                                    )
                                    .await;
                                break 'walk WalkStatus::Aborted(
                                    AbortReason::UnsupportedAlgorithm { algorithm },
                                );
                            }
                        }
                    }
                    accepted
                }
                None => {
                    debug!(
                        "No uncovered hash found in {} attempts",
                        self.config.nsec3_max_hash_attempts
                    );
                    0
                }
            };

            if accepted > 0 {
                stalls = 0;
                continue;
            }
            stalls += 1;
            if stalls > self.config.max_no_progress_retries {
                recorder
                    .log(
                        Severity::Warning,
                        format!(
                            "no new NSEC3 records after {} retries, aborting with {} records",
                            self.config.max_no_progress_retries,
                            progress.chain.len()
                        ),
                    )
                    .await;
                break WalkStatus::Aborted(AbortReason::NoProgress {
                    frontier: progress
                        .chain
                        .last()
                        .map(|r| r.next_hashed_owner.to_string())
                        .unwrap_or_default(),
                    retries: self.config.max_no_progress_retries,
                });
            }
        };

        if status.is_closed() {
            recorder
                .log(
                    Severity::Info,
                    format!("NSEC3 chain closed with {} records", progress.chain.len()),
                )
                .await;
        }

        Ok(WalkOutcome {
            records: progress
                .chain
                .into_records()
                .into_iter()
                .map(ChainRecord::Nsec3)
                .collect(),
            parameters: progress.sets.into_iter().map(|(p, _)| p).collect(),
            status,
            queries,
        })
    }

    /// Pick a probe name. Before the parameters are known any random name
    /// will do; afterwards only names hashing outside the covered ranges
    /// are worth a query.
    fn next_probe(&self, progress: &Progress) -> Result<Option<(DomainName, Option<OwnerHash>)>> {
        let Some(params) = progress.current.as_ref() else {
            return Ok(Some((random_probe_name(&self.zone)?, None)));
        };
        let coverage = progress.coverage(params);
        for _ in 0..self.config.nsec3_max_hash_attempts {
            let candidate = random_probe_name(&self.zone)?;
            let hash = nsec3_hash(&candidate, params)?;
            if !coverage.is_some_and(|c| c.covers(&hash)) {
                return Ok(Some((candidate, Some(hash))));
            }
        }
        Ok(None)
    }

    async fn accept(
        &self,
        progress: &mut Progress,
        record: &Nsec3Record,
        probe: &DomainName,
        probe_hash: Option<&OwnerHash>,
        recorder: &mut Recorder,
    ) -> Result<Verdict> {
        if record.owner.parent().as_ref() != Some(&self.zone) {
            debug!("Ignoring NSEC3 record {} outside {}", record.owner, self.zone);
            return Ok(Verdict::Ignored);
        }
        if progress.chain.contains(&record.hashed_owner) {
            return Ok(Verdict::Ignored);
        }

        let params = &record.parameters;
        if params.algorithm().is_err() {
            return Ok(Verdict::Unhashable(params.hash_algorithm));
        }
        if !progress.current.as_ref().is_some_and(|c| c.same_chain(params)) {
            if let Some(previous) = &progress.current {
                recorder
                    .log(
                        Severity::Warning,
                        format!(
                            "NSEC3 parameters changed from ({}) to ({}), continuing with the new set",
                            previous, params
                        ),
                    )
                    .await;
            } else if params.is_expensive() {
                recorder
                    .log(
                        Severity::Warning,
                        format!("NSEC3 iteration count {} is unusually high", params.iterations),
                    )
                    .await;
            }
            if progress.coverage(params).is_none() {
                progress.sets.push((params.clone(), Coverage::new()));
                recorder.parameters(params).await?;
            }
            progress.current = Some(params.clone());
        }

        let mut record = record.clone();
        if probe_hash == Some(&record.hashed_owner) {
            record.plaintext_owner = Some(probe.clone());
        }
        if let Some(coverage) = progress.coverage_mut(params) {
            coverage.insert(record.hashed_owner.clone(), record.next_hashed_owner.clone());
        }
        trace!("Accepted {}", record);
        recorder.record(&ChainRecord::Nsec3(record.clone())).await?;
        progress.chain.accept(record);
        Ok(Verdict::Accepted)
    }
}
