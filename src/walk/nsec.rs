use tracing::{debug, trace};

use super::cancel::CancelToken;
use super::chain::Chain;
use super::recorder::Recorder;
use super::{AbortReason, WalkOutcome, WalkStatus, query_with_retry};
use crate::config::WalkConfig;
use crate::dns::{ChainRecord, DomainName, NsecRecord, RecordType};
use crate::error::Result;
use crate::provider::QueryProvider;
use crate::scan::Severity;

/// How the next name to query is derived from the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStrategy {
    /// `\000.<frontier>`, the first name after the frontier
    Child,
    /// NSEC query at the frontier itself
    Direct,
    /// First name after every descendant of the frontier
    Subtree,
}

impl ProbeStrategy {
    /// Strategy for the given number of consecutive probes that made no
    /// progress. The subtree successor of the apex would leave the zone,
    /// so it is replaced by a direct query there.
    pub fn for_retry(retry: u32, at_apex: bool) -> Self {
        match retry % 3 {
            0 => ProbeStrategy::Child,
            1 => ProbeStrategy::Direct,
            _ if at_apex => ProbeStrategy::Direct,
            _ => ProbeStrategy::Subtree,
        }
    }

    fn probe(self, frontier: &DomainName) -> Result<(DomainName, RecordType)> {
        match self {
            ProbeStrategy::Child => Ok((frontier.canonical_successor()?, RecordType::A)),
            ProbeStrategy::Direct => Ok((frontier.clone(), RecordType::NSEC)),
            ProbeStrategy::Subtree => Ok((frontier.subtree_successor()?, RecordType::A)),
        }
    }
}

/// What one NSEC answer did to the chain
#[derive(Debug, PartialEq, Eq)]
enum Step {
    Accepted(NsecRecord),
    Stalled(String),
}

/// Follows an NSEC chain from the apex until it wraps back to the apex
pub struct NsecWalker<'a, P: ?Sized> {
    zone: DomainName,
    provider: &'a P,
    config: &'a WalkConfig,
    cancel: CancelToken,
}

impl<'a, P> NsecWalker<'a, P>
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
            .log(Severity::Info, format!("starting NSEC walk of {}", self.zone))
            .await;

        let mut chain: Chain<NsecRecord> = Chain::new();
        let mut frontier = self.zone.clone();
        let mut retries = 0u32;
        let mut queries = 0usize;

        let status = loop {
            if self.cancel.is_cancelled() {
                recorder
                    .log(Severity::Warning, "walk cancelled, keeping partial chain")
                    .await;
                break WalkStatus::Aborted(AbortReason::Cancelled);
            }

            let strategy = ProbeStrategy::for_retry(retries, frontier == self.zone);
            let step = match strategy.probe(&frontier) {
                Ok((probe, rtype)) => {
                    if self.config.log_probes {
                        debug!("{:?} probe {} {}", strategy, probe, rtype);
                    }
                    queries += 1;
                    let response = match query_with_retry(
                        self.provider,
                        &probe,
                        rtype,
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
                    let candidates = response.find_nsec();
                    let selected = if strategy == ProbeStrategy::Direct {
                        candidates.into_iter().find(|r| r.owner == frontier)
                    } else {
                        candidates.into_iter().find(|r| r.covers(&probe))
                    };
                    self.evaluate(&chain, &frontier, selected)
                }
                Err(e) => Step::Stalled(format!("cannot build {:?} probe: {}", strategy, e)),
            };

            match step {
                Step::Accepted(record) => {
                    trace!("Accepted {}", record);
                    retries = 0;
                    let closes = record.next_owner == self.zone;
                    frontier = record.next_owner.clone();
                    recorder.record(&ChainRecord::Nsec(record.clone())).await?;
                    chain.accept(record);
                    if closes {
                        break WalkStatus::Closed;
                    }
                }
                Step::Stalled(why) => {
                    debug!("No progress at {}: {}", frontier, why);
                    retries += 1;
                    if retries > self.config.max_no_progress_retries {
                        recorder
                            .log(
                                Severity::Warning,
                                format!(
                                    "no progress at {} after {} retries ({}), aborting with {} records",
                                    frontier,
                                    self.config.max_no_progress_retries,
                                    why,
                                    chain.len()
                                ),
                            )
                            .await;
                        break WalkStatus::Aborted(AbortReason::NoProgress {
                            frontier: frontier.to_string(),
                            retries: self.config.max_no_progress_retries,
                        });
                    }
                }
            }
        };

        if status.is_closed() {
            recorder
                .log(
                    Severity::Info,
                    format!("NSEC chain closed with {} records", chain.len()),
                )
                .await;
        }

        Ok(WalkOutcome {
            records: chain.into_records().into_iter().map(ChainRecord::Nsec).collect(),
            parameters: Vec::new(),
            status,
            queries,
        })
    }

    fn evaluate(
        &self,
        chain: &Chain<NsecRecord>,
        frontier: &DomainName,
        selected: Option<&NsecRecord>,
    ) -> Step {
        let Some(record) = selected else {
            return Step::Stalled("no covering NSEC record".to_string());
        };
        if !record.owner.is_subdomain_of(&self.zone) {
            return Step::Stalled(format!("owner {} outside the zone", record.owner));
        }
        if chain.contains(&record.owner) {
            return Step::Stalled(format!("{} already visited", record.owner));
        }
        if record.owner < *frontier {
            return Step::Stalled(format!("{} sorts before the frontier", record.owner));
        }
        let next = &record.next_owner;
        if !next.is_subdomain_of(&self.zone) {
            return Step::Stalled(format!("next owner {} outside the zone", next));
        }
        if *next != self.zone {
            if chain.contains(next) {
                return Step::Stalled(format!("next owner {} already visited", next));
            }
            if *next <= record.owner {
                return Step::Stalled(format!("next owner {} does not follow {}", next, record.owner));
            }
        }
        Step::Accepted(record.clone())
    }
}
