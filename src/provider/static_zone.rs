//! A query provider that answers from an in-memory signed zone.
//!
//! The zone is described by its owner names and their types; NSEC or NSEC3
//! chains are generated at build time and denial-of-existence proofs are
//! synthesized per query the way an authoritative server would. Used to
//! walk zones offline and to drive the walkers in tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, trace};

use super::{ProviderError, QueryMeta, QueryProvider, QueryResponse, ResponseRecord};
use crate::dns::constants::DEFAULT_TTL;
use crate::dns::{
    DnskeyRecord, DomainName, Nsec3Record, NsecRecord, RecordType, ResponseStatus, SoaRecord,
    TypeSet,
};
use crate::dnssec::{Nsec3Parameters, OwnerHash, nsec3_hash};
use crate::error::{Result, WalkError};

const RCODE_REFUSED: u8 = 5;

/// How a static zone proves non-existence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    Nsec,
    Nsec3(Nsec3Parameters),
    /// Unsigned zone, no proofs at all
    None,
}

impl Denial {
    pub fn is_signed(&self) -> bool {
        !matches!(self, Denial::None)
    }
}

pub struct StaticZoneBuilder {
    apex: DomainName,
    ttl: u32,
    denial: Denial,
    nodes: BTreeMap<DomainName, TypeSet>,
}

impl StaticZoneBuilder {
    pub fn new(apex: DomainName, denial: Denial) -> Self {
        Self {
            apex,
            ttl: DEFAULT_TTL,
            denial,
            nodes: BTreeMap::new(),
        }
    }

    pub fn ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Add an owner name with the given types. Types accumulate when a name
    /// is added twice.
    pub fn add_name<I>(&mut self, name: DomainName, types: I) -> Result<()>
    where
        I: IntoIterator<Item = RecordType>,
    {
        if !name.is_subdomain_of(&self.apex) {
            return Err(WalkError::InvalidRecord(format!(
                "{} is outside zone {}",
                name, self.apex
            )));
        }
        self.nodes.entry(name).or_default().extend(types);
        Ok(())
    }

    /// Chainable variant of [`add_name`](Self::add_name) for building zones
    /// from string literals.
    pub fn with_name(mut self, name: &str, types: &[RecordType]) -> Result<Self> {
        let name = DomainName::from_relative(name, &self.apex)?;
        self.add_name(name, types.iter().copied())?;
        Ok(self)
    }

    /// Add names from a listing: one owner per line, relative to the apex
    /// unless it ends with a dot, followed by optional record types (`A` if
    /// none). `;` and `#` start comments.
    pub fn add_listing(&mut self, text: &str) -> Result<usize> {
        let mut added = 0;
        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.split([';', '#']).next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }
            let mut parts = line.split_whitespace();
            let Some(owner) = parts.next() else {
                continue;
            };
            let name = DomainName::from_relative(owner, &self.apex).map_err(|e| {
                WalkError::InvalidRecord(format!("line {}: {}", lineno + 1, e))
            })?;
            let mut types = parts
                .map(str::parse::<RecordType>)
                .collect::<Result<Vec<_>>>()?;
            if types.is_empty() {
                types.push(RecordType::A);
            }
            self.add_name(name, types)?;
            added += 1;
        }
        Ok(added)
    }

    pub fn build(self) -> Result<StaticZone> {
        let Self {
            apex,
            ttl,
            denial,
            mut nodes,
        } = self;
        let signed = denial.is_signed();

        let apex_types = nodes.entry(apex.clone()).or_default();
        apex_types.extend([RecordType::SOA, RecordType::NS]);
        match &denial {
            Denial::Nsec => apex_types.insert(RecordType::DNSKEY),
            Denial::Nsec3(_) => {
                apex_types.insert(RecordType::NSEC3PARAM);
                apex_types.insert(RecordType::DNSKEY)
            }
            Denial::None => false,
        };
        if signed {
            for types in nodes.values_mut() {
                types.insert(RecordType::RRSIG);
                if denial == Denial::Nsec {
                    types.insert(RecordType::NSEC);
                }
            }
        }

        // empty non-terminals between each owner and the apex
        let mut ents = BTreeSet::new();
        for name in nodes.keys() {
            let mut cur = name.parent();
            while let Some(parent) = cur {
                if !parent.is_subdomain_of(&apex) || parent == apex {
                    break;
                }
                if !nodes.contains_key(&parent) {
                    ents.insert(parent.clone());
                }
                cur = parent.parent();
            }
        }

        let mut nsec = Vec::new();
        let mut nsec3 = Vec::new();
        match &denial {
            Denial::Nsec => {
                let owners: Vec<&DomainName> = nodes.keys().collect();
                for (i, owner) in owners.iter().enumerate() {
                    let next = owners.get(i + 1).copied().unwrap_or(&apex);
                    nsec.push(NsecRecord::new(
                        (*owner).clone(),
                        next.clone(),
                        ttl,
                        nodes[*owner].clone(),
                    ));
                }
            }
            Denial::Nsec3(params) => {
                let mut ring: BTreeMap<OwnerHash, TypeSet> = BTreeMap::new();
                for (name, types) in &nodes {
                    ring.insert(nsec3_hash(name, params)?, types.clone());
                }
                for name in &ents {
                    ring.insert(nsec3_hash(name, params)?, TypeSet::new());
                }
                let hashes: Vec<&OwnerHash> = ring.keys().collect();
                for (i, hash) in hashes.iter().enumerate() {
                    let next = hashes.get(i + 1).copied().unwrap_or(hashes[0]);
                    nsec3.push(Nsec3Record::new(
                        hash.owner_name(&apex)?,
                        next.clone(),
                        ttl,
                        ring[*hash].clone(),
                        params.clone(),
                    )?);
                }
            }
            Denial::None => {}
        }

        debug!(
            "Built static zone {}: {} owners, {} empty non-terminals, {} NSEC, {} NSEC3",
            apex,
            nodes.len(),
            ents.len(),
            nsec.len(),
            nsec3.len()
        );

        Ok(StaticZone {
            apex,
            ttl,
            denial,
            nodes,
            ents,
            nsec,
            nsec3,
            queries: AtomicUsize::new(0),
        })
    }
}

/// An authoritative view of one zone held entirely in memory
pub struct StaticZone {
    apex: DomainName,
    ttl: u32,
    denial: Denial,
    nodes: BTreeMap<DomainName, TypeSet>,
    ents: BTreeSet<DomainName>,
    /// Sorted in canonical order
    nsec: Vec<NsecRecord>,
    /// Sorted in hash order
    nsec3: Vec<Nsec3Record>,
    queries: AtomicUsize,
}

impl StaticZone {
    pub fn builder(apex: DomainName, denial: Denial) -> StaticZoneBuilder {
        StaticZoneBuilder::new(apex, denial)
    }

    pub fn apex(&self) -> &DomainName {
        &self.apex
    }

    pub fn denial(&self) -> &Denial {
        &self.denial
    }

    /// Owner names holding data, apex included
    pub fn owner_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nsec_records(&self) -> &[NsecRecord] {
        &self.nsec
    }

    pub fn nsec3_records(&self) -> &[Nsec3Record] {
        &self.nsec3
    }

    /// Number of queries answered so far
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::Relaxed)
    }

    fn exists(&self, name: &DomainName) -> bool {
        self.nodes.contains_key(name) || self.ents.contains(name)
    }

    fn closest_encloser(&self, name: &DomainName) -> DomainName {
        let mut cur = name.parent();
        while let Some(candidate) = cur {
            if self.exists(&candidate) {
                return candidate;
            }
            if candidate == self.apex {
                break;
            }
            cur = candidate.parent();
        }
        self.apex.clone()
    }

    /// The ancestor of `name` one label below `encloser`
    fn next_closer(name: &DomainName, encloser: &DomainName) -> DomainName {
        let mut cur = name.clone();
        while cur.label_count() > encloser.label_count() + 1 {
            match cur.parent() {
                Some(parent) => cur = parent,
                None => break,
            }
        }
        cur
    }

    fn nsec_covering(&self, name: &DomainName) -> Option<&NsecRecord> {
        let idx = self.nsec.partition_point(|r| r.owner <= *name);
        if idx == 0 {
            self.nsec.last()
        } else {
            self.nsec.get(idx - 1)
        }
    }

    fn nsec3_covering(&self, hash: &OwnerHash) -> Option<&Nsec3Record> {
        let idx = self.nsec3.partition_point(|r| r.hashed_owner <= *hash);
        if idx == 0 {
            self.nsec3.last()
        } else {
            self.nsec3.get(idx - 1)
        }
    }

    fn nsec3_matching(&self, hash: &OwnerHash) -> Option<&Nsec3Record> {
        self.nsec3
            .binary_search_by(|r| r.hashed_owner.cmp(hash))
            .ok()
            .map(|idx| &self.nsec3[idx])
    }

    fn soa(&self) -> SoaRecord {
        SoaRecord {
            owner: self.apex.clone(),
            ttl: self.ttl,
            mname: self
                .apex
                .prepend(b"ns1")
                .unwrap_or_else(|_| self.apex.clone()),
            rname: self
                .apex
                .prepend(b"hostmaster")
                .unwrap_or_else(|_| self.apex.clone()),
            serial: 1,
        }
    }

    fn dnskey(&self) -> DnskeyRecord {
        DnskeyRecord {
            owner: self.apex.clone(),
            ttl: self.ttl,
            flags: 257,
            protocol: 3,
            algorithm: 13,
        }
    }

    fn answer(&self, name: &DomainName, rtype: RecordType) -> Result<QueryResponse> {
        if !name.is_subdomain_of(&self.apex) {
            return Ok(QueryResponse::new(ResponseStatus::Other(RCODE_REFUSED)));
        }

        let mut proof = Proof::default();

        if self.exists(name) {
            let has_type = self.nodes.get(name).is_some_and(|t| t.contains(&rtype));
            let mut response = QueryResponse::new(ResponseStatus::NoError);
            match rtype {
                RecordType::SOA if *name == self.apex => {
                    response.records.push(ResponseRecord::Soa(self.soa()));
                }
                RecordType::DNSKEY if *name == self.apex && self.denial.is_signed() => {
                    response.records.push(ResponseRecord::Dnskey(self.dnskey()));
                }
                RecordType::NSEC if self.denial == Denial::Nsec => {
                    if let Some(rec) = self.nsec_covering(name) {
                        proof.nsec(rec);
                    }
                }
                _ if has_type => {}
                // NODATA
                _ => match &self.denial {
                    Denial::Nsec => {
                        if let Some(rec) = self.nsec_covering(name) {
                            proof.nsec(rec);
                        }
                    }
                    Denial::Nsec3(params) => {
                        if let Some(rec) = self.nsec3_matching(&nsec3_hash(name, params)?) {
                            proof.nsec3(rec);
                        }
                    }
                    Denial::None => {}
                },
            }
            response.records.extend(proof.into_records());
            return Ok(response);
        }

        let encloser = self.closest_encloser(name);
        let wildcard = encloser.prepend(b"*")?;
        let wildcard_exists = self.nodes.contains_key(&wildcard);
        let status = if wildcard_exists {
            ResponseStatus::NoError
        } else {
            ResponseStatus::NxDomain
        };

        match &self.denial {
            Denial::Nsec => {
                if let Some(rec) = self.nsec_covering(name) {
                    proof.nsec(rec);
                }
                if !wildcard_exists {
                    if let Some(rec) = self.nsec_covering(&wildcard) {
                        proof.nsec(rec);
                    }
                }
            }
            Denial::Nsec3(params) => {
                let next_closer = Self::next_closer(name, &encloser);
                if let Some(rec) = self.nsec3_matching(&nsec3_hash(&encloser, params)?) {
                    proof.nsec3(rec);
                }
                if let Some(rec) = self.nsec3_covering(&nsec3_hash(&next_closer, params)?) {
                    proof.nsec3(rec);
                }
                if !wildcard_exists {
                    if let Some(rec) = self.nsec3_covering(&nsec3_hash(&wildcard, params)?) {
                        proof.nsec3(rec);
                    }
                }
            }
            Denial::None => {}
        }

        let mut response = QueryResponse::new(status);
        response.records.extend(proof.into_records());
        Ok(response)
    }
}

/// Denial records for one response, without duplicates
#[derive(Default)]
struct Proof {
    records: Vec<ResponseRecord>,
}

impl Proof {
    fn nsec(&mut self, rec: &NsecRecord) {
        let rec = ResponseRecord::Nsec(rec.clone());
        if !self.records.contains(&rec) {
            self.records.push(rec);
        }
    }

    fn nsec3(&mut self, rec: &Nsec3Record) {
        let rec = ResponseRecord::Nsec3(rec.clone());
        if !self.records.contains(&rec) {
            self.records.push(rec);
        }
    }

    fn into_records(self) -> Vec<ResponseRecord> {
        self.records
    }
}

#[async_trait]
impl QueryProvider for StaticZone {
    async fn query(
        &self,
        name: &DomainName,
        rtype: RecordType,
    ) -> std::result::Result<(QueryResponse, QueryMeta), ProviderError> {
        let started = Instant::now();
        self.queries.fetch_add(1, Ordering::Relaxed);

        let response = self
            .answer(name, rtype)
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        trace!(
            "static {} {} -> {} ({} records)",
            name,
            rtype,
            response.status,
            response.records.len()
        );

        Ok((
            response,
            QueryMeta {
                server: format!("static:{}", self.apex),
                elapsed: started.elapsed(),
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> DomainName {
        s.parse().unwrap()
    }

    fn nsec_zone() -> StaticZone {
        StaticZone::builder(name("example."), Denial::Nsec)
            .with_name("a", &[RecordType::A])
            .unwrap()
            .with_name("b.c", &[RecordType::TXT])
            .unwrap()
            .with_name("z", &[RecordType::AAAA])
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_nsec_chain_is_closed_and_ordered() {
        let zone = nsec_zone();
        let owners: Vec<String> = zone
            .nsec_records()
            .iter()
            .map(|r| r.owner.to_string())
            .collect();
        assert_eq!(owners, vec!["example.", "a.example.", "b.c.example.", "z.example."]);
        let last = zone.nsec_records().last().unwrap();
        assert_eq!(last.next_owner, name("example."));
    }

    #[tokio::test]
    async fn test_nxdomain_carries_covering_nsec() {
        let zone = nsec_zone();
        let (resp, _) = zone
            .query(&name("b.example."), RecordType::A)
            .await
            .unwrap();
        assert_eq!(resp.status, ResponseStatus::NxDomain);
        let nsec = resp.find_nsec();
        assert!(nsec.iter().any(|r| r.owner == name("a.example.")));
        assert_eq!(zone.query_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_non_terminal_is_nodata() {
        let zone = nsec_zone();
        let (resp, _) = zone
            .query(&name("c.example."), RecordType::A)
            .await
            .unwrap();
        assert_eq!(resp.status, ResponseStatus::NoError);
    }

    #[tokio::test]
    async fn test_out_of_zone_is_refused() {
        let zone = nsec_zone();
        let (resp, _) = zone
            .query(&name("example.org."), RecordType::A)
            .await
            .unwrap();
        assert_eq!(resp.status, ResponseStatus::Other(RCODE_REFUSED));
    }

    #[test]
    fn test_nsec3_ring_includes_empty_non_terminals() {
        let zone = StaticZone::builder(
            name("example."),
            Denial::Nsec3(Nsec3Parameters::sha1(0, Vec::new())),
        )
        .with_name("b.c", &[RecordType::A])
        .unwrap()
        .build()
        .unwrap();
        // apex, c (empty non-terminal), b.c
        assert_eq!(zone.nsec3_records().len(), 3);
        let ring = zone.nsec3_records();
        assert_eq!(ring.last().unwrap().next_hashed_owner, ring[0].hashed_owner);
    }

    #[test]
    fn test_listing() {
        let mut builder = StaticZone::builder(name("example.com."), Denial::Nsec);
        let added = builder
            .add_listing("; comment\nwww A AAAA\nmail MX # trailing\n\nftp.example.com.\n")
            .unwrap();
        assert_eq!(added, 3);
        let zone = builder.build().unwrap();
        assert_eq!(zone.owner_count(), 4);
        assert!(
            StaticZone::builder(name("example.com."), Denial::Nsec)
                .add_listing("www.example.org.")
                .is_err()
        );
    }
}
