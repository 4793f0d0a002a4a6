//! Common test utilities for zone walking tests
//!
//! Scripted providers for answers a real zone would not give, and builders
//! for the static zones most tests walk.

#![allow(dead_code)] // These functions are used by various test files

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use zonewalk::dns::{DnskeyRecord, DomainName, RecordType, ResponseStatus, SoaRecord};
use zonewalk::dnssec::Nsec3Parameters;
use zonewalk::provider::{
    Denial, ProviderError, QueryMeta, QueryProvider, QueryResponse, ResponseRecord, StaticZone,
};

type Handler =
    Box<dyn Fn(usize, &DomainName, RecordType) -> Result<QueryResponse, ProviderError> + Send + Sync>;

/// Answers every query through a closure that also sees the query index
pub struct ScriptedProvider {
    handler: Handler,
    queries: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(usize, &DomainName, RecordType) -> Result<QueryResponse, ProviderError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            handler: Box::new(handler),
            queries: AtomicUsize::new(0),
        }
    }

    /// Valid SOA and DNSKEY at `apex`; everything else goes to `handler`
    pub fn signed_apex<F>(apex: &str, handler: F) -> Self
    where
        F: Fn(usize, &DomainName, RecordType) -> Result<QueryResponse, ProviderError>
            + Send
            + Sync
            + 'static,
    {
        let apex = name(apex);
        Self::new(move |i, qname, rtype| match rtype {
            RecordType::SOA if *qname == apex => Ok(soa_response(&apex)),
            RecordType::DNSKEY if *qname == apex => Ok(dnskey_response(&apex)),
            _ => handler(i, qname, rtype),
        })
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryProvider for ScriptedProvider {
    async fn query(
        &self,
        name: &DomainName,
        rtype: RecordType,
    ) -> Result<(QueryResponse, QueryMeta), ProviderError> {
        let index = self.queries.fetch_add(1, Ordering::SeqCst);
        let response = (self.handler)(index, name, rtype)?;
        Ok((
            response,
            QueryMeta {
                server: "scripted".to_string(),
                ..Default::default()
            },
        ))
    }
}

/// Fails the first `failures` queries with a timeout, then delegates
pub struct FlakyProvider<P> {
    inner: P,
    failures: AtomicUsize,
}

impl<P> FlakyProvider<P> {
    pub fn new(inner: P, failures: usize) -> Self {
        Self {
            inner,
            failures: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl<P: QueryProvider> QueryProvider for FlakyProvider<P> {
    async fn query(
        &self,
        name: &DomainName,
        rtype: RecordType,
    ) -> Result<(QueryResponse, QueryMeta), ProviderError> {
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(ProviderError::Timeout);
        }
        self.inner.query(name, rtype).await
    }
}

pub fn name(s: &str) -> DomainName {
    s.parse().expect("valid test name")
}

pub fn soa_response(owner: &DomainName) -> QueryResponse {
    QueryResponse::new(ResponseStatus::NoError).with_record(ResponseRecord::Soa(SoaRecord {
        owner: owner.clone(),
        ttl: 3600,
        mname: owner.prepend(b"ns1").unwrap(),
        rname: owner.prepend(b"hostmaster").unwrap(),
        serial: 1,
    }))
}

pub fn dnskey_response(owner: &DomainName) -> QueryResponse {
    QueryResponse::new(ResponseStatus::NoError).with_record(ResponseRecord::Dnskey(DnskeyRecord {
        owner: owner.clone(),
        ttl: 3600,
        flags: 257,
        protocol: 3,
        algorithm: 13,
    }))
}

/// A static zone from listing text
pub fn zone_from_listing(apex: &str, denial: Denial, listing: &str) -> StaticZone {
    let mut builder = StaticZone::builder(name(apex), denial);
    builder.add_listing(listing).expect("valid listing");
    builder.build().expect("zone builds")
}

/// NSEC-signed `example.` with a few names, an empty non-terminal and a
/// name below another owner
pub fn nsec_example() -> StaticZone {
    zone_from_listing(
        "example.",
        Denial::Nsec,
        "a A MX\n\
         ns1 A\n\
         host.sub AAAA\n\
         x.a TXT\n\
         yljkjljk.a A\n\
         z A\n",
    )
}

/// NSEC3-signed `example.com.` holding `www` and `mail`, unsalted, no
/// extra iterations
pub fn nsec3_example_com() -> StaticZone {
    zone_from_listing(
        "example.com.",
        Denial::Nsec3(Nsec3Parameters::sha1(0, Vec::new())),
        "www A AAAA\nmail MX\n",
    )
}
