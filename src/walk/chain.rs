use std::collections::HashSet;
use std::hash::Hash;

use crate::dns::{DomainName, Nsec3Record, NsecRecord};
use crate::dnssec::OwnerHash;

/// A record identified by its position in a chain
pub trait ChainLink {
    type Key: Clone + Eq + Hash + Ord;

    fn key(&self) -> &Self::Key;
}

impl ChainLink for NsecRecord {
    type Key = DomainName;

    fn key(&self) -> &DomainName {
        &self.owner
    }
}

impl ChainLink for Nsec3Record {
    type Key = OwnerHash;

    fn key(&self) -> &OwnerHash {
        &self.hashed_owner
    }
}

/// Accepted records of one walk.
///
/// A record is accepted at most once per key; records keep discovery
/// order.
pub struct Chain<R: ChainLink> {
    visited: HashSet<R::Key>,
    records: Vec<R>,
}

impl<R: ChainLink> Default for Chain<R> {
    fn default() -> Self {
        Self {
            visited: HashSet::new(),
            records: Vec::new(),
        }
    }
}

impl<R: ChainLink> Chain<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `record` unless its key was seen before
    pub fn accept(&mut self, record: R) -> bool {
        if !self.visited.insert(record.key().clone()) {
            return false;
        }
        self.records.push(record);
        true
    }

    pub fn contains(&self, key: &R::Key) -> bool {
        self.visited.contains(key)
    }

    pub fn last(&self) -> Option<&R> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<R> {
        self.records
    }
}
