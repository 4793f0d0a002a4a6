use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::enums::{RecordClass, RecordType};
use super::name::DomainName;
use crate::dnssec::{Nsec3Parameters, OwnerHash};
use crate::error::Result;

/// Set of types listed in an NSEC/NSEC3 type bitmap, in numeric order
pub type TypeSet = BTreeSet<RecordType>;

/// Render a type set the way type bitmaps are written in zone files
pub fn format_types(types: &TypeSet) -> String {
    types
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NsecRecord {
    pub owner: DomainName,
    pub next_owner: DomainName,
    pub ttl: u32,
    pub class: RecordClass,
    pub types: TypeSet,
}

impl NsecRecord {
    pub fn new(owner: DomainName, next_owner: DomainName, ttl: u32, types: TypeSet) -> Self {
        Self {
            owner,
            next_owner,
            ttl,
            class: RecordClass::IN,
            types,
        }
    }

    /// The last record of a chain points back to (or before) its own owner
    pub fn is_last(&self) -> bool {
        self.next_owner <= self.owner
    }

    /// True if `name` falls in `[owner, next_owner)`, wrapping at the end
    /// of the chain.
    pub fn covers(&self, name: &DomainName) -> bool {
        if self.is_last() {
            *name >= self.owner || *name < self.next_owner
        } else {
            *name >= self.owner && *name < self.next_owner
        }
    }
}

impl fmt::Display for NsecRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\tNSEC\t{} {}",
            self.owner,
            self.ttl,
            self.class,
            self.next_owner,
            format_types(&self.types)
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nsec3Record {
    /// Full owner name, `<hashed_owner>.<zone>`
    pub owner: DomainName,
    pub hashed_owner: OwnerHash,
    pub next_hashed_owner: OwnerHash,
    pub ttl: u32,
    pub class: RecordClass,
    pub types: TypeSet,
    pub parameters: Nsec3Parameters,
    /// Plaintext owner recovered by dictionary matching
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plaintext_owner: Option<DomainName>,
}

impl Nsec3Record {
    /// Build a record from its owner name; the digest is decoded from the
    /// owner's first label.
    pub fn new(
        owner: DomainName,
        next_hashed_owner: OwnerHash,
        ttl: u32,
        types: TypeSet,
        parameters: Nsec3Parameters,
    ) -> Result<Self> {
        let hashed_owner = OwnerHash::from_owner_label(&owner)?;
        Ok(Self {
            owner,
            hashed_owner,
            next_hashed_owner,
            ttl,
            class: RecordClass::IN,
            types,
            parameters,
            plaintext_owner: None,
        })
    }
}

impl fmt::Display for Nsec3Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\tNSEC3\t{} {} {}",
            self.owner,
            self.ttl,
            self.class,
            self.parameters,
            self.next_hashed_owner,
            format_types(&self.types)
        )?;
        if let Some(plain) = &self.plaintext_owner {
            write!(f, "\t; {}", plain)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoaRecord {
    pub owner: DomainName,
    pub ttl: u32,
    pub mname: DomainName,
    pub rname: DomainName,
    pub serial: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnskeyRecord {
    pub owner: DomainName,
    pub ttl: u32,
    pub flags: u16,
    pub protocol: u8,
    pub algorithm: u8,
}

/// An accepted link of a denial chain.
///
/// The variant is fixed when the record is built from a response, so
/// consumers match on it instead of probing for fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChainRecord {
    Nsec(NsecRecord),
    Nsec3(Nsec3Record),
}

impl ChainRecord {
    pub fn owner(&self) -> &DomainName {
        match self {
            ChainRecord::Nsec(r) => &r.owner,
            ChainRecord::Nsec3(r) => &r.owner,
        }
    }

    pub fn ttl(&self) -> u32 {
        match self {
            ChainRecord::Nsec(r) => r.ttl,
            ChainRecord::Nsec3(r) => r.ttl,
        }
    }

    pub fn as_nsec3(&self) -> Option<&Nsec3Record> {
        match self {
            ChainRecord::Nsec3(r) => Some(r),
            ChainRecord::Nsec(_) => None,
        }
    }
}

impl fmt::Display for ChainRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainRecord::Nsec(r) => r.fmt(f),
            ChainRecord::Nsec3(r) => r.fmt(f),
        }
    }
}

impl From<NsecRecord> for ChainRecord {
    fn from(r: NsecRecord) -> Self {
        ChainRecord::Nsec(r)
    }
}

impl From<Nsec3Record> for ChainRecord {
    fn from(r: Nsec3Record) -> Self {
        ChainRecord::Nsec3(r)
    }
}
