use ring::digest;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::constants::MAX_NSEC3_ITERATIONS;
use crate::dns::name::DomainName;
use crate::error::{Result, WalkError};

const BASE32HEX: base32::Alphabet = base32::Alphabet::Rfc4648Hex { padding: false };

/// NSEC3 hash algorithms (RFC 5155 section 11)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Nsec3HashAlgorithm {
    /// SHA-1 (RFC 5155)
    Sha1 = 1,
}

impl Nsec3HashAlgorithm {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Sha1),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }

    fn algorithm(&self) -> &'static digest::Algorithm {
        match self {
            Self::Sha1 => &digest::SHA1_FOR_LEGACY_USE_ONLY,
        }
    }
}

impl fmt::Display for Nsec3HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha1 => write!(f, "SHA1"),
        }
    }
}

/// Hash parameters an NSEC3 chain was produced under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Nsec3Parameters {
    pub hash_algorithm: u8,
    pub flags: u8,
    pub iterations: u16,
    #[serde(with = "salt_hex")]
    pub salt: Vec<u8>,
}

impl Nsec3Parameters {
    /// Opt-out flag, bit 0 of the flags field
    pub const OPT_OUT: u8 = 0x01;

    pub fn new(hash_algorithm: u8, flags: u8, iterations: u16, salt: Vec<u8>) -> Self {
        Self {
            hash_algorithm,
            flags,
            iterations,
            salt,
        }
    }

    /// SHA-1 parameters with no flags set
    pub fn sha1(iterations: u16, salt: Vec<u8>) -> Self {
        Self::new(Nsec3HashAlgorithm::Sha1.to_u8(), 0, iterations, salt)
    }

    /// True when both sets hash names the same way. The flags field is
    /// per record (opt-out) and does not separate chains.
    pub fn same_chain(&self, other: &Nsec3Parameters) -> bool {
        self.hash_algorithm == other.hash_algorithm
            && self.iterations == other.iterations
            && self.salt == other.salt
    }

    pub fn opt_out(&self) -> bool {
        self.flags & Self::OPT_OUT != 0
    }

    pub fn algorithm(&self) -> Result<Nsec3HashAlgorithm> {
        Nsec3HashAlgorithm::from_u8(self.hash_algorithm)
            .ok_or(WalkError::UnsupportedHashAlgorithm(self.hash_algorithm))
    }

    /// Salt in presentation format, `-` when empty
    pub fn salt_hex(&self) -> String {
        if self.salt.is_empty() {
            "-".to_string()
        } else {
            hex::encode(&self.salt)
        }
    }

    /// Parse a presentation-format salt (`-` for none)
    pub fn parse_salt(s: &str) -> Result<Vec<u8>> {
        let s = s.trim();
        if s == "-" || s.is_empty() {
            return Ok(Vec::new());
        }
        hex::decode(s).map_err(|_| WalkError::InvalidSalt(s.to_string()))
    }

    /// True when the iteration count exceeds the RFC 5155 ceiling
    pub fn is_expensive(&self) -> bool {
        self.iterations > MAX_NSEC3_ITERATIONS
    }
}

impl fmt::Display for Nsec3Parameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.hash_algorithm,
            self.flags,
            self.iterations,
            self.salt_hex()
        )
    }
}

mod salt_hex {
    use super::Nsec3Parameters;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(salt: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        if salt.is_empty() {
            serializer.serialize_str("-")
        } else {
            serializer.serialize_str(&hex::encode(salt))
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        Nsec3Parameters::parse_salt(&s).map_err(serde::de::Error::custom)
    }
}

/// A hashed owner name digest.
///
/// Ordered bytewise, which is also the order of the base32hex encodings,
/// so a sorted set of `OwnerHash` values is the NSEC3 ring order.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerHash(Vec<u8>);

impl OwnerHash {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lowercase base32hex without padding, as used in NSEC3 owner labels
    pub fn to_base32hex(&self) -> String {
        base32::encode(BASE32HEX, &self.0).to_ascii_lowercase()
    }

    pub fn from_base32hex(s: &str) -> Result<Self> {
        base32::decode(BASE32HEX, &s.trim().to_ascii_uppercase())
            .filter(|bytes| !bytes.is_empty())
            .map(Self)
            .ok_or_else(|| WalkError::InvalidHash(s.to_string()))
    }

    /// Decode the digest carried in the first label of an NSEC3 owner name
    pub fn from_owner_label(owner: &DomainName) -> Result<Self> {
        let label = owner
            .first_label()
            .ok_or_else(|| WalkError::InvalidHash(owner.to_string()))?;
        let label = std::str::from_utf8(label).map_err(|_| WalkError::InvalidHash(owner.to_string()))?;
        Self::from_base32hex(label)
    }

    /// The NSEC3 owner name `<hash>.<zone>`
    pub fn owner_name(&self, zone: &DomainName) -> Result<DomainName> {
        zone.prepend(self.to_base32hex().as_bytes())
    }
}

impl fmt::Display for OwnerHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base32hex())
    }
}

impl fmt::Debug for OwnerHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OwnerHash({})", self.to_base32hex())
    }
}

impl FromStr for OwnerHash {
    type Err = WalkError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_base32hex(s)
    }
}

impl Serialize for OwnerHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base32hex())
    }
}

impl<'de> Deserialize<'de> for OwnerHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Compute the RFC 5155 hash of `name`:
///
/// ```text
/// IH(salt, x, 0) = H(x || salt)
/// IH(salt, x, k) = H(IH(salt, x, k-1) || salt), if k > 0
/// ```
///
/// The owner name is hashed in canonical wire form and `iterations` counts
/// the additional applications, so `H` runs `iterations + 1` times.
pub fn nsec3_hash(name: &DomainName, params: &Nsec3Parameters) -> Result<OwnerHash> {
    let algorithm = params.algorithm()?.algorithm();

    let mut input = name.to_canonical_wire();
    input.extend_from_slice(&params.salt);
    let mut hash = digest::digest(algorithm, &input);

    let mut buf = Vec::with_capacity(hash.as_ref().len() + params.salt.len());
    for _ in 0..params.iterations {
        buf.clear();
        buf.extend_from_slice(hash.as_ref());
        buf.extend_from_slice(&params.salt);
        hash = digest::digest(algorithm, &buf);
    }

    Ok(OwnerHash::from_bytes(hash.as_ref()))
}
