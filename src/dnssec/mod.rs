pub mod nsec3;

pub use nsec3::{Nsec3HashAlgorithm, Nsec3Parameters, OwnerHash, nsec3_hash};

/// DNSSEC constants
pub mod constants {
    /// Maximum iterations for NSEC3 (RFC 5155, 4096-bit keys)
    pub const MAX_NSEC3_ITERATIONS: u16 = 2500;
}
