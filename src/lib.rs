//! DNSSEC zone walking.
//!
//! Enumerates the owner names of a zone by following its NSEC chain, or
//! maps the hashed owner ring of an NSEC3 zone and recovers plaintext names
//! offline with a dictionary.

pub mod config;
pub mod dictionary;
pub mod dns;
pub mod dnssec;
pub mod error;
pub mod output;
pub mod provider;
pub mod scan;
pub mod sink;
pub mod walk;

pub use config::WalkConfig;
pub use dns::DomainName;
pub use error::{Result, WalkError};
pub use provider::{QueryProvider, StaticZone};
pub use scan::{ScanResult, ScanType, Scanner};
pub use walk::{ZoneType, cancel_pair};
