pub mod enums;
pub mod name;
pub mod records;

pub use enums::{RecordClass, RecordType, ResponseStatus};
pub use name::DomainName;
pub use records::{ChainRecord, DnskeyRecord, Nsec3Record, NsecRecord, SoaRecord, TypeSet};

/// DNS constants
pub mod constants {
    /// Default TTL for synthesized records (1 hour)
    pub const DEFAULT_TTL: u32 = 3600;
}
