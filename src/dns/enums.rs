use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::WalkError;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum RecordType {
    #[default]
    A,
    NS,
    CNAME,
    SOA,
    PTR,
    HINFO,
    MX,
    TXT,
    AAAA,
    SRV,
    NAPTR,
    DS,
    SSHFP,
    RRSIG,
    NSEC,
    DNSKEY,
    NSEC3,
    NSEC3PARAM,
    TLSA,
    CDS,
    CDNSKEY,
    SVCB,
    HTTPS,
    CAA,
    Unknown(u16),
}

impl From<u16> for RecordType {
    fn from(value: u16) -> Self {
        match value {
            1 => RecordType::A,
            2 => RecordType::NS,
            5 => RecordType::CNAME,
            6 => RecordType::SOA,
            12 => RecordType::PTR,
            13 => RecordType::HINFO,
            15 => RecordType::MX,
            16 => RecordType::TXT,
            28 => RecordType::AAAA,
            33 => RecordType::SRV,
            35 => RecordType::NAPTR,
            43 => RecordType::DS,
            44 => RecordType::SSHFP,
            46 => RecordType::RRSIG,
            47 => RecordType::NSEC,
            48 => RecordType::DNSKEY,
            50 => RecordType::NSEC3,
            51 => RecordType::NSEC3PARAM,
            52 => RecordType::TLSA,
            59 => RecordType::CDS,
            60 => RecordType::CDNSKEY,
            64 => RecordType::SVCB,
            65 => RecordType::HTTPS,
            257 => RecordType::CAA,
            x => RecordType::Unknown(x),
        }
    }
}

impl From<RecordType> for u16 {
    fn from(rtype: RecordType) -> u16 {
        match rtype {
            RecordType::A => 1,
            RecordType::NS => 2,
            RecordType::CNAME => 5,
            RecordType::SOA => 6,
            RecordType::PTR => 12,
            RecordType::HINFO => 13,
            RecordType::MX => 15,
            RecordType::TXT => 16,
            RecordType::AAAA => 28,
            RecordType::SRV => 33,
            RecordType::NAPTR => 35,
            RecordType::DS => 43,
            RecordType::SSHFP => 44,
            RecordType::RRSIG => 46,
            RecordType::NSEC => 47,
            RecordType::DNSKEY => 48,
            RecordType::NSEC3 => 50,
            RecordType::NSEC3PARAM => 51,
            RecordType::TLSA => 52,
            RecordType::CDS => 59,
            RecordType::CDNSKEY => 60,
            RecordType::SVCB => 64,
            RecordType::HTTPS => 65,
            RecordType::CAA => 257,
            RecordType::Unknown(x) => x,
        }
    }
}

impl RecordType {
    pub fn to_u16(self) -> u16 {
        self.into()
    }
}

// Type bitmaps list types in numeric order
impl Ord for RecordType {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_u16().cmp(&other.to_u16())
    }
}

impl PartialOrd for RecordType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::Unknown(x) => write!(f, "TYPE{}", x),
            other => write!(f, "{:?}", other),
        }
    }
}

impl FromStr for RecordType {
    type Err = WalkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        if let Some(num) = upper.strip_prefix("TYPE") {
            let value = num
                .parse::<u16>()
                .map_err(|_| WalkError::InvalidRecord(format!("bad record type: {}", s)))?;
            return Ok(RecordType::from(value));
        }
        let rtype = match upper.as_str() {
            "A" => RecordType::A,
            "NS" => RecordType::NS,
            "CNAME" => RecordType::CNAME,
            "SOA" => RecordType::SOA,
            "PTR" => RecordType::PTR,
            "HINFO" => RecordType::HINFO,
            "MX" => RecordType::MX,
            "TXT" => RecordType::TXT,
            "AAAA" => RecordType::AAAA,
            "SRV" => RecordType::SRV,
            "NAPTR" => RecordType::NAPTR,
            "DS" => RecordType::DS,
            "SSHFP" => RecordType::SSHFP,
            "RRSIG" => RecordType::RRSIG,
            "NSEC" => RecordType::NSEC,
            "DNSKEY" => RecordType::DNSKEY,
            "NSEC3" => RecordType::NSEC3,
            "NSEC3PARAM" => RecordType::NSEC3PARAM,
            "TLSA" => RecordType::TLSA,
            "CDS" => RecordType::CDS,
            "CDNSKEY" => RecordType::CDNSKEY,
            "SVCB" => RecordType::SVCB,
            "HTTPS" => RecordType::HTTPS,
            "CAA" => RecordType::CAA,
            _ => return Err(WalkError::InvalidRecord(format!("bad record type: {}", s))),
        };
        Ok(rtype)
    }
}

impl Serialize for RecordType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RecordType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum RecordClass {
    #[default]
    IN,
    CH,
    HS,
    Unknown(u16),
}

impl From<u16> for RecordClass {
    fn from(value: u16) -> Self {
        match value {
            1 => RecordClass::IN,
            3 => RecordClass::CH,
            4 => RecordClass::HS,
            x => RecordClass::Unknown(x),
        }
    }
}

impl From<RecordClass> for u16 {
    fn from(class: RecordClass) -> u16 {
        match class {
            RecordClass::IN => 1,
            RecordClass::CH => 3,
            RecordClass::HS => 4,
            RecordClass::Unknown(x) => x,
        }
    }
}

impl fmt::Display for RecordClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordClass::Unknown(x) => write!(f, "CLASS{}", x),
            other => write!(f, "{:?}", other),
        }
    }
}

impl FromStr for RecordClass {
    type Err = WalkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        match upper.as_str() {
            "IN" => Ok(RecordClass::IN),
            "CH" => Ok(RecordClass::CH),
            "HS" => Ok(RecordClass::HS),
            other => other
                .strip_prefix("CLASS")
                .and_then(|n| n.parse::<u16>().ok())
                .map(RecordClass::from)
                .ok_or_else(|| WalkError::InvalidRecord(format!("bad record class: {}", s))),
        }
    }
}

impl Serialize for RecordClass {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RecordClass {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Response classification exposed by a query provider
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseStatus {
    NoError,
    NxDomain,
    ServFail,
    Other(u8),
}

impl ResponseStatus {
    /// Classify a raw RCODE (RFC 1035 4.1.1)
    pub fn from_rcode(rcode: u8) -> Self {
        match rcode {
            0 => ResponseStatus::NoError,
            2 => ResponseStatus::ServFail,
            3 => ResponseStatus::NxDomain,
            x => ResponseStatus::Other(x),
        }
    }

    pub fn to_rcode(self) -> u8 {
        match self {
            ResponseStatus::NoError => 0,
            ResponseStatus::ServFail => 2,
            ResponseStatus::NxDomain => 3,
            ResponseStatus::Other(x) => x,
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseStatus::NoError => write!(f, "NOERROR"),
            ResponseStatus::NxDomain => write!(f, "NXDOMAIN"),
            ResponseStatus::ServFail => write!(f, "SERVFAIL"),
            ResponseStatus::Other(1) => write!(f, "FORMERR"),
            ResponseStatus::Other(4) => write!(f, "NOTIMP"),
            ResponseStatus::Other(5) => write!(f, "REFUSED"),
            ResponseStatus::Other(9) => write!(f, "NOTAUTH"),
            ResponseStatus::Other(x) => write!(f, "RCODE{}", x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_type_round_trip_numbers() {
        for code in [1u16, 2, 6, 46, 47, 48, 50, 51, 257, 4242] {
            assert_eq!(RecordType::from(code).to_u16(), code);
        }
    }

    #[test]
    fn test_record_type_mnemonics() {
        assert_eq!("nsec3".parse::<RecordType>().unwrap(), RecordType::NSEC3);
        assert_eq!("TYPE999".parse::<RecordType>().unwrap(), RecordType::Unknown(999));
        assert_eq!(RecordType::Unknown(999).to_string(), "TYPE999");
        assert_eq!(RecordType::DNSKEY.to_string(), "DNSKEY");
        assert!("BOGUS".parse::<RecordType>().is_err());
    }

    #[test]
    fn test_record_type_numeric_order() {
        assert!(RecordType::A < RecordType::NS);
        assert!(RecordType::RRSIG < RecordType::NSEC);
        assert!(RecordType::HTTPS < RecordType::CAA);
    }

    #[test]
    fn test_response_status() {
        assert_eq!(ResponseStatus::from_rcode(3), ResponseStatus::NxDomain);
        assert_eq!(ResponseStatus::from_rcode(5).to_string(), "REFUSED");
        assert_eq!(ResponseStatus::ServFail.to_rcode(), 2);
    }
}
