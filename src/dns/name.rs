use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::{Result, WalkError};

/// Maximum length of a single label in octets (RFC 1035)
pub const MAX_LABEL_LEN: usize = 63;

/// Maximum length of a domain name in wire format (RFC 1035)
pub const MAX_NAME_LEN: usize = 255;

/// An absolute domain name.
///
/// Labels are kept leftmost first, exactly as written in presentation
/// format, with their original case. Equality, hashing and ordering are
/// case-insensitive and follow the canonical DNS name order of RFC 4034
/// section 6.1, so a `BTreeSet<DomainName>` iterates a zone the same way
/// an NSEC chain does.
#[derive(Clone, Default)]
pub struct DomainName {
    labels: Vec<Box<[u8]>>,
}

impl DomainName {
    /// The root name `.`
    pub fn root() -> Self {
        Self { labels: Vec::new() }
    }

    /// Build a name from raw labels, leftmost first.
    pub fn from_labels<I, L>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = L>,
        L: AsRef<[u8]>,
    {
        let labels: Vec<Box<[u8]>> = labels
            .into_iter()
            .map(|l| Box::from(l.as_ref()))
            .collect();
        let name = Self { labels };
        name.check()?;
        Ok(name)
    }

    /// Parse `relative` as a name below `origin`. A trailing dot makes the
    /// input absolute and `origin` is ignored; `@` is the origin itself.
    pub fn from_relative(relative: &str, origin: &DomainName) -> Result<Self> {
        let relative = relative.trim();
        if relative == "@" {
            return Ok(origin.clone());
        }
        let parsed: DomainName = relative.parse()?;
        if relative.ends_with('.') && !relative.ends_with("\\.") {
            return Ok(parsed);
        }
        parsed.concat(origin)
    }

    fn check(&self) -> Result<()> {
        for label in &self.labels {
            if label.is_empty() {
                return Err(WalkError::InvalidName("empty label".to_string()));
            }
            if label.len() > MAX_LABEL_LEN {
                return Err(WalkError::InvalidName(format!(
                    "label of {} octets exceeds {}",
                    label.len(),
                    MAX_LABEL_LEN
                )));
            }
        }
        if self.wire_len() > MAX_NAME_LEN {
            return Err(WalkError::InvalidName(format!(
                "name of {} octets exceeds {}",
                self.wire_len(),
                MAX_NAME_LEN
            )));
        }
        Ok(())
    }

    pub fn is_root(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    /// Labels leftmost first, root label excluded.
    pub fn labels(&self) -> impl DoubleEndedIterator<Item = &[u8]> + ExactSizeIterator {
        self.labels.iter().map(|l| l.as_ref())
    }

    pub fn first_label(&self) -> Option<&[u8]> {
        self.labels.first().map(|l| l.as_ref())
    }

    /// Length of the uncompressed wire form including the root label.
    pub fn wire_len(&self) -> usize {
        self.labels.iter().map(|l| l.len() + 1).sum::<usize>() + 1
    }

    /// The name with its leftmost label removed, `None` for the root.
    pub fn parent(&self) -> Option<DomainName> {
        if self.labels.is_empty() {
            return None;
        }
        Some(Self {
            labels: self.labels[1..].to_vec(),
        })
    }

    /// Prepend a single label.
    pub fn prepend(&self, label: &[u8]) -> Result<DomainName> {
        let mut labels = Vec::with_capacity(self.labels.len() + 1);
        labels.push(Box::from(label));
        labels.extend(self.labels.iter().cloned());
        let name = Self { labels };
        name.check()?;
        Ok(name)
    }

    /// Append `suffix` below this name, treating `self` as relative.
    pub fn concat(&self, suffix: &DomainName) -> Result<DomainName> {
        let mut labels = self.labels.clone();
        labels.extend(suffix.labels.iter().cloned());
        let name = Self { labels };
        name.check()?;
        Ok(name)
    }

    /// True if `self` equals `other` or lies below it.
    pub fn is_subdomain_of(&self, other: &DomainName) -> bool {
        if self.labels.len() < other.labels.len() {
            return false;
        }
        self.labels
            .iter()
            .rev()
            .zip(other.labels.iter().rev())
            .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }

    /// Canonical wire form: uncompressed, every label lowercased.
    pub fn to_canonical_wire(&self) -> Vec<u8> {
        let mut wire = Vec::with_capacity(self.wire_len());
        for label in &self.labels {
            wire.push(label.len() as u8);
            wire.extend(label.iter().map(|b| b.to_ascii_lowercase()));
        }
        wire.push(0);
        wire
    }

    /// The smallest name that sorts after `self`: `\000.<self>`.
    pub fn canonical_successor(&self) -> Result<DomainName> {
        self.prepend(&[0])
    }

    /// The smallest name that sorts after `self` and every name below it.
    ///
    /// Extends the leftmost label with a zero octet; at the maximum label
    /// length the last octet that can still be incremented is bumped and
    /// the rest of the label dropped.
    pub fn subtree_successor(&self) -> Result<DomainName> {
        let first = self
            .first_label()
            .ok_or_else(|| WalkError::InvalidName("root has no subtree successor".to_string()))?;
        let mut label: Vec<u8> = first.iter().map(|b| b.to_ascii_lowercase()).collect();
        if label.len() < MAX_LABEL_LEN {
            label.push(0);
        } else {
            let pos = label
                .iter()
                .rposition(|&b| b != 0xff)
                .ok_or_else(|| WalkError::InvalidName("label cannot be incremented".to_string()))?;
            label.truncate(pos + 1);
            label[pos] += 1;
            // uppercase octets compare as lowercase, jump past them
            if label[pos].is_ascii_uppercase() {
                label[pos] = b'Z' + 1;
            }
        }
        let mut labels = self.labels.clone();
        labels[0] = label.into_boxed_slice();
        let name = Self { labels };
        name.check()?;
        Ok(name)
    }
}

fn compare_label(a: &[u8], b: &[u8]) -> Ordering {
    a.iter()
        .map(u8::to_ascii_lowercase)
        .cmp(b.iter().map(u8::to_ascii_lowercase))
}

impl PartialEq for DomainName {
    fn eq(&self, other: &Self) -> bool {
        self.labels.len() == other.labels.len()
            && self
                .labels
                .iter()
                .zip(other.labels.iter())
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }
}

impl Eq for DomainName {}

impl Hash for DomainName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for label in &self.labels {
            state.write_u8(label.len() as u8);
            for b in label.iter() {
                state.write_u8(b.to_ascii_lowercase());
            }
        }
        state.write_u8(0);
    }
}

impl Ord for DomainName {
    fn cmp(&self, other: &Self) -> Ordering {
        // RFC 4034 6.1: compare from the most significant label, a name
        // that runs out of labels first sorts first
        for (a, b) in self.labels.iter().rev().zip(other.labels.iter().rev()) {
            match compare_label(a, b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        self.labels.len().cmp(&other.labels.len())
    }
}

impl PartialOrd for DomainName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for DomainName {
    type Err = WalkError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(WalkError::InvalidName("empty name".to_string()));
        }
        if s == "." {
            return Ok(Self::root());
        }

        let mut labels = Vec::new();
        let mut current = Vec::new();
        let mut chars = s.bytes().peekable();
        let mut trailing_dot = false;

        while let Some(b) = chars.next() {
            trailing_dot = false;
            match b {
                b'.' => {
                    if current.is_empty() {
                        return Err(WalkError::InvalidName(format!("empty label in {}", s)));
                    }
                    labels.push(std::mem::take(&mut current).into_boxed_slice());
                    trailing_dot = true;
                }
                b'\\' => {
                    let first = chars
                        .next()
                        .ok_or_else(|| WalkError::InvalidName(format!("dangling escape in {}", s)))?;
                    if first.is_ascii_digit() {
                        let mut value = u32::from(first - b'0');
                        for _ in 0..2 {
                            match chars.next() {
                                Some(d) if d.is_ascii_digit() => {
                                    value = value * 10 + u32::from(d - b'0');
                                }
                                _ => {
                                    return Err(WalkError::InvalidName(format!(
                                        "bad decimal escape in {}",
                                        s
                                    )));
                                }
                            }
                        }
                        let octet = u8::try_from(value).map_err(|_| {
                            WalkError::InvalidName(format!("escape out of range in {}", s))
                        })?;
                        current.push(octet);
                    } else {
                        current.push(first);
                    }
                }
                other => current.push(other),
            }
        }

        if !trailing_dot {
            if current.is_empty() {
                return Err(WalkError::InvalidName(format!("empty label in {}", s)));
            }
            labels.push(current.into_boxed_slice());
        }

        let name = Self { labels };
        name.check()?;
        Ok(name)
    }
}

impl TryFrom<&str> for DomainName {
    type Error = WalkError;

    fn try_from(s: &str) -> Result<Self> {
        s.parse()
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.labels.is_empty() {
            return f.write_str(".");
        }
        for label in &self.labels {
            for &b in label.iter() {
                match b {
                    b'.' | b'\\' | b'"' | b'(' | b')' | b';' | b'@' | b'$' => {
                        write!(f, "\\{}", b as char)?
                    }
                    0x21..=0x7e => write!(f, "{}", b as char)?,
                    _ => write!(f, "\\{:03}", b)?,
                }
            }
            f.write_str(".")?;
        }
        Ok(())
    }
}

impl fmt::Debug for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DomainName({})", self)
    }
}

impl Serialize for DomainName {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DomainName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
