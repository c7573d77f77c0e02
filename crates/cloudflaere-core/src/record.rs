//! DNS data model shared by the engine and its collaborators
//!
//! Everything here is rebuilt every cycle; nothing is cached between cycles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A fully-qualified domain name, compared case-insensitively.
///
/// The name is normalized on construction (trimmed, trailing dot removed,
/// lowercased), so the derived `Eq`/`Ord`/`Hash` are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hostname(String);

impl Hostname {
    /// Normalize and wrap a hostname
    pub fn new(name: impl AsRef<str>) -> Result<Self> {
        let name = name.as_ref().trim().trim_end_matches('.');
        if name.is_empty() {
            return Err(Error::Other("hostname cannot be empty".to_string()));
        }
        Ok(Self(name.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Hostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Hostname {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for Hostname {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Hostname> for String {
    fn from(value: Hostname) -> Self {
        value.0
    }
}

/// Address record types managed by cloudflaere
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RecordType {
    /// IPv4 address record
    #[serde(rename = "A")]
    A,
    /// IPv6 address record
    #[serde(rename = "AAAA")]
    Aaaa,
}

impl RecordType {
    /// The record type that holds the given address
    pub fn for_address(address: IpAddr) -> Self {
        match address {
            IpAddr::V4(_) => RecordType::A,
            IpAddr::V6(_) => RecordType::Aaaa,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Ok(RecordType::A),
            "AAAA" => Ok(RecordType::Aaaa),
            other => Err(Error::Other(format!("unsupported record type: {}", other))),
        }
    }
}

/// A provider-managed DNS zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    /// Registrable domain, e.g. `example.co.uk`
    pub name: String,
    /// Opaque provider identifier
    pub id: String,
}

impl Zone {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}

/// An address record as the provider reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Opaque provider identifier
    pub id: String,
    pub record_type: RecordType,
    pub name: Hostname,
    /// Textual address exactly as returned by the provider
    pub address: String,
    /// Free-text annotation; carries the ownership marker
    pub comment: String,
    pub proxied: bool,
}

impl Record {
    /// The record's address as a parsed value, if it parses.
    pub fn canonical_address(&self) -> Option<IpAddr> {
        self.address.trim().parse().ok()
    }

    /// Whether the record already points at `target`.
    ///
    /// Both sides are compared as parsed addresses, so `2001:db8::1` and
    /// `2001:0db8:0000:0000:0000:0000:0000:0001` are equal. An unparseable
    /// provider address never matches.
    pub fn points_to(&self, target: IpAddr) -> bool {
        self.canonical_address() == Some(target)
    }
}

/// A record to be created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub record_type: RecordType,
    pub name: Hostname,
    pub address: IpAddr,
    pub comment: String,
    pub proxied: bool,
}

/// Comment tag identifying records owned by one cloudflaere instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipMarker(String);

impl OwnershipMarker {
    /// Build the marker `##cloudflaere:<instance>##`
    pub fn new(instance: impl AsRef<str>) -> Self {
        Self(format!("##cloudflaere:{}##", instance.as_ref()))
    }

    /// Use the configured instance name, or the machine's host name.
    pub fn for_host(instance: Option<&str>) -> Self {
        match instance.map(str::trim).filter(|s| !s.is_empty()) {
            Some(instance) => Self::new(instance),
            None => Self::new(gethostname::gethostname().to_string_lossy()),
        }
    }

    /// Whether a record comment carries this marker
    pub fn is_present_in(&self, comment: &str) -> bool {
        comment.contains(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnershipMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
