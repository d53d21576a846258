//! CIDR math kernel
//!
//! Pure IPv4 prefix arithmetic: parsing, containment, overlap and windowed
//! subnet enumeration. All of it works on `u32` addresses; no function walks
//! a range address by address.

use crate::error::IpamError;
use ipnet::Ipv4Net;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Longest IPv4 prefix length
pub const MAX_PREFIX_LEN: u8 = 32;

/// An IPv4 network/length pair, always stored in canonical (masked) form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Prefix {
    network: u32,
    len: u8,
}

fn netmask(len: u8) -> u32 {
    if len == 0 {
        0
    } else {
        u32::MAX << (MAX_PREFIX_LEN - len)
    }
}

impl Prefix {
    /// Build a prefix from any address inside it; host bits are cleared
    pub fn new(addr: Ipv4Addr, len: u8) -> Result<Self, IpamError> {
        if len > MAX_PREFIX_LEN {
            return Err(IpamError::Validation(format!(
                "prefix length /{} exceeds /{}",
                len, MAX_PREFIX_LEN
            )));
        }
        Ok(Self::from_bits(u32::from(addr), len))
    }

    /// A single-address (/32) prefix
    pub fn host(addr: Ipv4Addr) -> Self {
        Self::from_bits(u32::from(addr), MAX_PREFIX_LEN)
    }

    // Callers guarantee len <= 32.
    pub(crate) fn from_bits(addr: u32, len: u8) -> Self {
        Self {
            network: addr & netmask(len),
            len,
        }
    }

    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.network)
    }

    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.last())
    }

    pub fn prefix_len(&self) -> u8 {
        self.len
    }

    /// First address of the block as an integer
    pub fn first(&self) -> u32 {
        self.network
    }

    /// Last address of the block as an integer
    pub fn last(&self) -> u32 {
        self.network | !netmask(self.len)
    }

    /// Number of addresses in the block (2^32 for /0, hence `u64`)
    pub fn size(&self) -> u64 {
        1u64 << (MAX_PREFIX_LEN - self.len)
    }

    /// True iff `inner` is at least as specific and both its ends fall inside `self`
    pub fn contains(&self, inner: &Prefix) -> bool {
        inner.len >= self.len
            && inner.first() >= self.first()
            && inner.first() <= self.last()
            && inner.last() >= self.first()
            && inner.last() <= self.last()
    }

    pub fn contains_addr(&self, addr: Ipv4Addr) -> bool {
        u32::from(addr) & netmask(self.len) == self.network
    }

    /// True iff either prefix contains the other
    pub fn overlaps(&self, other: &Prefix) -> bool {
        self.contains(other) || other.contains(self)
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network(), self.len)
    }
}

impl FromStr for Prefix {
    type Err = IpamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

impl From<Ipv4Net> for Prefix {
    fn from(net: Ipv4Net) -> Self {
        Self::from_bits(u32::from(net.addr()), net.prefix_len())
    }
}

impl Serialize for Prefix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Prefix {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Parse a CIDR literal or a bare address (treated as /32)
///
/// Host bits in a CIDR literal are cleared (`10.0.0.1/8` becomes `10.0.0.0/8`).
/// Anything that is not IPv4 is rejected.
pub fn parse(text: &str) -> Result<Prefix, IpamError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(IpamError::Validation("CIDR must not be empty".to_string()));
    }

    if text.contains('/') {
        let net: Ipv4Net = text.parse().map_err(|e| {
            IpamError::Validation(format!("invalid IPv4 CIDR '{}': {}", text, e))
        })?;
        Ok(Prefix::from(net))
    } else {
        let addr: Ipv4Addr = text.parse().map_err(|e| {
            IpamError::Validation(format!("invalid IPv4 address '{}': {}", text, e))
        })?;
        Ok(Prefix::host(addr))
    }
}

pub fn contains(outer: &Prefix, inner: &Prefix) -> bool {
    outer.contains(inner)
}

pub fn overlaps(a: &Prefix, b: &Prefix) -> bool {
    a.overlaps(b)
}

/// Usable host addresses in a block of the given length
///
/// Network and broadcast are excluded up to /30. /31 point-to-point links
/// have 2 usable addresses (RFC 3021) and a /32 host route has 1.
pub fn usable_hosts(len: u8) -> Result<u64, IpamError> {
    match len {
        0..=30 => Ok((1u64 << (MAX_PREFIX_LEN - len)) - 2),
        31 => Ok(2),
        32 => Ok(1),
        _ => Err(IpamError::Validation(format!(
            "prefix length /{} exceeds /{}",
            len, MAX_PREFIX_LEN
        ))),
    }
}

/// One page of the child blocks of a parent prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubnetWindow {
    pub blocks: Vec<Prefix>,
    pub usable_hosts: u64,
    /// All child blocks the parent can hold at this length
    pub total: u64,
}

/// Enumerate up to `limit` child blocks of `parent` starting at the `offset`-th
///
/// `limit == 0` returns every remaining block. The k-th block sits at
/// `parent.network + k * 2^(32 - child_len)`; only the requested window is
/// materialised.
pub fn windowed_subnets(
    parent: &Prefix,
    child_len: u8,
    offset: u64,
    limit: u64,
) -> Result<SubnetWindow, IpamError> {
    if child_len > MAX_PREFIX_LEN {
        return Err(IpamError::Validation(format!(
            "child prefix length /{} exceeds /{}",
            child_len, MAX_PREFIX_LEN
        )));
    }
    if child_len < parent.len {
        return Err(IpamError::Validation(format!(
            "child prefix length /{} is shorter than parent {}",
            child_len, parent
        )));
    }

    let total = 1u64 << (child_len - parent.len);
    let start = offset.min(total);
    let remaining = total - start;
    let count = if limit == 0 { remaining } else { limit.min(remaining) };
    let step = 1u64 << (MAX_PREFIX_LEN - child_len);

    let blocks = (start..start + count)
        .map(|k| {
            // Bounded by parent.last(), so the sum always fits in 32 bits.
            let network = u64::from(parent.network) + k * step;
            Prefix::from_bits(network as u32, child_len)
        })
        .collect();

    Ok(SubnetWindow {
        blocks,
        usable_hosts: usable_hosts(child_len)?,
        total,
    })
}
