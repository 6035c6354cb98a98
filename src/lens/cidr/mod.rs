//! IP range to CIDR reduction
//!
//! Converts an inclusive `[first, last]` address range into the minimal
//! ordered list of CIDR blocks that covers it exactly. Addresses are treated
//! as unsigned integers of the family's width (32 bits for IPv4, 128 for
//! IPv6); at each step the largest block that starts at the current address,
//! is aligned to its own size and does not run past `last` is emitted.

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use thiserror::Error;

/// A network prefix produced by the reducer
pub type CidrBlock = IpNet;

/// Range bounds that cannot be reduced
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidRangeError {
    #[error("invalid range: first address {first} is greater than last address {last}")]
    Inverted { first: IpAddr, last: IpAddr },
    #[error("invalid range: {first} and {last} belong to different address families")]
    MixedFamily { first: IpAddr, last: IpAddr },
}

/// Reduce an inclusive address range to CIDR blocks
pub fn reduce(first: IpAddr, last: IpAddr) -> Result<Vec<CidrBlock>, InvalidRangeError> {
    match (first, last) {
        (IpAddr::V4(a), IpAddr::V4(b)) => Ok(reduce_v4(a, b)?.into_iter().map(IpNet::V4).collect()),
        (IpAddr::V6(a), IpAddr::V6(b)) => Ok(reduce_v6(a, b)?.into_iter().map(IpNet::V6).collect()),
        _ => Err(InvalidRangeError::MixedFamily { first, last }),
    }
}

/// Reduce an IPv4 range
pub fn reduce_v4(first: Ipv4Addr, last: Ipv4Addr) -> Result<Vec<Ipv4Net>, InvalidRangeError> {
    if first > last {
        return Err(InvalidRangeError::Inverted {
            first: first.into(),
            last: last.into(),
        });
    }
    Ok(split_range(u32::from(first) as u128, u32::from(last) as u128, 32)
        .into_iter()
        .filter_map(|(start, prefix)| Ipv4Net::new(Ipv4Addr::from(start as u32), prefix).ok())
        .collect())
}

/// Reduce an IPv6 range
pub fn reduce_v6(first: Ipv6Addr, last: Ipv6Addr) -> Result<Vec<Ipv6Net>, InvalidRangeError> {
    if first > last {
        return Err(InvalidRangeError::Inverted {
            first: first.into(),
            last: last.into(),
        });
    }
    Ok(split_range(u128::from(first), u128::from(last), 128)
        .into_iter()
        .filter_map(|(start, prefix)| Ipv6Net::new(Ipv6Addr::from(start), prefix).ok())
        .collect())
}

/// Reduce a range given as strings, as returned by the lookup service
pub fn reduce_str(first: &str, last: &str) -> anyhow::Result<Vec<CidrBlock>> {
    let first: IpAddr = first
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid IP address: {}", first))?;
    let last: IpAddr = last
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid IP address: {}", last))?;
    Ok(reduce(first, last)?)
}

/// Decompose `[first, last]` within a `bits`-wide address space into
/// `(block start, prefix length)` pairs; `first` must not exceed `last`.
fn split_range(mut first: u128, last: u128, bits: u8) -> Vec<(u128, u8)> {
    let mut blocks = Vec::new();

    loop {
        // host bits allowed by the alignment of `first`; zero aligns to anything
        let align = if first == 0 {
            bits as u32
        } else {
            first.trailing_zeros().min(bits as u32)
        };

        // host bits allowed by the remaining span, floor(log2(last - first + 1));
        // the +1 can only overflow for the complete 128-bit space
        let span = match (last - first).checked_add(1) {
            Some(count) => 127 - count.leading_zeros(),
            None => 128,
        };

        let host_bits = align.min(span);
        blocks.push((first, bits - host_bits as u8));

        // last address of the emitted block
        let block_last = if host_bits >= 128 {
            u128::MAX
        } else {
            first | ((1u128 << host_bits) - 1)
        };
        if block_last >= last {
            break;
        }
        first = block_last + 1;
    }

    blocks
}

/// First and last address covered by a block
pub fn block_bounds(block: &CidrBlock) -> (IpAddr, IpAddr) {
    (block.network(), block.broadcast())
}
