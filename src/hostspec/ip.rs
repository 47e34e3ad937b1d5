//! IPv4 helpers: dotted-quad ⇄ 32-bit integer and CIDR enumeration.

use std::net::Ipv4Addr;

/// Parse a dotted quad into its big-endian 32-bit value.
///
/// Returns `None` unless the text is exactly four dot-separated groups of one
/// to three digits, each at most 255.
pub fn ip_to_int(s: &str) -> Option<u32> {
    let mut groups = s.split('.');
    let mut value = 0u32;

    for _ in 0..4 {
        let group = groups.next()?;
        if group.is_empty() || group.len() > 3 || !group.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let octet: u32 = group.parse().ok()?;
        if octet > 255 {
            return None;
        }
        value = (value << 8) | octet;
    }

    if groups.next().is_some() {
        return None;
    }
    Some(value)
}

pub fn int_to_ip(value: u32) -> String {
    Ipv4Addr::from(value).to_string()
}

pub fn is_ip(s: &str) -> bool {
    ip_to_int(s).is_some()
}

/// Host bits for a prefix length in `[0, 32]`.
pub fn hostmask(mask: u8) -> u32 {
    if mask == 0 {
        u32::MAX
    } else {
        (1u32 << (32 - u32::from(mask))) - 1
    }
}

/// Number of addresses in a network with this prefix length.
pub fn cidr_len(mask: u8) -> u64 {
    1u64 << (32 - u32::from(mask.min(32)))
}

/// Networks above this many addresses are expanded with a warning.
pub const LARGE_NETWORK: u64 = 1 << 16;

pub fn is_large_network(mask: u8) -> bool {
    cidr_len(mask) > LARGE_NETWORK
}

/// First and last address of the network containing `net`.
pub fn cidr_bounds(net: u32, mask: u8) -> (u32, u32) {
    let hostmask = hostmask(mask);
    let netmask = !hostmask;
    (net & netmask, net | hostmask)
}

/// Every address of the network containing `net`, ascending.
pub fn cidr(net: u32, mask: u8) -> Vec<String> {
    if mask > 32 {
        return Vec::new();
    }
    let (first, last) = cidr_bounds(net, mask);
    (first..=last).map(int_to_ip).collect()
}
