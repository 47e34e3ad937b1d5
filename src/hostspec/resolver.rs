//! Hostname resolution.

use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};

/// Maps a hostname to an IPv4 address.
pub trait Resolver {
    fn resolve(&self, name: &str) -> Option<Ipv4Addr>;
}

/// Resolves through the operating system, keeping the first IPv4 answer.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

impl Resolver for SystemResolver {
    fn resolve(&self, name: &str) -> Option<Ipv4Addr> {
        if name.is_empty() {
            return None;
        }
        let addrs = (name, 0).to_socket_addrs().ok()?;
        addrs.into_iter().find_map(|addr| match addr.ip() {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_resolver_literal() {
        assert_eq!(
            SystemResolver.resolve("127.0.0.1"),
            Some(Ipv4Addr::new(127, 0, 0, 1))
        );
    }

    #[test]
    fn test_system_resolver_empty_name() {
        assert_eq!(SystemResolver.resolve(""), None);
    }
}
