//! Host specification expansion.
//!
//! Turns a compact pattern into concrete addresses. Forms are tried in order:
//!
//! - CIDR: `10.1.1.0/24`, `myhosts-net/27`
//! - Range: `myhost00-10`, `10.1.1.4-8` (hexadecimal with `--hex`)
//! - Literal: an IP address or a resolvable hostname
//!
//! Invalid input never aborts startup: it expands to nothing and logs a warning.

mod ip;
mod resolver;

use ip::{cidr, cidr_len, ip_to_int, is_ip, is_large_network};
pub use resolver::{Resolver, SystemResolver};

use std::sync::LazyLock;

use regex_lite::Regex;

/// Location of the first numeric span `A-B` inside a specification.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RangeSpan {
    start: usize,
    end: usize,
    first: String,
    last: String,
}

pub struct HostSpecExpander<R = SystemResolver> {
    resolver: R,
    hex: bool,
}

impl HostSpecExpander<SystemResolver> {
    pub fn system(hex: bool) -> Self {
        Self::new(SystemResolver, hex)
    }
}

impl<R: Resolver> HostSpecExpander<R> {
    pub fn new(resolver: R, hex: bool) -> Self {
        Self { resolver, hex }
    }

    /// Expand a specification into an ordered list of addresses.
    pub fn expand(&self, spec: &str) -> Vec<String> {
        let spec = spec.trim();
        if spec.is_empty() {
            tracing::warn!("Invalid host specification (empty)");
            return Vec::new();
        }

        if let Some((net, mask)) = spec.split_once('/') {
            return self.expand_cidr(spec, net, mask);
        }

        if let Some(span) = find_range(spec, self.hex) {
            return self.expand_range(spec, &span);
        }

        self.expand_literal(spec)
    }

    fn expand_cidr(&self, spec: &str, net: &str, mask: &str) -> Vec<String> {
        let Ok(mask) = mask.trim().parse::<i64>() else {
            tracing::warn!("Invalid host specification (mask is not int): {}", spec);
            return Vec::new();
        };

        let net = match ip_to_int(net) {
            Some(net) => net,
            None => match self.resolver.resolve(net) {
                Some(addr) => u32::from(addr),
                None => {
                    tracing::warn!(
                        "Invalid host specification (can't resolve hostname): {}",
                        spec
                    );
                    return Vec::new();
                }
            },
        };

        if !(0..=32).contains(&mask) {
            tracing::warn!("Invalid host specification (mask is not in <0,32>): {}", spec);
            return Vec::new();
        }

        let mask = mask as u8;
        if is_large_network(mask) {
            tracing::warn!("{} expands to {} addresses", spec, cidr_len(mask));
        } else {
            tracing::debug!("{} expands to {} addresses", spec, cidr_len(mask));
        }
        cidr(net, mask)
    }

    fn expand_range(&self, spec: &str, span: &RangeSpan) -> Vec<String> {
        let radix = if self.hex { 16 } else { 10 };
        let (Ok(first), Ok(last)) = (
            u64::from_str_radix(&span.first, radix),
            u64::from_str_radix(&span.last, radix),
        ) else {
            tracing::warn!("Invalid host specification (range out of bounds): {}", spec);
            return Vec::new();
        };

        if first > last {
            tracing::warn!("Invalid host specification (empty range): {}", spec);
            return Vec::new();
        }

        let width = span.first.len();
        let prefix = &spec[..span.start];
        let suffix = &spec[span.end..];
        let mut addresses = Vec::new();

        for index in first..=last {
            let label = if self.hex {
                format!("{:0width$x}", index, width = width)
            } else {
                format!("{:0width$}", index, width = width)
            };
            let candidate = format!("{}{}{}", prefix, label, suffix);

            // One bad member discards the whole range
            if !self.is_reachable_name(&candidate) {
                tracing::warn!(
                    "Invalid host specification (can't resolve hostname {}): {}",
                    candidate,
                    spec
                );
                return Vec::new();
            }
            addresses.push(candidate);
        }

        addresses
    }

    fn expand_literal(&self, spec: &str) -> Vec<String> {
        if self.is_reachable_name(spec) {
            vec![spec.to_string()]
        } else {
            tracing::warn!("Invalid host specification: {}", spec);
            Vec::new()
        }
    }

    fn is_reachable_name(&self, candidate: &str) -> bool {
        is_ip(candidate) || self.resolver.resolve(candidate).is_some()
    }
}

static DECIMAL_RANGE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(\d+)-(\d+)").ok());
static HEX_RANGE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)(\d[0-9a-f]*)-([0-9a-f]+)").ok());

fn find_range(spec: &str, hex: bool) -> Option<RangeSpan> {
    let re: &Option<Regex> = if hex { &HEX_RANGE } else { &DECIMAL_RANGE };
    let caps = re.as_ref()?.captures(spec)?;
    let whole = caps.get(0)?;

    Some(RangeSpan {
        start: whole.start(),
        end: whole.end(),
        first: caps.get(1)?.as_str().to_string(),
        last: caps.get(2)?.as_str().to_string(),
    })
}
