//! Scan range parsing
//!
//! Accepts a single address (`192.168.1.20`), CIDR (`192.168.1.0/24`) or an
//! inclusive range (`192.168.1.10-192.168.1.50`, `192.168.1.10-50`). Anything
//! that does not yield at least one host is an empty range.

use std::net::Ipv4Addr;

use crate::error::ZeroconfError;

/// Inclusive IPv4 host range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRange {
    start: u32,
    end: u32,
}

impl ScanRange {
    pub fn parse(expr: &str) -> Result<Self, ZeroconfError> {
        let expr = expr.trim();
        let range = if let Some((addr, prefix)) = expr.split_once('/') {
            parse_cidr(addr, prefix)
        } else if let Some((from, to)) = expr.split_once('-') {
            parse_span(from, to)
        } else {
            expr.parse::<Ipv4Addr>().ok().map(|ip| Self {
                start: ip.into(),
                end: ip.into(),
            })
        };

        match range {
            Some(range) if range.start <= range.end => Ok(range),
            _ => {
                log::debug!("no hosts in scan range '{expr}'");
                Err(ZeroconfError::EmptyRange)
            }
        }
    }

    pub fn first(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.start)
    }

    pub fn last(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.end)
    }

    pub fn len(&self) -> u64 {
        u64::from(self.end - self.start) + 1
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        let ip = u32::from(ip);
        self.start <= ip && ip <= self.end
    }

    pub fn hosts(&self) -> impl Iterator<Item = Ipv4Addr> {
        (self.start..=self.end).map(Ipv4Addr::from)
    }
}

fn parse_cidr(addr: &str, prefix: &str) -> Option<ScanRange> {
    let addr: Ipv4Addr = addr.trim().parse().ok()?;
    let prefix: u32 = prefix.trim().parse().ok()?;
    if prefix > 32 {
        return None;
    }

    let mask = if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) };
    let network = u32::from(addr) & mask;
    let broadcast = network | !mask;

    // Network and broadcast addresses are not hosts, except on /31 and /32
    if prefix <= 30 {
        Some(ScanRange {
            start: network + 1,
            end: broadcast - 1,
        })
    } else {
        Some(ScanRange {
            start: network,
            end: broadcast,
        })
    }
}

fn parse_span(from: &str, to: &str) -> Option<ScanRange> {
    let from: Ipv4Addr = from.trim().parse().ok()?;
    let to = to.trim();
    let to = match to.parse::<Ipv4Addr>() {
        Ok(ip) => ip,
        Err(_) => {
            let last: u8 = to.parse().ok()?;
            let [a, b, c, _] = from.octets();
            Ipv4Addr::new(a, b, c, last)
        }
    };

    Some(ScanRange {
        start: from.into(),
        end: to.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_address() {
        let range = ScanRange::parse("192.168.1.20").unwrap();
        assert_eq!(range.len(), 1);
        assert!(range.contains(Ipv4Addr::new(192, 168, 1, 20)));
        assert!(!range.contains(Ipv4Addr::new(192, 168, 1, 21)));
    }

    #[test]
    fn test_cidr_excludes_network_and_broadcast() {
        let range = ScanRange::parse("192.168.1.77/24").unwrap();
        assert_eq!(range.first(), Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(range.last(), Ipv4Addr::new(192, 168, 1, 254));
        assert_eq!(range.len(), 254);
    }

    #[test]
    fn test_small_prefixes() {
        assert_eq!(ScanRange::parse("10.0.0.4/31").unwrap().len(), 2);
        assert_eq!(ScanRange::parse("10.0.0.4/32").unwrap().len(), 1);
        assert_eq!(ScanRange::parse("10.0.0.4/30").unwrap().len(), 2);
    }

    #[test]
    fn test_span_forms() {
        let full = ScanRange::parse("192.168.1.10-192.168.1.50").unwrap();
        let short = ScanRange::parse("192.168.1.10-50").unwrap();
        assert_eq!(full, short);
        assert_eq!(full.len(), 41);
        assert_eq!(full.hosts().next(), Some(Ipv4Addr::new(192, 168, 1, 10)));
    }

    #[test]
    fn test_empty_and_malformed_ranges() {
        for expr in [
            "",
            "192.168.1.50-10",
            "192.168.1.0/33",
            "192.168.1/24",
            "300.1.1.1",
            "not-an-ip",
            "192.168.1.10-999",
        ] {
            assert!(
                matches!(ScanRange::parse(expr), Err(ZeroconfError::EmptyRange)),
                "expected empty range for '{expr}'"
            );
        }
    }
}
