//! DNS resolution for domain inputs

use super::error::LookupError;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::Resolver;
use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use tracing::debug;

/// Anything that can turn a host name into addresses
pub trait HostResolver: Send + Sync {
    /// Resolve a host; a name with no records resolves to an empty list
    fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, LookupError>;
}

/// Resolver backed by hickory, using custom nameservers or the system configuration
pub struct DnsResolver {
    inner: Resolver,
    nameservers: Vec<SocketAddr>,
}

impl DnsResolver {
    /// Build a resolver
    ///
    /// Each entry is `ip` or `ip:port`; an empty list uses the system configuration.
    pub fn new(resolvers: &[String]) -> anyhow::Result<Self> {
        let nameservers = parse_nameservers(resolvers)?;

        let inner = if nameservers.is_empty() {
            match Resolver::from_system_conf() {
                Ok(r) => r,
                Err(e) => {
                    debug!("failed to load system DNS configuration, using defaults: {}", e);
                    Resolver::new(ResolverConfig::default(), ResolverOpts::default())?
                }
            }
        } else {
            let mut group = NameServerConfigGroup::new();
            for addr in &nameservers {
                group.merge(NameServerConfigGroup::from_ips_clear(
                    &[addr.ip()],
                    addr.port(),
                    true,
                ));
            }
            let config = ResolverConfig::from_parts(None, vec![], group);
            Resolver::new(config, ResolverOpts::default())?
        };

        Ok(Self { inner, nameservers })
    }

    /// Custom nameservers in use; empty when using the system configuration
    pub fn nameservers(&self) -> &[SocketAddr] {
        &self.nameservers
    }
}

impl HostResolver for DnsResolver {
    fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, LookupError> {
        match self.inner.lookup_ip(host) {
            Ok(lookup) => Ok(unique_addrs(lookup.iter())),
            Err(e) => match e.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => Ok(vec![]),
                _ => Err(LookupError::Resolution {
                    host: host.to_string(),
                    reason: e.to_string(),
                }),
            },
        }
    }
}

/// Drop repeated addresses, keeping the first-seen order
pub fn unique_addrs<I: IntoIterator<Item = IpAddr>>(addrs: I) -> Vec<IpAddr> {
    let mut seen = HashSet::new();
    addrs.into_iter().filter(|ip| seen.insert(*ip)).collect()
}

/// Parse `ip` or `ip:port` nameserver entries, defaulting to port 53
pub fn parse_nameservers(entries: &[String]) -> anyhow::Result<Vec<SocketAddr>> {
    let mut addrs = vec![];
    for entry in entries {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let addr = if let Ok(addr) = entry.parse::<SocketAddr>() {
            addr
        } else if let Ok(ip) = entry.parse::<IpAddr>() {
            SocketAddr::new(ip, 53)
        } else {
            return Err(anyhow::anyhow!("invalid resolver address: {}", entry));
        };
        addrs.push(addr);
    }
    Ok(addrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nameservers() {
        let addrs = parse_nameservers(&[
            "8.8.8.8".to_string(),
            "1.1.1.1:5353".to_string(),
            " ".to_string(),
            "2001:4860:4860::8888".to_string(),
            "[2606:4700:4700::1111]:53".to_string(),
        ])
        .unwrap();
        assert_eq!(
            addrs,
            vec![
                "8.8.8.8:53".parse().unwrap(),
                "1.1.1.1:5353".parse().unwrap(),
                "[2001:4860:4860::8888]:53".parse().unwrap(),
                "[2606:4700:4700::1111]:53".parse().unwrap(),
            ]
        );
        assert!(parse_nameservers(&["dns.google".to_string()]).is_err());
    }

    #[test]
    fn test_unique_addrs() {
        let a: IpAddr = "1.1.1.1".parse().unwrap();
        let b: IpAddr = "1.0.0.1".parse().unwrap();
        assert_eq!(unique_addrs(vec![a, b, a]), vec![a, b]);
    }

    #[test]
    fn test_custom_resolver_config() {
        let resolver = DnsResolver::new(&["9.9.9.9".to_string()]).unwrap();
        assert_eq!(resolver.nameservers().len(), 1);
    }
}
