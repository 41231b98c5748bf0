use ipnetwork::IpNetwork;
use std::net::IpAddr;
use tracing::warn;

/// CIDR ranges whose `X-Forwarded-For` header is believed.
#[derive(Debug, Clone)]
pub struct TrustedProxies {
    networks: Vec<IpNetwork>,
}

impl TrustedProxies {
    /// Invalid entries are logged and skipped.
    pub fn parse<S: AsRef<str>>(cidrs: &[S]) -> Self {
        let mut networks = Vec::with_capacity(cidrs.len());
        for cidr in cidrs {
            let cidr = cidr.as_ref().trim();
            match cidr.parse::<IpNetwork>() {
                Ok(network) => networks.push(network),
                Err(e) => warn!(target: "security", cidr, "ignoring invalid trusted proxy: {e}"),
            }
        }
        Self { networks }
    }

    pub fn is_trusted(&self, addr: IpAddr) -> bool {
        self.networks.iter().any(|n| n.contains(addr))
    }

    /// The caller address: `peer`, unless `peer` is a trusted proxy, in which
    /// case the first IP literal in `forwarded_for`.
    pub fn resolve(&self, peer: IpAddr, forwarded_for: Option<&str>) -> IpAddr {
        if !self.is_trusted(peer) {
            return peer;
        }
        forwarded_for
            .into_iter()
            .flat_map(|h| h.split(','))
            .map(str::trim)
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("unknown"))
            .find_map(|s| s.parse::<IpAddr>().ok())
            .unwrap_or(peer)
    }
}

impl Default for TrustedProxies {
    fn default() -> Self {
        Self::parse(&["127.0.0.1/32", "::1/128"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn untrusted_peer_ignores_forwarded_header() {
        let proxies = TrustedProxies::default();
        let resolved = proxies.resolve(ip("203.0.113.9"), Some("198.51.100.1"));
        assert_eq!(resolved, ip("203.0.113.9"));
    }

    #[test]
    fn trusted_peer_uses_first_valid_forwarded_address() {
        let proxies = TrustedProxies::default();
        let resolved = proxies.resolve(ip("127.0.0.1"), Some("unknown, garbage, 198.51.100.1, 10.0.0.1"));
        assert_eq!(resolved, ip("198.51.100.1"));
    }

    #[test]
    fn trusted_peer_without_usable_header_falls_back_to_peer() {
        let proxies = TrustedProxies::default();
        assert_eq!(proxies.resolve(ip("::1"), None), ip("::1"));
        assert_eq!(proxies.resolve(ip("::1"), Some("unknown")), ip("::1"));
    }

    #[test]
    fn invalid_cidrs_are_skipped() {
        let proxies = TrustedProxies::parse(&["not-a-cidr", "10.0.0.0/8", "300.1.1.1/32"]);
        assert!(proxies.is_trusted(ip("10.20.30.40")));
        assert!(!proxies.is_trusted(ip("127.0.0.1")));
    }
}
