use rand::seq::IndexedRandom;
use tracing::warn;

/// Connection parameters for [`crate::GatewaySource`].
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Base URL of the channel server, e.g. `https://chat.example.org`.
    pub base_url: String,
    /// Bearer credential for REST calls and the gateway handshake.
    pub token: String,
    /// Optional SOCKS5 proxy for HTTP traffic.
    pub proxy: Option<ProxyEntry>,
}

/// One SOCKS5 proxy, parsed from `host:port` or `host:port:user:pass`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEntry {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxyEntry {
    /// Parse a comma-separated proxy list. Malformed entries are skipped
    /// with a warning rather than failing startup.
    pub fn parse_list(raw: &str) -> Vec<ProxyEntry> {
        let mut proxies = Vec::new();
        for item in raw.split(',') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            let parts: Vec<&str> = item.split(':').collect();
            let parsed = match parts.as_slice() {
                [host, port] => port.parse().ok().map(|port| ProxyEntry {
                    host: host.to_string(),
                    port,
                    username: None,
                    password: None,
                }),
                [host, port, user, pass] => port.parse().ok().map(|port| ProxyEntry {
                    host: host.to_string(),
                    port,
                    username: Some(user.to_string()),
                    password: Some(pass.to_string()),
                }),
                _ => None,
            };
            match parsed {
                Some(proxy) => proxies.push(proxy),
                None => warn!(entry = item, "skipping malformed proxy entry"),
            }
        }
        proxies
    }

    /// Pick one proxy at random, or none if the list is empty.
    pub fn choose(list: &[ProxyEntry]) -> Option<&ProxyEntry> {
        list.choose(&mut rand::rng())
    }

    /// The `socks5://` URL reqwest expects.
    pub fn socks_url(&self) -> String {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => {
                format!("socks5://{}:{}@{}:{}", user, pass, self.host, self.port)
            }
            _ => format!("socks5://{}:{}", self.host, self.port),
        }
    }
}
