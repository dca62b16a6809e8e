//! Source IP allow/deny filtering.
//!
//! Mirrors the list-file driven filtering of the wider deployment: a deny
//! hit always rejects, an allow hit always admits, and `block_by_default`
//! decides everything else. Installed only when any list or the default
//! block is configured.

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use wfpd_config::FilteringConfig;

#[derive(Debug, Default)]
pub struct IpFilter {
    allow: HashSet<IpAddr>,
    deny: HashSet<IpAddr>,
    block_by_default: bool,
    trust_proxy: bool,
}

impl IpFilter {
    pub fn from_config(filtering: &FilteringConfig) -> Self {
        Self {
            allow: parse_addresses(&filtering.allow_list, "allow"),
            deny: parse_addresses(&filtering.deny_list, "deny"),
            block_by_default: filtering.block_by_default,
            trust_proxy: filtering.trust_proxy,
        }
    }

    pub fn permits(&self, ip: IpAddr) -> bool {
        if self.deny.contains(&ip) {
            return false;
        }
        if self.allow.contains(&ip) {
            return true;
        }
        !self.block_by_default
    }

    /// The address the lists apply to. Behind a trusted proxy the real
    /// client arrives as the first `X-Forwarded-For` entry; otherwise the
    /// peer address is authoritative.
    pub fn client_ip(&self, headers: &HeaderMap, peer: IpAddr) -> IpAddr {
        if !self.trust_proxy {
            return peer;
        }
        headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(peer)
    }
}

fn parse_addresses(entries: &[String], list: &str) -> HashSet<IpAddr> {
    entries
        .iter()
        .filter_map(|entry| match entry.parse() {
            Ok(ip) => Some(ip),
            Err(e) => {
                warn!(entry = %entry, "skipping unparseable {list} list entry: {e}");
                None
            }
        })
        .collect()
}

pub async fn filter_requests(
    State(filter): State<Arc<IpFilter>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let client = filter.client_ip(request.headers(), addr.ip());
    if !filter.permits(client) {
        warn!(client = %client, "rejected request from filtered address");
        return StatusCode::FORBIDDEN.into_response();
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(allow: &[&str], deny: &[&str], block_by_default: bool) -> IpFilter {
        IpFilter::from_config(&FilteringConfig {
            allow_list: allow.iter().map(|s| s.to_string()).collect(),
            deny_list: deny.iter().map(|s| s.to_string()).collect(),
            block_by_default,
            trust_proxy: false,
        })
    }

    fn forwarded(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", value.parse().unwrap());
        headers
    }

    #[test]
    fn deny_list_wins_over_allow_list() {
        let filter = filter(&["10.0.0.1"], &["10.0.0.1"], false);
        assert!(!filter.permits("10.0.0.1".parse().unwrap()));
        assert!(filter.permits("10.0.0.2".parse().unwrap()));
    }

    #[test]
    fn block_by_default_requires_allow_entry() {
        let filter = filter(&["10.0.0.1"], &[], true);
        assert!(filter.permits("10.0.0.1".parse().unwrap()));
        assert!(!filter.permits("10.0.0.2".parse().unwrap()));
    }

    #[test]
    fn unparseable_entries_are_skipped() {
        let filter = filter(&["not-an-ip", "10.0.0.1"], &[], true);
        assert!(filter.permits("10.0.0.1".parse().unwrap()));
    }

    #[test]
    fn forwarded_address_is_used_when_proxy_is_trusted() {
        let filter = IpFilter::from_config(&FilteringConfig {
            deny_list: vec!["203.0.113.7".to_string()],
            trust_proxy: true,
            ..FilteringConfig::default()
        });
        let peer: IpAddr = "10.0.0.1".parse().unwrap();
        let client = filter.client_ip(&forwarded("203.0.113.7, 10.0.0.1"), peer);
        assert_eq!(client, "203.0.113.7".parse::<IpAddr>().unwrap());
        assert!(!filter.permits(client));
    }

    #[test]
    fn forwarded_address_is_ignored_without_trust_proxy() {
        let filter = filter(&[], &["203.0.113.7"], false);
        let peer: IpAddr = "10.0.0.1".parse().unwrap();
        let client = filter.client_ip(&forwarded("203.0.113.7"), peer);
        assert_eq!(client, peer);
        assert!(filter.permits(client));
    }

    #[test]
    fn malformed_forwarded_header_falls_back_to_peer() {
        let filter = IpFilter::from_config(&FilteringConfig {
            trust_proxy: true,
            ..FilteringConfig::default()
        });
        let peer: IpAddr = "10.0.0.1".parse().unwrap();
        assert_eq!(filter.client_ip(&forwarded("not-an-ip"), peer), peer);
        assert_eq!(filter.client_ip(&HeaderMap::new(), peer), peer);
    }
}
