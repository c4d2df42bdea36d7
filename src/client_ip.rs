use axum::http::HeaderMap;
use std::net::IpAddr;

// Checked in order; each may carry a comma-separated chain
const PROXY_HEADERS: [&str; 3] = ["x-forwarded-for", "x-real-ip", "client-ip"];

/// First public address named by a proxy header, else the socket peer.
pub fn resolve(headers: &HeaderMap, peer: IpAddr, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers {
        let forwarded = PROXY_HEADERS
            .iter()
            .filter_map(|name| headers.get(*name))
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .filter_map(|candidate| candidate.trim().parse::<IpAddr>().ok())
            .find(is_public);

        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }
    peer.to_string()
}

// Excludes private, loopback, link-local and reserved ranges
fn is_public(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let first = v4.octets()[0];
            !(v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || first == 0
                || first >= 240)
        }
        IpAddr::V6(v6) => {
            let head = v6.segments()[0];
            !(v6.is_loopback()
                || v6.is_unspecified()
                || (head & 0xfe00) == 0xfc00 // unique local
                || (head & 0xffc0) == 0xfe80 // link local
                || v6.to_ipv4_mapped().is_some())
        }
    }
}
