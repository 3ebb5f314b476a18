//! Outbound URL vetting (SSRF guard)
//!
//! Webhook targets are user-supplied, so every URL is checked before a row is
//! written and again before every delivery. The check operates on the literal
//! hostname only; DNS rebinding after validation is documented residual risk.

use std::net::IpAddr;

/// Validate that a webhook target URL is safe to deliver to.
///
/// Accepts only http/https. Rejects:
/// - loopback (127.0.0.0/8, ::1), 0.0.0.0 and the literal `localhost`
/// - link-local 169.254.0.0/16 (includes cloud metadata endpoints)
/// - RFC1918 ranges (10/8, 172.16/12, 192.168/16)
///
/// # Returns
///
/// `Ok(())` when the URL may be used, `Err(reason)` otherwise.
pub fn validate_target_url(raw: &str) -> Result<(), String> {
    let parsed = url::Url::parse(raw).map_err(|e| format!("invalid URL: {e}"))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(format!("unsupported URL scheme: {scheme}")),
    }

    let Some(host) = parsed.host() else {
        return Err("URL has no host".to_string());
    };

    match host {
        url::Host::Domain(domain) => {
            let lower = domain.to_ascii_lowercase();
            if lower == "localhost" || lower.ends_with(".localhost") {
                return Err("URL points to localhost".to_string());
            }
            // A domain slot can still carry a raw IP string
            if let Ok(ip) = lower.parse::<IpAddr>() {
                if !is_publicly_routable(ip) {
                    return Err(format!("URL points to a non-public IP: {ip}"));
                }
            }
        }
        url::Host::Ipv4(ip) => {
            if !is_publicly_routable(IpAddr::V4(ip)) {
                return Err(format!("URL points to a non-public IPv4: {ip}"));
            }
        }
        url::Host::Ipv6(ip) => {
            if !is_publicly_routable(IpAddr::V6(ip)) {
                return Err(format!("URL points to a non-public IPv6: {ip}"));
            }
        }
    }

    Ok(())
}

/// Variant honoring the private-target escape hatch used by tests and local
/// development: scheme and parseability are always enforced, the
/// routability check only when `allow_private` is off.
pub fn validate_target_url_with(raw: &str, allow_private: bool) -> Result<(), String> {
    if !allow_private {
        return validate_target_url(raw);
    }

    let parsed = url::Url::parse(raw).map_err(|e| format!("invalid URL: {e}"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(format!("unsupported URL scheme: {scheme}")),
    }
}

/// Check whether an IP address is publicly routable.
fn is_publicly_routable(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !v4.is_loopback()       // 127.0.0.0/8
                && !v4.is_private()     // 10/8, 172.16/12, 192.168/16
                && !v4.is_link_local()  // 169.254.0.0/16
                && !v4.is_unspecified() // 0.0.0.0
        }
        IpAddr::V6(v6) => {
            // IPv4-mapped (::ffff:x.x.x.x) re-checks the embedded IPv4
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_publicly_routable(IpAddr::V4(mapped));
            }
            !v6.is_loopback()           // ::1
                && !v6.is_unspecified() // ::
                // fe80::/10 link-local
                && (v6.segments()[0] & 0xffc0) != 0xfe80
        }
    }
}
