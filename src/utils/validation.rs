// Input validation shared by handlers and the analyzer
use crate::error::{Error, Result};
use reqwest::redirect::Policy;
use std::net::IpAddr;
use tracing::warn;
use url::Url;

// Ports that never serve a public website
const BLOCKED_PORTS: &[u16] = &[
    22,    // SSH
    23,    // Telnet
    25,    // SMTP
    3306,  // MySQL
    5432,  // PostgreSQL
    6379,  // Redis
    27017, // MongoDB
];

/// Longest scan interval accepted for a scheduled scan
pub const MAX_FREQUENCY_DAYS: i64 = 365;

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            let octets = ipv4.octets();
            octets[0] == 10
                || (octets[0] == 172 && (16..=31).contains(&octets[1]))
                || (octets[0] == 192 && octets[1] == 168)
                || (octets[0] == 169 && octets[1] == 254)
                || octets[0] == 127
        }
        IpAddr::V6(ipv6) => {
            ipv6.is_loopback()
                || (ipv6.segments()[0] & 0xffc0) == 0xfe80
                || (ipv6.segments()[0] & 0xfe00) == 0xfc00
        }
    }
}

/// Validate a URL is http/https and doesn't point at private resources
pub fn validate_url(url_str: &str) -> Result<Url> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "http" | "https" => {}
        _ => {
            warn!(
                "Security: Blocked non-HTTP(S) URL scheme: {} in URL: {}",
                url.scheme(),
                url_str
            );
            return Err(Error::Validation(format!(
                "URL must use http or https scheme: {url_str}"
            )));
        }
    }

    let host = url
        .host_str()
        .ok_or_else(|| Error::Validation("URL must have a valid host".to_string()))?;

    if host == "localhost" || host == "127.0.0.1" || host == "0.0.0.0" {
        warn!("Security: Blocked localhost URL: {}", url_str);
        return Err(Error::Validation(
            "Localhost URLs are not allowed".to_string(),
        ));
    }

    // Strip brackets from IPv6 hosts like "[::1]"
    let host_for_ip = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = host_for_ip.parse::<IpAddr>() {
        if ip.is_loopback() || ip.is_unspecified() || is_private_ip(&ip) {
            warn!("Security: Blocked private IP: {} in URL: {}", ip, url_str);
            return Err(Error::Validation(
                "Private, loopback and unspecified addresses are not allowed".to_string(),
            ));
        }
    }

    if let Some(port) = url.port() {
        if BLOCKED_PORTS.contains(&port) {
            warn!(
                "Security: Blocked restricted port {} in URL: {}",
                port, url_str
            );
            return Err(Error::Validation(format!(
                "Port {port} is not allowed for security reasons"
            )));
        }
    }

    Ok(url)
}

/// Redirect policy that runs `validate_url` on every hop, so a public
/// page cannot bounce a request onto a private address
pub fn guarded_redirects(max_redirects: usize) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() >= max_redirects {
            return attempt.error(format!("Too many redirects (limit {max_redirects})"));
        }
        let checked = validate_url(attempt.url().as_str());
        match checked {
            Ok(_) => attempt.follow(),
            Err(e) => attempt.error(e.to_string()),
        }
    })
}

/// Accept bare domains like "a.com" by assuming https, then validate.
/// Returns the normalized URL string that rows are keyed by.
pub fn normalize_website_url(input: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation("website_url is required".to_string()));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    Ok(validate_url(&candidate)?.to_string())
}

pub fn validate_frequency_days(days: i64) -> Result<()> {
    if !(1..=MAX_FREQUENCY_DAYS).contains(&days) {
        return Err(Error::Validation(format!(
            "frequency_days must be between 1 and {MAX_FREQUENCY_DAYS}"
        )));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<()> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(Error::Validation(format!("Invalid email address: {email}"))),
    }
}

/// Require a non-empty string field
pub fn require<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation(format!("{field} is required")));
    }
    Ok(trimmed)
}
