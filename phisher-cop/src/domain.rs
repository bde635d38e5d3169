//! Domain and URL helpers
//!
//! Splits hosts into subdomain / registrable name / public suffix and
//! normalizes URLs found in message bodies so they can be compared.

use std::net::IpAddr;
use url::{Host, Url};

/// A host split into its structural components
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Domain {
    /// e.g. `www` in `www.example.co.uk`
    pub subdomain: String,
    /// e.g. `example` in `www.example.co.uk`
    pub name: String,
    /// e.g. `co.uk` in `www.example.co.uk`
    pub suffix: String,
}

impl Domain {
    /// Split a host name into its parts. IP literals and single-label hosts are
    /// kept whole in `name`.
    pub fn parse(host: &str) -> Self {
        let host = host.trim().trim_end_matches('.').to_lowercase();
        let host = host.trim_start_matches('[').trim_end_matches(']').to_string();

        if host.parse::<IpAddr>().is_ok() || !host.contains('.') {
            return Domain {
                name: host,
                ..Default::default()
            };
        }

        let host = host
            .split('.')
            .filter(|label| !label.is_empty())
            .collect::<Vec<_>>()
            .join(".");

        // Hosts that are themselves a public suffix have no registrable part
        let (registrable, suffix) = match (psl::domain_str(&host), psl::suffix_str(&host)) {
            (Some(registrable), Some(suffix)) if registrable.len() > suffix.len() => {
                (registrable, suffix)
            }
            _ => {
                return Domain {
                    name: host.clone(),
                    ..Default::default()
                }
            }
        };

        let name = registrable
            .strip_suffix(suffix)
            .unwrap_or(registrable)
            .trim_end_matches('.');
        let subdomain = host
            .strip_suffix(registrable)
            .unwrap_or_default()
            .trim_end_matches('.');
        Domain {
            subdomain: subdomain.to_string(),
            name: name.to_string(),
            suffix: suffix.to_string(),
        }
    }

    /// Registrable host, e.g. `example.co.uk`
    pub fn host(&self) -> String {
        if self.suffix.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.name, self.suffix)
        }
    }

    pub fn is_ip(&self) -> bool {
        self.name.parse::<IpAddr>().is_ok()
    }
}

/// Normalize a URL-looking token: lowercase, drop query and fragment, strip the
/// trailing slash. Returns `None` for anything without an http(s) host.
pub fn normalize_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches(|c: char| {
        matches!(
            c,
            '<' | '>' | '(' | ')' | '"' | '\'' | ',' | ';' | '.' | '!' | '?' | ':'
        )
    });

    let lower = trimmed.to_lowercase();
    let candidate = if lower.starts_with("www.") {
        format!("http://{}", lower)
    } else {
        lower
    };

    if !(candidate.starts_with("http://") || candidate.starts_with("https://")) {
        return None;
    }

    let url = Url::parse(&candidate).ok()?;
    let host = url.host_str()?;
    if host.is_empty() {
        return None;
    }

    let mut normalized = format!("{}://{}", url.scheme(), host);
    if let Some(port) = url.port() {
        normalized.push(':');
        normalized.push_str(&port.to_string());
    }
    normalized.push_str(url.path().trim_end_matches('/'));
    Some(normalized)
}

/// Host of a normalized URL, without IPv6 brackets
pub fn url_host(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(host.trim_start_matches('[').trim_end_matches(']').to_string())
}

/// Whether the URL addresses its server by IPv4/IPv6 literal
pub fn is_ip_literal_url(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.host()
                .map(|h| matches!(h, Host::Ipv4(_) | Host::Ipv6(_)))
        })
        .unwrap_or(false)
}
