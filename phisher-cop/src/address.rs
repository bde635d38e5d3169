//! Mailbox parsing
//!
//! Turns header values such as `"PayPal Support" <service+id@paypal.com>` into
//! structured addresses for the sender and whitelist features.

use crate::domain::Domain;

/// A parsed mailbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress {
    /// Display name, unquoted; empty when absent
    pub display_name: String,
    /// Local part before any `+alias`
    pub username: String,
    /// Plus-addressing suffix, empty when absent
    pub alias: String,
    pub domain: Domain,
}

impl EmailAddress {
    pub fn host(&self) -> String {
        self.domain.host()
    }
}

/// Parse a single mailbox. Returns `None` when no usable `local@host` is found.
pub fn parse_mailbox(value: &str) -> Option<EmailAddress> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let (display, addr) = match (value.rfind('<'), value.rfind('>')) {
        (Some(open), Some(close)) if open < close => {
            (value[..open].trim(), value[open + 1..close].trim())
        }
        _ => match (value.find('('), value.rfind(')')) {
            // Old-style `user@host (Display Name)`
            (Some(open), Some(close)) if open < close => {
                (value[open + 1..close].trim(), value[..open].trim())
            }
            _ => ("", value),
        },
    };

    let (local, host) = addr.rsplit_once('@')?;
    let local = local.trim();
    let host = host.trim().trim_end_matches('.');
    if local.is_empty()
        || host.is_empty()
        || host.contains(char::is_whitespace)
        || local.contains(char::is_whitespace)
        || host.contains('@')
    {
        return None;
    }

    let (username, alias) = match local.split_once('+') {
        Some((user, alias)) => (user, alias),
        None => (local, ""),
    };

    Some(EmailAddress {
        display_name: display.trim_matches('"').trim().to_string(),
        username: username.to_string(),
        alias: alias.to_string(),
        domain: Domain::parse(host),
    })
}

/// Parse a comma-separated address list (From, Cc), skipping invalid entries
pub fn parse_address_list(value: &str) -> Vec<EmailAddress> {
    split_addresses(value)
        .into_iter()
        .filter_map(|entry| parse_mailbox(&entry))
        .collect()
}

/// Split on commas that are outside quotes and angle brackets
fn split_addresses(value: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut in_angle = false;

    for ch in value.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '<' if !in_quotes => in_angle = true,
            '>' if !in_quotes => in_angle = false,
            ',' if !in_quotes && !in_angle => {
                entries.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    entries.push(current);

    entries
        .into_iter()
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect()
}
