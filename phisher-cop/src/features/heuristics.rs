//! Structural phishing heuristics
//!
//! Each function maps one aspect of a [`ParsedEmail`] to a non-negative
//! number. [`structural_features`] evaluates all of them in the order of
//! [`STRUCTURAL_FEATURES`](super::STRUCTURAL_FEATURES).

use once_cell::sync::Lazy;
use regex::Regex;

use super::bktree::BkTree;
use super::lexicon::{is_safe_domain, BRAND_NAMES, CREDENTIAL_TERMS, SAFE_DOMAINS, URGENCY_TERMS};
use super::tokenize::{count_phrases, lowercase_words, raw_tokens, words};
use crate::address::{parse_address_list, parse_mailbox, EmailAddress};
use crate::domain::{is_ip_literal_url, url_host, Domain};
use crate::mime::ParsedEmail;

static SAFE_DOMAIN_TREE: Lazy<BkTree> = Lazy::new(|| BkTree::new(SAFE_DOMAINS.iter().copied()));
static MONEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[$€£]\d+").expect("money pattern"));
static DOMAIN_LIKE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b[a-z0-9][a-z0-9-]*(?:\.[a-z0-9-]+)*\.[a-z]{2,}\b").expect("domain pattern")
});

/// Headers whose absence is counted
const EXPECTED_HEADERS: &[&str] = &["from", "subject", "date", "message-id"];

/// Maximum edit distance for a host to count as a typosquat
const TYPOSQUAT_DISTANCE: usize = 1;

/// Compute the structural block for an email
pub fn structural_features(email: &ParsedEmail, suspicious_words: &[String]) -> Vec<f64> {
    let sender = parse_mailbox(&email.sender);
    let url_domains = url_domains(&email.urls);
    let text = email.document_text();
    let tokens = raw_tokens(&text);
    let text_words = words(&tokens);
    let lower_words = lowercase_words(&text);

    let mut addresses = parse_address_list(&email.sender);
    addresses.extend(parse_address_list(&email.cc));

    let mut hosts: Vec<Domain> = url_domains.clone();
    if let Some(ref sender) = sender {
        hosts.push(sender.domain.clone());
    }

    vec![
        email.urls.len() as f64,
        count_ip_urls(&email.urls) as f64,
        flag(sender_url_domain_mismatch(sender.as_ref(), &url_domains)),
        flag(display_name_mismatch(sender.as_ref())),
        flag(reply_to_mismatch(sender.as_ref(), email.header("reply-to"))),
        missing_header_count(email) as f64,
        count_phrases(&lower_words, URGENCY_TERMS) as f64,
        count_phrases(&lower_words, CREDENTIAL_TERMS) as f64,
        score_suspicious_words(&text_words, suspicious_words),
        count_typosquatted_domains(&hosts) as f64,
        count_whitelisted_addresses(&addresses) as f64,
        capital_words_ratio(&text_words),
        money_tokens_ratio(&tokens),
        html_to_text_ratio(&email.html_body, &email.body_text),
        email.attachment_count as f64,
    ]
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

fn url_domains(urls: &[String]) -> Vec<Domain> {
    urls.iter()
        .filter_map(|url| url_host(url))
        .map(|host| Domain::parse(&host))
        .collect()
}

pub fn count_ip_urls(urls: &[String]) -> usize {
    urls.iter().filter(|url| is_ip_literal_url(url)).count()
}

/// True when the sender is unparseable, or URLs exist and none is on the sender's host
pub fn sender_url_domain_mismatch(sender: Option<&EmailAddress>, url_domains: &[Domain]) -> bool {
    let Some(sender) = sender else {
        return true;
    };
    if url_domains.is_empty() {
        return false;
    }
    let sender_host = sender.host();
    !url_domains.iter().any(|domain| domain.host() == sender_host)
}

/// True when the display name names a domain or brand the sender host does not match
pub fn display_name_mismatch(sender: Option<&EmailAddress>) -> bool {
    let Some(sender) = sender else {
        return false;
    };
    let display = sender.display_name.to_lowercase();
    if display.is_empty() {
        return false;
    }

    let sender_host = sender.host();
    let names_other_domain = DOMAIN_LIKE
        .find_iter(&display)
        .map(|m| Domain::parse(m.as_str()).host())
        .any(|host| host != sender_host);
    if names_other_domain {
        return true;
    }

    let display_words = lowercase_words(&display);
    let compact_host = sender_host.replace('-', "");
    BRAND_NAMES.iter().any(|brand| {
        count_phrases(&display_words, &[*brand]) > 0
            && !compact_host.contains(&brand.replace(' ', ""))
    })
}

/// True when a Reply-To exists and does not share the sender's host
pub fn reply_to_mismatch(sender: Option<&EmailAddress>, reply_to: Option<&str>) -> bool {
    let Some(reply_to) = reply_to.and_then(|value| parse_address_list(value).into_iter().next())
    else {
        return false;
    };
    match sender {
        Some(sender) => reply_to.host() != sender.host(),
        None => true,
    }
}

pub fn missing_header_count(email: &ParsedEmail) -> usize {
    EXPECTED_HEADERS
        .iter()
        .filter(|name| email.header(name).map_or(true, |v| v.trim().is_empty()))
        .count()
}

/// Position-weighted share of suspicious words; earlier words weigh up to 2, the last 1
pub fn score_suspicious_words(words: &[&str], suspicious_words: &[String]) -> f64 {
    if words.is_empty() || suspicious_words.is_empty() {
        return 0.0;
    }

    let end = words.len().saturating_sub(1).max(1) as f64;
    let score: f64 = words
        .iter()
        .enumerate()
        .filter(|(_, word)| {
            suspicious_words
                .binary_search_by(|probe| probe.as_str().cmp(word.to_lowercase().as_str()))
                .is_ok()
        })
        .map(|(index, _)| 2.0 - index as f64 / end)
        .sum();

    score / words.len() as f64
}

/// Hosts one edit away from a known safe domain without being one
pub fn count_typosquatted_domains(domains: &[Domain]) -> usize {
    domains
        .iter()
        .filter(|domain| !domain.is_ip())
        .map(Domain::host)
        .filter(|host| {
            !SAFE_DOMAIN_TREE.contains(host)
                && SAFE_DOMAIN_TREE.contains_within(host, TYPOSQUAT_DISTANCE)
        })
        .count()
}

pub fn count_whitelisted_addresses(addresses: &[EmailAddress]) -> usize {
    addresses
        .iter()
        .filter(|address| is_safe_domain(&address.host()))
        .count()
}

pub fn capital_words_ratio(words: &[&str]) -> f64 {
    let capital = words
        .iter()
        .filter(|word| word.chars().all(|c| c.is_alphabetic() && c.is_uppercase()))
        .count();
    capital as f64 / words.len().max(1) as f64
}

pub fn money_tokens_ratio(tokens: &[&str]) -> f64 {
    let money = tokens.iter().filter(|token| MONEY.is_match(token)).count();
    money as f64 / tokens.len().max(1) as f64
}

pub fn html_to_text_ratio(html: &str, text: &str) -> f64 {
    let html_chars = html.chars().count();
    let total = html_chars + text.chars().count();
    if total == 0 {
        return 0.0;
    }
    html_chars as f64 / total as f64
}
