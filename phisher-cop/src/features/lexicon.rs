//! Built-in word and domain lists

/// Registrable hosts treated as trusted senders and typosquatting targets
pub const SAFE_DOMAINS: &[&str] = &[
    "google.com", "gmail.com", "youtube.com", "facebook.com", "instagram.com",
    "whatsapp.com", "twitter.com", "x.com", "linkedin.com", "microsoft.com",
    "outlook.com", "live.com", "hotmail.com", "office.com", "apple.com",
    "icloud.com", "amazon.com", "amazon.co.uk", "ebay.com", "paypal.com",
    "netflix.com", "spotify.com", "dropbox.com", "github.com", "gitlab.com",
    "yahoo.com", "wikipedia.org", "reddit.com", "adobe.com", "zoom.us",
    "slack.com", "salesforce.com", "stripe.com", "wellsfargo.com", "chase.com",
    "bankofamerica.com", "citibank.com", "americanexpress.com", "visa.com",
    "mastercard.com", "irs.gov", "usps.com", "fedex.com", "ups.com", "dhl.com",
    "booking.com", "airbnb.com", "uber.com", "docusign.com", "intuit.com",
    "coinbase.com", "binance.com", "steampowered.com", "discord.com",
    "mozilla.org", "cloudflare.com", "protonmail.com", "yandex.ru", "baidu.com",
];

/// Brands a display name may impersonate
pub const BRAND_NAMES: &[&str] = &[
    "amazon", "apple", "bank of america", "chase", "citibank", "coinbase",
    "dhl", "docusign", "dropbox", "ebay", "facebook", "fedex", "google",
    "instagram", "irs", "linkedin", "microsoft", "netflix", "office 365",
    "outlook", "paypal", "spotify", "usps", "wells fargo", "yahoo",
];

/// Pressure words and phrases
pub const URGENCY_TERMS: &[&str] = &[
    "urgent", "urgently", "immediately", "immediate action", "act now",
    "action required", "asap", "expire", "expires", "expired", "expiring",
    "final notice", "last chance", "limited time", "right away", "suspended",
    "suspension", "within 24 hours", "within 48 hours", "deadline",
    "as soon as possible", "warning", "alert", "important notice",
];

/// Requests for secrets or account access
pub const CREDENTIAL_TERMS: &[&str] = &[
    "password", "passcode", "login", "log in", "sign in", "signin", "username",
    "verify your account", "verify your identity", "confirm your account",
    "confirm your identity", "update your account", "account details",
    "billing information", "credit card", "card number", "social security",
    "ssn", "pin", "security question", "credentials", "unlock your account",
];

/// Common English words carrying no signal
pub const STOP_WORDS: &[&str] = &[
    "about", "above", "after", "again", "against", "all", "also", "and", "any",
    "are", "because", "been", "before", "being", "below", "between", "both",
    "but", "can", "could", "did", "does", "doing", "down", "during", "each",
    "few", "for", "from", "further", "had", "has", "have", "having", "her",
    "here", "hers", "herself", "him", "himself", "his", "how", "into", "its",
    "itself", "just", "more", "most", "myself", "nor", "not", "now", "off",
    "once", "only", "other", "our", "ours", "ourselves", "out", "over", "own",
    "same", "she", "should", "some", "such", "than", "that", "the", "their",
    "theirs", "them", "themselves", "then", "there", "these", "they", "this",
    "those", "through", "too", "under", "until", "very", "was", "were", "what",
    "when", "where", "which", "while", "who", "whom", "why", "will", "with",
    "would", "you", "your", "yours", "yourself", "yourselves",
];

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.binary_search(&word).is_ok()
}

pub fn is_safe_domain(host: &str) -> bool {
    SAFE_DOMAINS.contains(&host)
}
