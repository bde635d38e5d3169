use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::parser::MimeParser;
use crate::error::{PhishError, Result};

/// An email exactly as received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEmail(Vec<u8>);

impl RawEmail {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        RawEmail(bytes.into())
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(RawEmail(std::fs::read(path)?))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for RawEmail {
    fn from(bytes: Vec<u8>) -> Self {
        RawEmail(bytes)
    }
}

impl From<&str> for RawEmail {
    fn from(text: &str) -> Self {
        RawEmail(text.as_bytes().to_vec())
    }
}

/// Something the parser could not read and replaced with a default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseDegradation {
    /// Input was empty or whitespace only
    EmptyMessage,
    /// No blank line between headers and body
    MissingHeaderSeparator,
    /// No usable From header
    MissingSender,
    /// No Subject header
    MissingSubject,
    /// Multipart Content-Type without a boundary parameter
    MissingBoundary,
    /// A part's transfer encoding or charset could not be decoded cleanly
    InvalidTransferEncoding,
}

/// Normalized view of an email used by feature extraction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedEmail {
    /// Decoded From header value
    pub sender: String,
    /// Decoded Subject header value
    pub subject: String,
    /// Decoded Cc header value
    pub cc: String,
    /// Readable text of the body parts, HTML-only parts converted to text,
    /// reply-quote markers removed
    pub body_text: String,
    /// Raw HTML of the text/html parts
    pub html_body: String,
    /// Normalized, de-duplicated URLs in first-seen order
    pub urls: Vec<String>,
    /// Headers keyed by lowercased name (first occurrence wins)
    pub header_fields: BTreeMap<String, String>,
    pub has_attachment: bool,
    pub attachment_count: usize,
    pub degradations: Vec<ParseDegradation>,
}

impl ParsedEmail {
    /// Build an email from form-style input (sender, subject, HTML or text body)
    pub fn from_fields(sender: &str, subject: &str, body: &str, cc: &str) -> Result<Self> {
        if sender.trim().is_empty() || subject.trim().is_empty() || body.trim().is_empty() {
            return Err(PhishError::InvalidInput(
                "sender, subject and body must not be empty".to_string(),
            ));
        }

        // Header values must stay on one line
        let single_line = |s: &str| s.replace(&['\r', '\n'][..], " ");
        let mut message = format!(
            "From: {}\r\nSubject: {}\r\n",
            single_line(sender),
            single_line(subject)
        );
        if !cc.trim().is_empty() {
            message.push_str(&format!("Cc: {}\r\n", single_line(cc)));
        }
        message.push_str("Content-Type: text/html; charset=utf-8\r\n\r\n");
        message.push_str(body);

        Ok(MimeParser::parse(message.as_bytes()))
    }

    /// Header lookup by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.header_fields
            .get(&name.to_lowercase())
            .map(String::as_str)
    }

    /// Text the vectorizer sees: subject followed by body
    pub fn document_text(&self) -> String {
        match (self.subject.is_empty(), self.body_text.is_empty()) {
            (true, true) => String::new(),
            (false, true) => self.subject.clone(),
            (true, false) => self.body_text.clone(),
            (false, false) => format!("{}\n{}", self.subject, self.body_text),
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }
}
