use mail_parser::{Address, Message, MessageParser, PartType};
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use super::types::{ParseDegradation, ParsedEmail};
use crate::address::parse_mailbox;
use crate::domain::normalize_url;

static HREF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)href\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>"']+))"#).expect("href pattern")
});
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag pattern"));

/// Decoded bodies gathered from the message parts
#[derive(Default)]
struct Bodies {
    /// Readable text, HTML-only parts already converted
    text: Vec<String>,
    /// Raw markup of the text/html parts
    html: Vec<String>,
}

/// Turns raw messages into [`ParsedEmail`] records.
///
/// MIME structure, transfer encodings, charsets and RFC 2047 words are
/// handled by `mail_parser`; this type keeps track of what could not be read
/// and extracts the text, URLs and HTML the feature extractor needs.
pub struct MimeParser;

impl MimeParser {
    /// Parse a raw email message into a normalized record.
    ///
    /// Never fails: anything unreadable falls back to an empty value and a
    /// [`ParseDegradation`] is recorded on the result.
    pub fn parse(raw: &[u8]) -> ParsedEmail {
        let text = String::from_utf8_lossy(raw);

        if text.trim().is_empty() {
            debug!("Empty message, nothing to parse");
            return ParsedEmail {
                degradations: vec![ParseDegradation::EmptyMessage],
                ..Default::default()
            };
        }

        let mut degradations = Vec::new();
        let framed: Cow<[u8]> = if Self::starts_with_header(&text) {
            if Self::body_offset(&text).is_none() {
                degradations.push(ParseDegradation::MissingHeaderSeparator);
            }
            Cow::Borrowed(raw)
        } else {
            // An empty header block makes the whole input the body
            degradations.push(ParseDegradation::MissingHeaderSeparator);
            let mut framed = b"\r\n".to_vec();
            framed.extend_from_slice(raw);
            Cow::Owned(framed)
        };

        let mut bodies = Bodies::default();
        let mut email = match MessageParser::default().parse(&framed[..]) {
            Some(message) => Self::read_message(&message, &text, &mut bodies, &mut degradations),
            None => {
                debug!("Message did not parse, keeping it as plain text");
                bodies.text.push(Self::remove_quote_prefixes(&text));
                ParsedEmail::default()
            }
        };

        if parse_mailbox(&email.sender).is_none() {
            degradations.push(ParseDegradation::MissingSender);
        }
        if !email.header_fields.contains_key("subject") {
            degradations.push(ParseDegradation::MissingSubject);
        }
        if !degradations.is_empty() {
            debug!("Parsed email with degradations: {:?}", degradations);
        }

        email.body_text = bodies.text.join("\n").trim().to_string();
        email.html_body = bodies.html.join("\n");
        email.urls = Self::extract_urls(&bodies);
        email.degradations = degradations;
        email
    }

    /// Header fields, addresses, bodies and attachments of a parsed message
    fn read_message(
        message: &Message,
        raw_text: &str,
        bodies: &mut Bodies,
        degradations: &mut Vec<ParseDegradation>,
    ) -> ParsedEmail {
        let mut header_fields = BTreeMap::new();
        for (name, value) in message.headers_raw() {
            header_fields
                .entry(name.to_lowercase())
                .or_insert_with(|| Self::unfold(value));
        }

        let email = ParsedEmail {
            sender: message.from().map(Self::format_addresses).unwrap_or_default(),
            subject: message.subject().unwrap_or_default().trim().to_string(),
            cc: message.cc().map(Self::format_addresses).unwrap_or_default(),
            has_attachment: message.attachment_count() > 0,
            attachment_count: message.attachment_count(),
            header_fields,
            ..Default::default()
        };

        let missing_boundary = email
            .header("content-type")
            .map(|content_type| {
                content_type.trim().to_lowercase().starts_with("multipart/")
                    && Self::extract_parameter(content_type, "boundary").is_none()
            })
            .unwrap_or(false);
        if missing_boundary {
            // Nothing delimits the parts, so the whole body reads as text
            degradations.push(ParseDegradation::MissingBoundary);
            let body = Self::body_offset(raw_text)
                .and_then(|offset| raw_text.get(offset..))
                .unwrap_or_default();
            bodies.text.push(Self::remove_quote_prefixes(body));
            return ParsedEmail {
                has_attachment: false,
                attachment_count: 0,
                ..email
            };
        }

        for (index, id) in message.text_body.iter().enumerate() {
            let is_plain = matches!(
                message.parts.get(*id as usize).map(|part| &part.body),
                Some(PartType::Text(_))
            );
            if let Some(body) = message.body_text(index) {
                if is_plain {
                    bodies.text.push(Self::remove_quote_prefixes(&body));
                } else {
                    bodies.text.push(body.into_owned());
                }
            }
        }

        for id in &message.html_body {
            if let Some(PartType::Html(html)) = message.parts.get(*id as usize).map(|part| &part.body)
            {
                bodies.html.push(html.trim().to_string());
            }
        }

        if message.parts.iter().any(|part| part.is_encoding_problem) {
            degradations.push(ParseDegradation::InvalidTransferEncoding);
        }

        email
    }

    /// Render an address header as `Name <local@host>` entries joined by commas
    fn format_addresses(address: &Address) -> String {
        let mailboxes: Vec<_> = match address {
            Address::List(list) => list.iter().collect(),
            Address::Group(groups) => groups.iter().flat_map(|g| g.addresses.iter()).collect(),
        };

        mailboxes
            .into_iter()
            .filter_map(|mailbox| {
                let name = mailbox.name().map(str::trim).filter(|n| !n.is_empty());
                match (name, mailbox.address()) {
                    (Some(name), Some(addr)) if name.contains(',') || name.contains('"') => {
                        Some(format!("\"{}\" <{}>", name.replace('"', ""), addr))
                    }
                    (Some(name), Some(addr)) => Some(format!("{} <{}>", name, addr)),
                    (None, Some(addr)) => Some(addr.to_string()),
                    (Some(name), None) => Some(name.to_string()),
                    (None, None) => None,
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Whether the first line is a `Name: value` header field
    fn starts_with_header(text: &str) -> bool {
        text.lines()
            .next()
            .and_then(|line| line.split_once(':'))
            .map(|(name, _)| !name.is_empty() && name.bytes().all(|b| b.is_ascii_graphic()))
            .unwrap_or(false)
    }

    /// Byte offset of the body, just past the first blank line
    fn body_offset(text: &str) -> Option<usize> {
        let crlf = text.find("\r\n\r\n").map(|pos| pos + 4);
        let lf = text.find("\n\n").map(|pos| pos + 2);
        match (crlf, lf) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Collapse a folded header value onto one line
    fn unfold(value: &str) -> String {
        value.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Extract parameter value from header (e.g., filename="file.txt")
    fn extract_parameter(header: &str, param_name: &str) -> Option<String> {
        let prefix = format!("{}=", param_name);
        for part in header.split(';') {
            let part = part.trim();
            let matches = part
                .get(..prefix.len())
                .map(|head| head.eq_ignore_ascii_case(&prefix))
                .unwrap_or(false);
            if matches && part.len() > prefix.len() {
                let value = part[prefix.len()..].trim_matches('"').trim_matches('\'');
                return Some(value.to_string());
            }
        }
        None
    }

    /// Remove `>` reply-quote markers, each with at most one following space
    fn remove_quote_prefixes(text: &str) -> String {
        text.lines()
            .map(|line| {
                let mut rest = line;
                while let Some(quoted) = rest.strip_prefix('>') {
                    rest = quoted.strip_prefix(' ').unwrap_or(quoted);
                }
                rest
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// URLs from text tokens, anchor hrefs and visible HTML text
    fn extract_urls(bodies: &Bodies) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut urls = Vec::new();
        let mut push = |candidate: &str| {
            if let Some(url) = normalize_url(candidate) {
                if seen.insert(url.clone()) {
                    urls.push(url);
                }
            }
        };

        for text in &bodies.text {
            for token in text.split_whitespace() {
                push(token);
            }
        }

        for html in &bodies.html {
            for caps in HREF.captures_iter(html) {
                if let Some(href) = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)) {
                    push(&href.as_str().replace("&amp;", "&"));
                }
            }
            for token in TAG.replace_all(html, " ").split_whitespace() {
                push(&token.replace("&amp;", "&"));
            }
        }

        urls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_with_header() {
        assert!(MimeParser::starts_with_header("From: a@example.com\n\nbody"));
        assert!(MimeParser::starts_with_header("X-Mailer:thing"));
        assert!(!MimeParser::starts_with_header("Dear user: please verify"));
        assert!(!MimeParser::starts_with_header("no colon here"));
    }

    #[test]
    fn test_body_offset() {
        assert_eq!(MimeParser::body_offset("A: b\r\n\r\nbody"), Some(8));
        assert_eq!(MimeParser::body_offset("A: b\n\nbody"), Some(6));
        assert_eq!(MimeParser::body_offset("A: b\nC: d"), None);
    }

    #[test]
    fn test_unfold() {
        assert_eq!(
            MimeParser::unfold(" This is a very long subject\r\n that spans lines\r\n"),
            "This is a very long subject that spans lines"
        );
    }

    #[test]
    fn test_extract_boundary() {
        let content_type = "multipart/mixed; boundary=\"----=_Part_123\"";
        let boundary = MimeParser::extract_parameter(content_type, "boundary");
        assert_eq!(boundary, Some("----=_Part_123".to_string()));
    }

    #[test]
    fn test_extract_boundary_no_quotes() {
        let content_type = "multipart/mixed; Boundary=simple_boundary";
        let boundary = MimeParser::extract_parameter(content_type, "boundary");
        assert_eq!(boundary, Some("simple_boundary".to_string()));
    }

    #[test]
    fn test_remove_quote_prefixes_keeps_indentation() {
        let text = "Steps:\n    1. open the link\n> > quoted\n>  two spaces\n  > not a quote";
        assert_eq!(
            MimeParser::remove_quote_prefixes(text),
            "Steps:\n    1. open the link\nquoted\n two spaces\n  > not a quote"
        );
    }

    #[test]
    fn test_parse_simple_text_email() {
        let message = b"From: sender@example.com\nTo: recipient@example.com\nSubject: Test\n\nHello World";
        let parsed = MimeParser::parse(message);

        assert_eq!(parsed.sender, "sender@example.com");
        assert_eq!(parsed.subject, "Test");
        assert_eq!(parsed.body_text, "Hello World");
        assert_eq!(parsed.header("to"), Some("recipient@example.com"));
        assert_eq!(parsed.attachment_count, 0);
        assert!(parsed.degradations.is_empty());
    }

    #[test]
    fn test_parse_headers_first_wins_and_unfolds() {
        let message = b"From: a@example.com\nReceived: first\nReceived: second\nSubject: a long\n subject\n\nbody";
        let parsed = MimeParser::parse(message);

        assert_eq!(parsed.header("received"), Some("first"));
        assert_eq!(parsed.header("Subject"), Some("a long subject"));
    }

    #[test]
    fn test_parse_multipart_email() {
        let message = b"From: a@example.com\nSubject: x\nContent-Type: multipart/alternative; boundary=\"boundary123\"\n\nThis is a preamble\n--boundary123\nContent-Type: text/plain\n\nText part\n--boundary123\nContent-Type: text/html\n\n<p>HTML part</p>\n--boundary123--\nepilogue";

        let parsed = MimeParser::parse(message);

        assert_eq!(parsed.body_text, "Text part");
        assert_eq!(parsed.html_body, "<p>HTML part</p>");
        assert!(!parsed.body_text.contains("preamble"));
        assert!(!parsed.body_text.contains("epilogue"));
    }

    #[test]
    fn test_parse_boundary_text_inside_body_line() {
        let message = b"From: a@example.com\nSubject: x\nContent-Type: multipart/mixed; boundary=\"b\"\n\n--b\nContent-Type: text/plain\n\nVerify now--bad guys win http://10.0.0.1/x\n--b--\n";

        let parsed = MimeParser::parse(message);

        assert_eq!(parsed.body_text, "Verify now--bad guys win http://10.0.0.1/x");
        assert_eq!(parsed.urls, vec!["http://10.0.0.1/x".to_string()]);
    }

    #[test]
    fn test_parse_html_only_email() {
        let message = b"From: a@example.com\nSubject: x\nContent-Type: text/html; charset=utf-8\n\n<html><body><p>Please <b>verify</b> now</p></body></html>";

        let parsed = MimeParser::parse(message);

        assert!(parsed.body_text.contains("verify"));
        assert!(!parsed.body_text.contains("<b>"));
        assert!(parsed.html_body.contains("<b>verify</b>"));
    }

    #[test]
    fn test_parse_email_with_attachment() {
        let message = b"Subject: x\nContent-Type: multipart/mixed; boundary=\"bound\"\n\n--bound\nContent-Type: text/plain\n\nBody\n--bound\nContent-Type: application/pdf\nContent-Disposition: attachment; filename=\"file.pdf\"\nContent-Transfer-Encoding: base64\n\nJVBERi0xLjQ=\n--bound--";

        let parsed = MimeParser::parse(message);

        assert_eq!(parsed.body_text, "Body");
        assert!(parsed.has_attachment);
        assert_eq!(parsed.attachment_count, 1);
        assert!(!parsed.body_text.contains("JVBER"));
    }

    #[test]
    fn test_parse_nested_multipart() {
        let message = b"Subject: nested\nContent-Type: multipart/mixed; boundary=outer\n\n--outer\nContent-Type: multipart/alternative; boundary=inner\n\n--inner\nContent-Type: text/plain\nContent-Transfer-Encoding: quoted-printable\n\nVerify=20now\n--inner--\n--outer\nContent-Type: image/png\n\nPNGDATA\n--outer--";

        let parsed = MimeParser::parse(message);

        assert_eq!(parsed.body_text, "Verify now");
        assert_eq!(parsed.attachment_count, 1);
    }

    #[test]
    fn test_parse_base64_body() {
        let message = b"Subject: b64\nContent-Type: text/plain; charset=utf-8\nContent-Transfer-Encoding: base64\n\nSGVsbG8gV29ybGQ=";
        let parsed = MimeParser::parse(message);
        assert_eq!(parsed.body_text, "Hello World");
    }

    #[test]
    fn test_parse_windows_1251_subject_and_body() {
        let message = b"From: bank@example.ru\nSubject: =?windows-1251?B?z/Do4uXy?=\nContent-Type: text/plain; charset=windows-1251\nContent-Transfer-Encoding: quoted-printable\n\n=CF=F0=E8=E2=E5=F2";

        let parsed = MimeParser::parse(message);

        assert_eq!(parsed.subject, "Привет");
        assert_eq!(parsed.body_text, "Привет");
    }

    #[test]
    fn test_parse_latin1_encoded_words() {
        let message = b"From: a@example.com\nSubject: =?iso-8859-1?Q?caf=E9_ouvert?=\n\nbody";
        let parsed = MimeParser::parse(message);
        assert_eq!(parsed.subject, "café ouvert");
    }

    #[test]
    fn test_parse_multipart_without_boundary() {
        let message = b"Subject: x\nContent-Type: multipart/mixed\n\nJust text";
        let parsed = MimeParser::parse(message);
        assert_eq!(parsed.body_text, "Just text");
        assert!(parsed.degradations.contains(&ParseDegradation::MissingBoundary));
    }

    #[test]
    fn test_parse_extracts_urls() {
        let message = b"From: a@example.com\nSubject: links\nContent-Type: multipart/alternative; boundary=b\n\n--b\nContent-Type: text/plain\n\nGo to http://192.168.0.1/login or www.example.com.\n--b\nContent-Type: text/html\n\n<a href=\"https://Evil.example.net/Verify?id=1\">click</a> <a href='http://192.168.0.1/login/'>again</a>\n--b--";

        let parsed = MimeParser::parse(message);

        assert_eq!(
            parsed.urls,
            vec![
                "http://192.168.0.1/login".to_string(),
                "http://www.example.com".to_string(),
                "https://evil.example.net/verify".to_string(),
            ]
        );
    }

    #[test]
    fn test_parse_encoded_sender() {
        let message = b"From: =?utf-8?Q?Service_Client?= <support@example.com>\nSubject: =?utf-8?B?VXJnZW50?=\n\nbody";
        let parsed = MimeParser::parse(message);
        assert_eq!(parsed.subject, "Urgent");
        assert_eq!(parsed.sender, "Service Client <support@example.com>");
    }

    #[test]
    fn test_parse_cc_list() {
        let message = b"From: a@example.com\nCc: One <one@example.com>, two@example.org\nSubject: x\n\nbody";
        let parsed = MimeParser::parse(message);
        assert_eq!(parsed.cc, "One <one@example.com>, two@example.org");
    }

    #[test]
    fn test_parse_removes_quote_prefixes() {
        let message = b"From: a@example.com\nSubject: Re: hi\n\nThanks!\n> > original line\n>another";
        let parsed = MimeParser::parse(message);
        assert_eq!(parsed.body_text, "Thanks!\noriginal line\nanother");
    }

    #[test]
    fn test_parse_empty_message() {
        let parsed = MimeParser::parse(b"");
        assert_eq!(parsed.sender, "");
        assert_eq!(parsed.subject, "");
        assert_eq!(parsed.body_text, "");
        assert!(parsed.urls.is_empty());
        assert_eq!(parsed.degradations, vec![ParseDegradation::EmptyMessage]);
    }

    #[test]
    fn test_parse_garbage_bytes() {
        let garbage: Vec<u8> = (0u8..=255).cycle().take(2048).collect();
        let parsed = MimeParser::parse(&garbage);
        assert!(parsed.is_degraded());
    }

    #[test]
    fn test_parse_headerless_text() {
        let parsed = MimeParser::parse(b"Dear user,\n\nplease verify your account");
        assert_eq!(parsed.body_text, "Dear user,\n\nplease verify your account");
        assert!(parsed
            .degradations
            .contains(&ParseDegradation::MissingHeaderSeparator));
        assert!(parsed.degradations.contains(&ParseDegradation::MissingSender));
    }
}
