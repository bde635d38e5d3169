//! MIME message parsing
//!
//! Turns raw message bytes into a [`ParsedEmail`]: decoded headers, body
//! text with HTML stripped, extracted URLs and attachment counts. The MIME
//! tree itself is read by `mail_parser`.

pub mod parser;
pub mod types;

pub use parser::MimeParser;
pub use types::{ParseDegradation, ParsedEmail, RawEmail};
