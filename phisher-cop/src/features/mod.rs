//! Feature extraction
//!
//! A [`FeatureVector`] is the TF-IDF block produced by a fitted
//! [`VectorizerState`] followed by the structural heuristics named in
//! [`STRUCTURAL_FEATURES`].

pub mod bktree;
pub mod heuristics;
pub mod lexicon;
pub mod tokenize;

use std::ops::Deref;

use crate::mime::ParsedEmail;
use crate::vectorizer::VectorizerState;

/// Names of the structural features, in vector order
pub const STRUCTURAL_FEATURES: &[&str] = &[
    "url_count",
    "ip_url_count",
    "sender_url_domain_mismatch",
    "display_name_mismatch",
    "reply_to_mismatch",
    "missing_header_count",
    "urgency_keyword_count",
    "credential_keyword_count",
    "suspicious_word_score",
    "typosquatted_domain_count",
    "whitelisted_address_count",
    "capital_words_ratio",
    "money_tokens_ratio",
    "html_to_text_ratio",
    "attachment_count",
];

/// Fixed-length numeric representation of one email
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn new(values: Vec<f64>) -> Self {
        FeatureVector(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(values: Vec<f64>) -> Self {
        FeatureVector(values)
    }
}

impl Deref for FeatureVector {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.0
    }
}

/// Turns parsed emails into feature vectors against a fitted vectorizer
pub struct FeatureExtractor<'a> {
    vectorizer: &'a VectorizerState,
}

impl<'a> FeatureExtractor<'a> {
    pub fn new(vectorizer: &'a VectorizerState) -> Self {
        Self { vectorizer }
    }

    /// Extract the full feature vector. Deterministic; never mutates the vectorizer.
    pub fn extract(&self, email: &ParsedEmail) -> FeatureVector {
        let mut values = self.vectorizer.transform(email);
        values.extend(heuristics::structural_features(
            email,
            self.vectorizer.suspicious_words(),
        ));
        FeatureVector(values)
    }

    pub fn extract_all(&self, emails: &[ParsedEmail]) -> Vec<FeatureVector> {
        emails.iter().map(|email| self.extract(email)).collect()
    }

    pub fn dimension(&self) -> usize {
        self.vectorizer.dimension()
    }
}
