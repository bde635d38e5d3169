//! TF-IDF vectorizer state
//!
//! Fitted once on the training split and reused unchanged at inference.
//! Besides the vocabulary it carries the learned suspicious-word lexicon
//! consumed by the structural features.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

use crate::config::VectorizerConfig;
use crate::error::{PhishError, Result};
use crate::features::tokenize::{raw_tokens, words, TermTokenizer};
use crate::features::STRUCTURAL_FEATURES;
use crate::mime::ParsedEmail;
use crate::model::Label;

/// Shortest word admitted into the suspicious-word lexicon
const MIN_SUSPICIOUS_WORD_LEN: usize = 4;

/// On-disk form; the term index is rebuilt on load
#[derive(Serialize, Deserialize)]
struct StoredVectorizer {
    terms: Vec<String>,
    idf: Vec<f64>,
    document_count: usize,
    suspicious_words: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "StoredVectorizer", into = "StoredVectorizer")]
pub struct VectorizerState {
    terms: Vec<String>,
    idf: Vec<f64>,
    document_count: usize,
    suspicious_words: Vec<String>,
    index: HashMap<String, usize>,
}

impl VectorizerState {
    /// Learn vocabulary, IDF weights and the suspicious-word lexicon
    pub fn fit(corpus: &[ParsedEmail], labels: &[Label], config: &VectorizerConfig) -> Result<Self> {
        if corpus.is_empty() {
            return Err(PhishError::Training(
                "cannot fit vectorizer on an empty corpus".to_string(),
            ));
        }
        if corpus.len() != labels.len() {
            return Err(PhishError::Training(format!(
                "{} documents but {} labels",
                corpus.len(),
                labels.len()
            )));
        }

        let tokenizer = TermTokenizer::new();
        let mut document_frequency: BTreeMap<String, usize> = BTreeMap::new();
        for email in corpus {
            let unique: BTreeSet<String> = tokenizer.terms(&email.document_text()).into_iter().collect();
            for term in unique {
                *document_frequency.entry(term).or_insert(0) += 1;
            }
        }

        let mut candidates: Vec<(String, usize)> = document_frequency
            .into_iter()
            .filter(|(_, df)| *df >= config.min_df)
            .collect();
        // Highest document frequency first, ties lexicographic
        candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        candidates.truncate(config.max_features);
        candidates.sort_by(|a, b| a.0.cmp(&b.0));

        let document_count = corpus.len();
        let idf = candidates
            .iter()
            .map(|(_, df)| smoothed_idf(document_count, *df))
            .collect();
        let terms: Vec<String> = candidates.into_iter().map(|(term, _)| term).collect();

        let suspicious_words = learn_suspicious_words(corpus, labels, config.suspicious_words_top_n);

        debug!(
            "Fitted vectorizer: {} terms, {} suspicious words from {} documents",
            terms.len(),
            suspicious_words.len(),
            document_count
        );

        Ok(Self::from_parts(terms, idf, document_count, suspicious_words))
    }

    fn from_parts(
        terms: Vec<String>,
        idf: Vec<f64>,
        document_count: usize,
        suspicious_words: Vec<String>,
    ) -> Self {
        let index = terms
            .iter()
            .enumerate()
            .map(|(i, term)| (term.clone(), i))
            .collect();
        Self {
            terms,
            idf,
            document_count,
            suspicious_words,
            index,
        }
    }

    /// L2-normalized TF-IDF block for an email; all zeros when nothing is in vocabulary
    pub fn transform(&self, email: &ParsedEmail) -> Vec<f64> {
        let mut values = vec![0.0; self.terms.len()];
        let tokenizer = TermTokenizer::new();
        for term in tokenizer.terms(&email.document_text()) {
            if let Some(&i) = self.index.get(&term) {
                values[i] += 1.0;
            }
        }

        for (value, idf) in values.iter_mut().zip(&self.idf) {
            *value *= idf;
        }

        let norm = values.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for value in values.iter_mut() {
                *value /= norm;
            }
        }
        values
    }

    /// Length of every feature vector built from this state
    pub fn dimension(&self) -> usize {
        self.terms.len() + STRUCTURAL_FEATURES.len()
    }

    pub fn vocabulary_len(&self) -> usize {
        self.terms.len()
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn idf(&self) -> &[f64] {
        &self.idf
    }

    pub fn document_count(&self) -> usize {
        self.document_count
    }

    /// Learned lexicon, sorted
    pub fn suspicious_words(&self) -> &[String] {
        &self.suspicious_words
    }

    pub fn term_index(&self, term: &str) -> Option<usize> {
        self.index.get(term).copied()
    }

    /// Human-readable name of a feature vector position
    pub fn feature_name(&self, index: usize) -> String {
        match self.terms.get(index) {
            Some(term) => format!("token:{}", term),
            None => STRUCTURAL_FEATURES
                .get(index - self.terms.len())
                .map(|name| name.to_string())
                .unwrap_or_else(|| format!("feature:{}", index)),
        }
    }
}

impl TryFrom<StoredVectorizer> for VectorizerState {
    type Error = String;

    fn try_from(stored: StoredVectorizer) -> std::result::Result<Self, Self::Error> {
        if stored.terms.len() != stored.idf.len() {
            return Err(format!(
                "{} terms but {} idf weights",
                stored.terms.len(),
                stored.idf.len()
            ));
        }
        if stored.terms.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err("vocabulary is not strictly sorted".to_string());
        }
        if stored.idf.iter().any(|w| !w.is_finite() || *w <= 0.0) {
            return Err("idf weights must be finite and positive".to_string());
        }
        if stored.suspicious_words.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err("suspicious words are not sorted".to_string());
        }

        Ok(Self::from_parts(
            stored.terms,
            stored.idf,
            stored.document_count,
            stored.suspicious_words,
        ))
    }
}

impl From<VectorizerState> for StoredVectorizer {
    fn from(state: VectorizerState) -> Self {
        StoredVectorizer {
            terms: state.terms,
            idf: state.idf,
            document_count: state.document_count,
            suspicious_words: state.suspicious_words,
        }
    }
}

fn smoothed_idf(document_count: usize, document_frequency: usize) -> f64 {
    ((1.0 + document_count as f64) / (1.0 + document_frequency as f64)).ln() + 1.0
}

/// Frequent phishing words that are not also frequent legitimate words
fn learn_suspicious_words(corpus: &[ParsedEmail], labels: &[Label], top_n: usize) -> Vec<String> {
    let mut phishing_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut legitimate_counts: BTreeMap<String, usize> = BTreeMap::new();

    for (email, label) in corpus.iter().zip(labels) {
        let counts = match label {
            Label::Phishing => &mut phishing_counts,
            Label::Legitimate => &mut legitimate_counts,
        };
        let text = email.document_text();
        let tokens = raw_tokens(&text);
        for word in words(&tokens) {
            if word.chars().all(char::is_alphabetic) {
                *counts.entry(word.to_lowercase()).or_insert(0) += 1;
            }
        }
    }

    let legitimate_top: BTreeSet<String> = top_n_words(legitimate_counts, top_n).into_iter().collect();
    let mut suspicious: Vec<String> = top_n_words(phishing_counts, top_n)
        .into_iter()
        .filter(|word| !legitimate_top.contains(word))
        .filter(|word| word.chars().count() >= MIN_SUSPICIOUS_WORD_LEN)
        .collect();
    suspicious.sort();
    suspicious
}

fn top_n_words(counts: BTreeMap<String, usize>, n: usize) -> Vec<String> {
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(n).map(|(word, _)| word).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mime::MimeParser;

    fn corpus() -> (Vec<ParsedEmail>, Vec<Label>) {
        let emails = vec![
            MimeParser::parse(b"Subject: meeting\n\nThe meeting agenda is attached for review"),
            MimeParser::parse(b"Subject: lunch\n\nLunch meeting moved to Friday"),
            MimeParser::parse(b"Subject: verify account\n\nVerify your account password immediately"),
            MimeParser::parse(b"Subject: account locked\n\nYour account is locked, verify password"),
        ];
        let labels = vec![
            Label::Legitimate,
            Label::Legitimate,
            Label::Phishing,
            Label::Phishing,
        ];
        (emails, labels)
    }

    #[test]
    fn test_fit_vocabulary_sorted_and_deterministic() {
        let (emails, labels) = corpus();
        let config = VectorizerConfig::default();
        let first = VectorizerState::fit(&emails, &labels, &config).unwrap();
        let second = VectorizerState::fit(&emails, &labels, &config).unwrap();

        assert_eq!(first.terms(), second.terms());
        assert_eq!(first.idf(), second.idf());
        let mut sorted = first.terms().to_vec();
        sorted.sort();
        assert_eq!(sorted, first.terms());
        assert!(first.term_index("meet").is_some());
        assert!(first.term_index("the").is_none());
    }

    #[test]
    fn test_fit_max_features_keeps_most_frequent() {
        let (emails, labels) = corpus();
        let config = VectorizerConfig {
            max_features: 2,
            ..Default::default()
        };
        let state = VectorizerState::fit(&emails, &labels, &config).unwrap();
        // account, meet, password and verifi all appear in two documents;
        // ties are broken lexicographically
        assert_eq!(
            state.terms().to_vec(),
            vec!["account".to_string(), "meet".to_string()]
        );
    }

    #[test]
    fn test_fit_min_df() {
        let (emails, labels) = corpus();
        let config = VectorizerConfig {
            min_df: 2,
            ..Default::default()
        };
        let state = VectorizerState::fit(&emails, &labels, &config).unwrap();
        assert!(state.term_index("agenda").is_none());
        assert!(state.term_index("account").is_some());
    }

    #[test]
    fn test_fit_rejects_bad_input() {
        let config = VectorizerConfig::default();
        assert!(matches!(
            VectorizerState::fit(&[], &[], &config),
            Err(PhishError::Training(_))
        ));

        let (emails, _) = corpus();
        assert!(matches!(
            VectorizerState::fit(&emails, &[Label::Phishing], &config),
            Err(PhishError::Training(_))
        ));
    }

    #[test]
    fn test_transform_normalized() {
        let (emails, labels) = corpus();
        let state = VectorizerState::fit(&emails, &labels, &VectorizerConfig::default()).unwrap();

        let values = state.transform(&emails[2]);
        let norm: f64 = values.iter().map(|v| v * v).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-9);

        let unknown = MimeParser::parse(b"Subject: zzz\n\nqqq xyzzy");
        assert!(state.transform(&unknown).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_suspicious_words() {
        let (emails, labels) = corpus();
        let state = VectorizerState::fit(&emails, &labels, &VectorizerConfig::default()).unwrap();
        let words = state.suspicious_words();

        assert!(words.contains(&"password".to_string()));
        assert!(words.contains(&"verify".to_string()));
        assert!(words.contains(&"account".to_string()));
        // Short and legitimate-frequent words are excluded
        assert!(!words.contains(&"is".to_string()));
        assert!(words.iter().all(|w| w.len() >= 4));
    }

    #[test]
    fn test_serde_roundtrip_rebuilds_index() {
        let (emails, labels) = corpus();
        let state = VectorizerState::fit(&emails, &labels, &VectorizerConfig::default()).unwrap();

        let json = serde_json::to_string(&state).unwrap();
        let restored: VectorizerState = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.terms(), state.terms());
        assert_eq!(restored.transform(&emails[0]), state.transform(&emails[0]));
    }

    #[test]
    fn test_deserialize_rejects_inconsistent_state() {
        let json = r#"{"terms":["b","a"],"idf":[1.0,1.0],"document_count":2,"suspicious_words":[]}"#;
        assert!(serde_json::from_str::<VectorizerState>(json).is_err());

        let json = r#"{"terms":["a"],"idf":[],"document_count":2,"suspicious_words":[]}"#;
        assert!(serde_json::from_str::<VectorizerState>(json).is_err());
    }

    #[test]
    fn test_feature_name() {
        let (emails, labels) = corpus();
        let state = VectorizerState::fit(&emails, &labels, &VectorizerConfig::default()).unwrap();
        let account = state.term_index("account").unwrap();

        assert_eq!(state.feature_name(account), "token:account");
        assert_eq!(state.feature_name(state.vocabulary_len()), "url_count");
        assert_eq!(
            state.feature_name(state.dimension() - 1),
            "attachment_count"
        );
    }
}
