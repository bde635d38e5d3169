//! Text splitting shared by the vectorizer and the structural features

use rust_stemmers::{Algorithm, Stemmer};

use super::lexicon::is_stop_word;
use crate::domain::normalize_url;

const MIN_TERM_LEN: usize = 3;
const MAX_TERM_LEN: usize = 25;

/// Whitespace tokens that are not URLs, in order
pub fn raw_tokens(text: &str) -> Vec<&str> {
    text.split_whitespace()
        .filter(|token| normalize_url(token).is_none())
        .collect()
}

/// Contiguous alphanumeric runs of the tokens, case preserved
pub fn words<'a>(tokens: &[&'a str]) -> Vec<&'a str> {
    tokens
        .iter()
        .flat_map(|token| token.split(|c: char| !c.is_alphanumeric()))
        .filter(|word| !word.is_empty())
        .collect()
}

/// Lowercased words, for phrase matching
pub fn lowercase_words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

/// Stemmed vocabulary terms
pub struct TermTokenizer {
    stemmer: Stemmer,
}

impl TermTokenizer {
    pub fn new() -> Self {
        Self {
            stemmer: Stemmer::create(Algorithm::English),
        }
    }

    /// Tokenize text into stemmed terms, dropping stop words and URLs
    pub fn terms(&self, text: &str) -> Vec<String> {
        raw_tokens(text)
            .into_iter()
            .flat_map(|token| token.split(|c: char| !c.is_alphanumeric()))
            .map(str::to_lowercase)
            .filter(|s| {
                let len = s.chars().count();
                (MIN_TERM_LEN..=MAX_TERM_LEN).contains(&len) && !is_stop_word(s)
            })
            .map(|s| self.stemmer.stem(&s).to_string())
            .collect()
    }
}

impl Default for TermTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Count occurrences of any of `terms` (single words or phrases) in `words`
pub fn count_phrases(words: &[String], terms: &[&str]) -> usize {
    terms
        .iter()
        .map(|term| {
            let phrase: Vec<&str> = term.split_whitespace().collect();
            if phrase.is_empty() || phrase.len() > words.len() {
                return 0;
            }
            words
                .windows(phrase.len())
                .filter(|window| window.iter().zip(&phrase).all(|(w, p)| w == p))
                .count()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_tokens_skip_urls() {
        let tokens = raw_tokens("Click http://10.0.0.1/login now, www.example.com!");
        assert_eq!(tokens, vec!["Click", "now,"]);
    }

    #[test]
    fn test_words() {
        let tokens = vec!["Hello,", "URGENT!!", "e-mail", "$100"];
        assert_eq!(words(&tokens), vec!["Hello", "URGENT", "e", "mail", "100"]);
    }

    #[test]
    fn test_terms_stem_and_filter() {
        let tokenizer = TermTokenizer::new();
        let terms = tokenizer.terms("Verify your accounts by running the update at https://x.com/a");
        assert_eq!(terms, vec!["verifi", "account", "run", "updat"]);
    }

    #[test]
    fn test_terms_length_bounds() {
        let tokenizer = TermTokenizer::new();
        let long = "a".repeat(26);
        assert!(tokenizer.terms(&format!("ok {}", long)).is_empty());
    }

    #[test]
    fn test_count_phrases() {
        let words = lowercase_words("URGENT: act now! Act now or your account is suspended.");
        assert_eq!(count_phrases(&words, &["act now"]), 2);
        assert_eq!(count_phrases(&words, &["urgent", "suspended", "expired"]), 2);
        assert_eq!(count_phrases(&[], &["urgent"]), 0);
    }
}
