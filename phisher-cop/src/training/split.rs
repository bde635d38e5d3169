//! Reproducible stratified train/validation split

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::corpus::Document;
use crate::error::{PhishError, Result};
use crate::model::Label;

/// Document indices on each side of the split, ascending
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

/// Hold out `round(n * ratio)` documents of each label for validation.
///
/// Every label with at least two documents keeps one on each side. Documents
/// are ordered by id before shuffling, so the outcome depends only on the
/// ids, the ratio and the seed.
pub fn stratified_split(documents: &[Document], validation_ratio: f64, seed: u64) -> Result<Split> {
    if !(validation_ratio > 0.0 && validation_ratio < 1.0) {
        return Err(PhishError::Training(format!(
            "validation ratio must be in (0, 1), got {}",
            validation_ratio
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut validation = Vec::new();

    for label in [Label::Legitimate, Label::Phishing] {
        let mut indices: Vec<usize> = (0..documents.len())
            .filter(|&i| documents[i].label == label)
            .collect();
        indices.sort_by(|&a, &b| documents[a].id.cmp(&documents[b].id));
        indices.shuffle(&mut rng);

        let n = indices.len();
        let mut held_out = (n as f64 * validation_ratio).round() as usize;
        if n >= 2 {
            held_out = held_out.clamp(1, n - 1);
        } else {
            held_out = 0;
        }

        validation.extend_from_slice(&indices[..held_out]);
        train.extend_from_slice(&indices[held_out..]);
    }

    train.sort_unstable();
    validation.sort_unstable();
    Ok(Split { train, validation })
}
