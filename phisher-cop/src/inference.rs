//! Online classification against the currently installed model
//!
//! The service holds an `Arc` snapshot of a [`PersistedModel`] behind a
//! `parking_lot::RwLock`. Predictions clone the snapshot and release the lock
//! before doing any work, so a reload never blocks on or interleaves with a
//! prediction in flight.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::artifact::{ArtifactMetadata, PersistedModel};
use crate::config::InferenceConfig;
use crate::error::{PhishError, Result};
use crate::features::FeatureExtractor;
use crate::mime::{MimeParser, ParsedEmail, RawEmail};
use crate::model::{Label, ModelType};
use crate::training::corpus::Corpus;
use crate::training::harness;
use crate::training::metrics::MetricSummary;

/// A named feature and its contribution towards the phishing class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub feature: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub label: Label,
    /// Probability of the predicted label
    pub confidence: f64,
    pub phishing_probability: f64,
    /// Strongest contributions by absolute weight, descending
    pub contributing_signals: Vec<Signal>,
    pub model_type: ModelType,
}

pub struct InferenceService {
    config: InferenceConfig,
    current: RwLock<Option<Arc<PersistedModel>>>,
}

impl InferenceService {
    pub fn new(config: InferenceConfig) -> Self {
        Self {
            config,
            current: RwLock::new(None),
        }
    }

    /// Load and validate an artifact, then make it the active model.
    ///
    /// On error the previously active model keeps serving.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<ArtifactMetadata> {
        let path = path.as_ref();
        let persisted = PersistedModel::load(path).map_err(|e| {
            warn!("Rejected artifact {}: {}", path.display(), e);
            e
        })?;
        let metadata = persisted.metadata.clone();
        self.install(persisted)?;
        Ok(metadata)
    }

    /// Swap in an already built model
    pub fn install(&self, persisted: PersistedModel) -> Result<()> {
        persisted.validate()?;
        info!(
            "Installing {} model trained {}",
            persisted.metadata.model_type, persisted.metadata.trained_at
        );
        *self.current.write() = Some(Arc::new(persisted));
        Ok(())
    }

    fn snapshot(&self) -> Result<Arc<PersistedModel>> {
        self.current.read().clone().ok_or(PhishError::ModelNotLoaded)
    }

    pub fn is_loaded(&self) -> bool {
        self.current.read().is_some()
    }

    pub fn metadata(&self) -> Option<ArtifactMetadata> {
        self.current
            .read()
            .as_ref()
            .map(|persisted| persisted.metadata.clone())
    }

    pub fn predict(&self, raw: &RawEmail) -> Result<Verdict> {
        let email = MimeParser::parse(raw.as_bytes());
        self.predict_parsed(&email)
    }

    pub fn predict_parsed(&self, email: &ParsedEmail) -> Result<Verdict> {
        let snapshot = self.snapshot()?;
        let features = FeatureExtractor::new(&snapshot.vectorizer).extract(email);

        let phishing_probability = snapshot.model.predict_proba(&features)?;
        let label = Label::from_probability(phishing_probability, self.config.phishing_threshold);
        let confidence = match label {
            Label::Phishing => phishing_probability,
            Label::Legitimate => 1.0 - phishing_probability,
        };

        let contributions = snapshot.model.explain(&features)?;
        let contributing_signals = top_signals(contributions, self.config.top_signals)
            .into_iter()
            .map(|(index, weight)| Signal {
                feature: snapshot.vectorizer.feature_name(index),
                weight,
            })
            .collect();

        debug!(
            "Classified as {} (p={:.4}, degraded={})",
            label,
            phishing_probability,
            email.is_degraded()
        );

        Ok(Verdict {
            label,
            confidence,
            phishing_probability,
            contributing_signals,
            model_type: snapshot.metadata.model_type,
        })
    }

    /// Score a labeled holdout corpus with the active model
    pub fn evaluate(&self, corpus: &Corpus) -> Result<MetricSummary> {
        let snapshot = self.snapshot()?;
        let emails = corpus.parse_all();
        let features = FeatureExtractor::new(&snapshot.vectorizer).extract_all(&emails);
        harness::evaluate(
            &snapshot.model,
            &features,
            &corpus.labels(),
            self.config.phishing_threshold,
        )
    }
}

/// Keep the `k` largest contributions by magnitude; equal magnitudes keep index order
fn top_signals(mut contributions: Vec<(usize, f64)>, k: usize) -> Vec<(usize, f64)> {
    contributions.retain(|(_, weight)| *weight != 0.0 && weight.is_finite());
    contributions.sort_by(|a, b| {
        b.1.abs()
            .partial_cmp(&a.1.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    contributions.truncate(k);
    contributions
}
