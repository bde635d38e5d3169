//! Persisted models
//!
//! An artifact is one self-describing JSON file holding the fitted vectorizer,
//! the fitted model and metadata about the run that produced it. Files are
//! named `<model_type>-<YYYYMMDDTHHMMSSZ>[-N].json` and are never overwritten.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{PhishError, Result};
use crate::model::{Model, ModelType};
use crate::training::metrics::MetricSummary;
use crate::vectorizer::VectorizerState;

pub const FORMAT_VERSION: u32 = 1;

/// Upper bound on `-N` suffixes tried for one timestamp
const MAX_NAME_ATTEMPTS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub model_type: ModelType,
    pub trained_at: DateTime<Utc>,
    /// SHA-256 of the training corpus
    pub corpus_checksum: String,
    /// Validation metrics of the persisted model
    pub metrics: MetricSummary,
    pub seed: u64,
    pub dimension: usize,
    pub training_examples: usize,
    pub validation_examples: usize,
}

#[derive(Serialize, Deserialize)]
struct StoredArtifact {
    format_version: u32,
    metadata: ArtifactMetadata,
    vectorizer: VectorizerState,
    model: serde_json::Value,
}

/// Header of an artifact, read without rebuilding the model
#[derive(Deserialize)]
struct StoredHeader {
    format_version: u32,
    metadata: ArtifactMetadata,
}

/// A fitted (vectorizer, model) pair with its metadata
#[derive(Debug, Clone)]
pub struct PersistedModel {
    pub metadata: ArtifactMetadata,
    pub vectorizer: VectorizerState,
    pub model: Model,
}

impl PersistedModel {
    pub fn new(metadata: ArtifactMetadata, vectorizer: VectorizerState, model: Model) -> Result<Self> {
        let persisted = Self {
            metadata,
            vectorizer,
            model,
        };
        persisted.validate()?;
        Ok(persisted)
    }

    /// Check that metadata, vectorizer and model agree with each other
    pub fn validate(&self) -> Result<()> {
        if self.model.model_type() != self.metadata.model_type {
            return Err(PhishError::ArtifactCorrupt(format!(
                "metadata says {} but model is {}",
                self.metadata.model_type,
                self.model.model_type()
            )));
        }

        let model_dimension = self.model.dimension().ok_or(PhishError::ModelNotLoaded)?;
        let vectorizer_dimension = self.vectorizer.dimension();
        if model_dimension != vectorizer_dimension || self.metadata.dimension != vectorizer_dimension {
            return Err(PhishError::ArtifactCorrupt(format!(
                "dimensions disagree: vectorizer {}, model {}, metadata {}",
                vectorizer_dimension, model_dimension, self.metadata.dimension
            )));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        let model: serde_json::Value = serde_json::from_slice(&self.model.serialize()?)?;
        let stored = StoredArtifact {
            format_version: FORMAT_VERSION,
            metadata: self.metadata.clone(),
            vectorizer: self.vectorizer.clone(),
            model,
        };
        Ok(serde_json::to_vec_pretty(&stored)?)
    }

    /// Parse and fully validate an artifact
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let stored: StoredArtifact = serde_json::from_slice(bytes)
            .map_err(|e| PhishError::ArtifactCorrupt(e.to_string()))?;
        if stored.format_version != FORMAT_VERSION {
            return Err(PhishError::ArtifactCorrupt(format!(
                "unsupported format version {}",
                stored.format_version
            )));
        }

        let model_bytes = serde_json::to_vec(&stored.model)?;
        let model = Model::deserialize(stored.metadata.model_type, &model_bytes)?;
        Self::new(stored.metadata, stored.vectorizer, model)
    }

    /// Write to an exact path; fails with `ArtifactExists` rather than overwrite
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let bytes = self.to_json()?;
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(PhishError::ArtifactExists(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(&bytes)?;
        file.sync_all()?;
        Ok(())
    }

    /// Write into `dir` under a fresh versioned name and return the path
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let stem = format!(
            "{}-{}",
            self.metadata.model_type,
            self.metadata.trained_at.format("%Y%m%dT%H%M%SZ")
        );

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = if attempt == 0 {
                format!("{}.json", stem)
            } else {
                format!("{}-{}.json", stem, attempt)
            };
            let path = dir.join(name);
            match self.save_to(&path) {
                Ok(()) => {
                    info!("Saved {} artifact to {}", self.metadata.model_type, path.display());
                    return Ok(path);
                }
                Err(PhishError::ArtifactExists(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(PhishError::ArtifactExists(dir.join(format!("{}.json", stem))))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let persisted = Self::from_json(&bytes)?;
        info!(
            "Loaded {} artifact from {} (trained {})",
            persisted.metadata.model_type,
            path.display(),
            persisted.metadata.trained_at
        );
        Ok(persisted)
    }
}

/// Most recently trained artifact in `dir`
pub fn latest_in<P: AsRef<Path>>(dir: P) -> Result<PathBuf> {
    let dir = dir.as_ref();
    let mut newest: Option<(DateTime<Utc>, PathBuf)> = None;

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if !is_json || !path.is_file() {
            continue;
        }

        let header = fs::read(&path)
            .map_err(PhishError::from)
            .and_then(|bytes| {
                serde_json::from_slice::<StoredHeader>(&bytes)
                    .map_err(|e| PhishError::ArtifactCorrupt(e.to_string()))
            });
        let header = match header {
            Ok(header) if header.format_version == FORMAT_VERSION => header,
            Ok(header) => {
                warn!("Skipping {}: format version {}", path.display(), header.format_version);
                continue;
            }
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };

        let candidate = (header.metadata.trained_at, path);
        let newer = match &newest {
            Some(current) => candidate > *current,
            None => true,
        };
        if newer {
            newest = Some(candidate);
        }
    }

    newest
        .map(|(_, path)| path)
        .ok_or_else(|| PhishError::InvalidInput(format!("no artifacts found in {}", dir.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelConfig, VectorizerConfig};
    use crate::features::FeatureExtractor;
    use crate::mime::MimeParser;
    use crate::model::Label;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn persisted(trained_at: DateTime<Utc>) -> PersistedModel {
        let emails = vec![
            MimeParser::parse(b"From: a@example.com\nSubject: lunch\n\nLunch with the team"),
            MimeParser::parse(b"From: b@example.com\nSubject: notes\n\nMeeting notes attached"),
            MimeParser::parse(b"From: x@evil.net\nSubject: urgent\n\nVerify your password now"),
            MimeParser::parse(b"From: y@evil.net\nSubject: alert\n\nAccount suspended, login here"),
        ];
        let labels = vec![Label::Legitimate, Label::Legitimate, Label::Phishing, Label::Phishing];
        let vectorizer = VectorizerState::fit(&emails, &labels, &VectorizerConfig::default()).unwrap();
        let x = FeatureExtractor::new(&vectorizer).extract_all(&emails);
        let mut model = Model::new(ModelType::LogisticRegression, &ModelConfig::default(), 1);
        model.fit(&x, &labels).unwrap();

        let metadata = ArtifactMetadata {
            model_type: ModelType::LogisticRegression,
            trained_at,
            corpus_checksum: "ab".repeat(32),
            metrics: MetricSummary::from_predictions(&labels, &labels),
            seed: 1,
            dimension: vectorizer.dimension(),
            training_examples: 4,
            validation_examples: 0,
        };
        PersistedModel::new(metadata, vectorizer, model).unwrap()
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let original = persisted(at(10));
        let path = original.save(dir.path()).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "logistic_regression-20240501T100000Z.json"
        );

        let loaded = PersistedModel::load(&path).unwrap();
        assert_eq!(loaded.metadata, original.metadata);
        assert_eq!(loaded.vectorizer.terms(), original.vectorizer.terms());

        let email = MimeParser::parse(b"Subject: urgent\n\nverify your password");
        let features = FeatureExtractor::new(&original.vectorizer).extract(&email);
        assert_eq!(
            loaded.model.predict_proba(&features).unwrap(),
            original.model.predict_proba(&features).unwrap()
        );
    }

    #[test]
    fn test_save_never_overwrites() {
        let dir = TempDir::new().unwrap();
        let model = persisted(at(10));
        let first = model.save(dir.path()).unwrap();
        let second = model.save(dir.path()).unwrap();

        assert_ne!(first, second);
        assert!(second.to_string_lossy().ends_with("-1.json"));
        assert!(matches!(model.save_to(&first), Err(PhishError::ArtifactExists(_))));
    }

    #[test]
    fn test_corrupt_artifacts() {
        assert!(matches!(
            PersistedModel::from_json(b"{not json"),
            Err(PhishError::ArtifactCorrupt(_))
        ));

        let model = persisted(at(10));
        let mut value: serde_json::Value = serde_json::from_slice(&model.to_json().unwrap()).unwrap();
        value["format_version"] = serde_json::json!(99);
        assert!(matches!(
            PersistedModel::from_json(&serde_json::to_vec(&value).unwrap()),
            Err(PhishError::ArtifactCorrupt(_))
        ));

        let mut value: serde_json::Value = serde_json::from_slice(&model.to_json().unwrap()).unwrap();
        value["metadata"]["model_type"] = serde_json::json!("random_forest");
        assert!(matches!(
            PersistedModel::from_json(&serde_json::to_vec(&value).unwrap()),
            Err(PhishError::ArtifactCorrupt(_))
        ));

        let mut value: serde_json::Value = serde_json::from_slice(&model.to_json().unwrap()).unwrap();
        value["metadata"]["dimension"] = serde_json::json!(3);
        assert!(matches!(
            PersistedModel::from_json(&serde_json::to_vec(&value).unwrap()),
            Err(PhishError::ArtifactCorrupt(_))
        ));
    }

    #[test]
    fn test_latest_in() {
        let dir = TempDir::new().unwrap();
        persisted(at(9)).save(dir.path()).unwrap();
        let newest = persisted(at(11)).save(dir.path()).unwrap();
        persisted(at(10)).save(dir.path()).unwrap();
        fs::write(dir.path().join("garbage.json"), "nope").unwrap();

        assert_eq!(latest_in(dir.path()).unwrap(), newest);

        let empty = TempDir::new().unwrap();
        assert!(latest_in(empty.path()).is_err());
    }
}
