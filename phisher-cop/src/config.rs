use crate::error::{PhishError, Result};
use crate::model::ModelType;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub training: TrainingConfig,
    pub vectorizer: VectorizerConfig,
    pub model: ModelConfig,
    pub inference: InferenceConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub seed: u64,
    /// Fraction of each class held out for validation
    pub validation_ratio: f64,
    pub model_type: ModelType,
    pub output_dir: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VectorizerConfig {
    pub max_features: usize,
    pub min_df: usize,
    /// Top-N words per class considered when learning the suspicious word list
    pub suspicious_words_top_n: usize,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelConfig {
    pub logistic: LogisticConfig,
    pub forest: ForestConfig,
    pub bayes: BayesConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogisticConfig {
    pub learning_rate: f64,
    pub epochs: usize,
    pub l2: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BayesConfig {
    pub alpha: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub phishing_threshold: f64,
    /// Number of contributing signals attached to each verdict
    pub top_signals: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            seed: 69420,
            validation_ratio: 0.2,
            model_type: ModelType::LogisticRegression,
            output_dir: "models".to_string(),
        }
    }
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self {
            max_features: 5000,
            min_df: 1,
            suspicious_words_top_n: 80,
        }
    }
}

impl Default for LogisticConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.5,
            epochs: 300,
            l2: 0.001,
        }
    }
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 60,
            max_depth: 12,
            min_samples_split: 2,
        }
    }
}

impl Default for BayesConfig {
    fn default() -> Self {
        Self { alpha: 1.0 }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            phishing_threshold: 0.5,
            top_signals: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| PhishError::Config(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| PhishError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject hyper-parameters that would make training meaningless
    pub fn validate(&self) -> Result<()> {
        let ratio = self.training.validation_ratio;
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(PhishError::Config(format!(
                "validation_ratio must be in (0, 1), got {}",
                ratio
            )));
        }
        if self.vectorizer.max_features == 0 {
            return Err(PhishError::Config("max_features must be positive".to_string()));
        }
        if self.model.logistic.learning_rate <= 0.0 || self.model.logistic.epochs == 0 {
            return Err(PhishError::Config(
                "logistic learning_rate and epochs must be positive".to_string(),
            ));
        }
        if self.model.forest.n_trees == 0 || self.model.forest.max_depth == 0 {
            return Err(PhishError::Config(
                "forest n_trees and max_depth must be positive".to_string(),
            ));
        }
        if self.model.bayes.alpha <= 0.0 {
            return Err(PhishError::Config("bayes alpha must be positive".to_string()));
        }
        let threshold = self.inference.phishing_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(PhishError::Config(format!(
                "phishing_threshold must be in [0, 1], got {}",
                threshold
            )));
        }
        Ok(())
    }
}
