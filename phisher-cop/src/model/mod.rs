//! Trainable classifiers
//!
//! Three model families share the [`Classifier`] contract and are wrapped in
//! the [`Model`] enum, selected by [`ModelType`]:
//!
//! - [`LogisticRegression`]: standardized features, gradient descent with L2
//! - [`RandomForest`]: bootstrap-aggregated CART trees with gini impurity
//! - [`NaiveBayes`]: multinomial naive Bayes with Laplace smoothing
//!
//! Fitted parameters serialize to a JSON blob that [`Model::deserialize`]
//! validates before use.

pub mod bayes;
pub mod forest;
pub mod logistic;

pub use bayes::NaiveBayes;
pub use forest::RandomForest;
pub use logistic::LogisticRegression;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::config::ModelConfig;
use crate::error::{PhishError, Result};
use crate::features::FeatureVector;

/// Default probability above which an email is called phishing
pub const DEFAULT_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Legitimate,
    Phishing,
}

impl Label {
    pub fn from_probability(phishing_probability: f64, threshold: f64) -> Self {
        if phishing_probability >= threshold {
            Label::Phishing
        } else {
            Label::Legitimate
        }
    }

    pub fn is_phishing(self) -> bool {
        self == Label::Phishing
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Label::Legitimate => "legitimate",
            Label::Phishing => "phishing",
        }
    }

    /// 1.0 for phishing, 0.0 for legitimate
    pub fn target(self) -> f64 {
        if self.is_phishing() {
            1.0
        } else {
            0.0
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = PhishError;

    /// Accepts the corpus directory names as well (`ham`, `spam`)
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "legitimate" | "ham" => Ok(Label::Legitimate),
            "phishing" | "spam" => Ok(Label::Phishing),
            other => Err(PhishError::Corpus(format!("Unknown label: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    LogisticRegression,
    RandomForest,
    NaiveBayes,
}

impl ModelType {
    pub const ALL: [ModelType; 3] = [
        ModelType::LogisticRegression,
        ModelType::RandomForest,
        ModelType::NaiveBayes,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ModelType::LogisticRegression => "logistic_regression",
            ModelType::RandomForest => "random_forest",
            ModelType::NaiveBayes => "naive_bayes",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = PhishError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "logistic_regression" | "logistic" => Ok(ModelType::LogisticRegression),
            "random_forest" | "forest" => Ok(ModelType::RandomForest),
            "naive_bayes" | "bayes" => Ok(ModelType::NaiveBayes),
            _ => Err(PhishError::UnknownModelType(s.to_string())),
        }
    }
}

/// Capabilities every model family provides
pub trait Classifier {
    fn fit(&mut self, x: &[FeatureVector], y: &[Label]) -> Result<()>;

    /// Probability that `x` is phishing
    fn predict_proba(&self, x: &[f64]) -> Result<f64>;

    /// Signed per-dimension contributions towards phishing, for the non-zero
    /// dimensions of `x`
    fn explain(&self, x: &[f64]) -> Result<Vec<(usize, f64)>>;

    /// Input dimension once fitted
    fn dimension(&self) -> Option<usize>;

    fn predict(&self, x: &[f64]) -> Result<Label> {
        Ok(Label::from_probability(self.predict_proba(x)?, DEFAULT_THRESHOLD))
    }

    fn is_fitted(&self) -> bool {
        self.dimension().is_some()
    }
}

/// A model of one of the supported families
#[derive(Debug, Clone)]
pub enum Model {
    LogisticRegression(LogisticRegression),
    RandomForest(RandomForest),
    NaiveBayes(NaiveBayes),
}

impl Model {
    /// Create an unfitted model
    pub fn new(model_type: ModelType, config: &ModelConfig, seed: u64) -> Self {
        match model_type {
            ModelType::LogisticRegression => {
                Model::LogisticRegression(LogisticRegression::new(config.logistic.clone()))
            }
            ModelType::RandomForest => {
                Model::RandomForest(RandomForest::new(config.forest.clone(), seed))
            }
            ModelType::NaiveBayes => Model::NaiveBayes(NaiveBayes::new(config.bayes.clone())),
        }
    }

    pub fn model_type(&self) -> ModelType {
        match self {
            Model::LogisticRegression(_) => ModelType::LogisticRegression,
            Model::RandomForest(_) => ModelType::RandomForest,
            Model::NaiveBayes(_) => ModelType::NaiveBayes,
        }
    }

    fn classifier(&self) -> &dyn Classifier {
        match self {
            Model::LogisticRegression(m) => m,
            Model::RandomForest(m) => m,
            Model::NaiveBayes(m) => m,
        }
    }

    fn classifier_mut(&mut self) -> &mut dyn Classifier {
        match self {
            Model::LogisticRegression(m) => m,
            Model::RandomForest(m) => m,
            Model::NaiveBayes(m) => m,
        }
    }

    pub fn fit(&mut self, x: &[FeatureVector], y: &[Label]) -> Result<()> {
        self.classifier_mut().fit(x, y)
    }

    pub fn predict(&self, x: &[f64]) -> Result<Label> {
        self.classifier().predict(x)
    }

    pub fn predict_proba(&self, x: &[f64]) -> Result<f64> {
        self.classifier().predict_proba(x)
    }

    pub fn explain(&self, x: &[f64]) -> Result<Vec<(usize, f64)>> {
        self.classifier().explain(x)
    }

    pub fn dimension(&self) -> Option<usize> {
        self.classifier().dimension()
    }

    pub fn is_fitted(&self) -> bool {
        self.classifier().is_fitted()
    }

    /// Serialize the fitted parameters as JSON
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let bytes = match self {
            Model::LogisticRegression(m) => serde_json::to_vec(m.params()?)?,
            Model::RandomForest(m) => serde_json::to_vec(m.params()?)?,
            Model::NaiveBayes(m) => serde_json::to_vec(m.params()?)?,
        };
        Ok(bytes)
    }

    /// Rebuild a fitted model from [`Model::serialize`] output
    pub fn deserialize(model_type: ModelType, bytes: &[u8]) -> Result<Self> {
        let corrupt = |e: serde_json::Error| {
            PhishError::ArtifactCorrupt(format!("invalid {} parameters: {}", model_type, e))
        };
        let model = match model_type {
            ModelType::LogisticRegression => Model::LogisticRegression(
                LogisticRegression::from_params(serde_json::from_slice(bytes).map_err(corrupt)?)?,
            ),
            ModelType::RandomForest => Model::RandomForest(RandomForest::from_params(
                serde_json::from_slice(bytes).map_err(corrupt)?,
            )?),
            ModelType::NaiveBayes => Model::NaiveBayes(NaiveBayes::from_params(
                serde_json::from_slice(bytes).map_err(corrupt)?,
            )?),
        };
        Ok(model)
    }
}

/// Check a training set and return its dimension
pub fn validate_training_set(x: &[FeatureVector], y: &[Label]) -> Result<usize> {
    if x.is_empty() {
        return Err(PhishError::Training("training set is empty".to_string()));
    }
    if x.len() != y.len() {
        return Err(PhishError::Training(format!(
            "{} feature vectors but {} labels",
            x.len(),
            y.len()
        )));
    }

    let dimension = x[0].len();
    if dimension == 0 {
        return Err(PhishError::Training("feature vectors are empty".to_string()));
    }
    if let Some(row) = x.iter().position(|v| v.len() != dimension) {
        return Err(PhishError::Training(format!(
            "feature vector {} has length {}, expected {}",
            row,
            x[row].len(),
            dimension
        )));
    }
    if x.iter().any(|v| v.iter().any(|value| !value.is_finite())) {
        return Err(PhishError::Training(
            "feature vectors contain non-finite values".to_string(),
        ));
    }

    let distinct: BTreeSet<Label> = y.iter().copied().collect();
    if distinct.len() < 2 {
        return Err(PhishError::Training(
            "training set needs examples of both labels".to_string(),
        ));
    }

    Ok(dimension)
}

/// Reject input of the wrong length
pub fn check_dimension(expected: usize, x: &[f64]) -> Result<()> {
    if x.len() != expected {
        return Err(PhishError::DimensionMismatch {
            expected,
            actual: x.len(),
        });
    }
    Ok(())
}

/// Numerically stable logistic function
pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Contributions for the non-zero dimensions of `x`
pub(crate) fn nonzero_contributions<F>(x: &[f64], contribution: F) -> Vec<(usize, f64)>
where
    F: Fn(usize, f64) -> f64,
{
    x.iter()
        .enumerate()
        .filter(|(_, value)| **value != 0.0)
        .map(|(i, value)| (i, contribution(i, *value)))
        .collect()
}


#[cfg(test)]
mod tests {
    use super::test_data::separable;
    use super::*;

    #[test]
    fn test_model_type_parsing() {
        assert_eq!("random_forest".parse::<ModelType>().unwrap(), ModelType::RandomForest);
        assert_eq!("Naive-Bayes".parse::<ModelType>().unwrap(), ModelType::NaiveBayes);
        assert_eq!(ModelType::LogisticRegression.to_string(), "logistic_regression");
        assert!(matches!(
            "svm".parse::<ModelType>(),
            Err(PhishError::UnknownModelType(_))
        ));
    }

    #[test]
    fn test_label_parsing() {
        assert_eq!("ham".parse::<Label>().unwrap(), Label::Legitimate);
        assert_eq!("SPAM".parse::<Label>().unwrap(), Label::Phishing);
        assert_eq!(Label::from_probability(0.5, 0.5), Label::Phishing);
        assert_eq!(Label::from_probability(0.49, 0.5), Label::Legitimate);
        assert_eq!(serde_json::to_string(&Label::Phishing).unwrap(), "\"phishing\"");
    }

    #[test]
    fn test_validate_training_set() {
        let (x, y) = separable(3);
        assert_eq!(validate_training_set(&x, &y).unwrap(), 3);

        assert!(matches!(validate_training_set(&[], &[]), Err(PhishError::Training(_))));
        assert!(matches!(
            validate_training_set(&x, &y[..2]),
            Err(PhishError::Training(_))
        ));

        let single = vec![Label::Phishing; x.len()];
        assert!(matches!(
            validate_training_set(&x, &single),
            Err(PhishError::Training(_))
        ));

        let mut ragged = x.clone();
        ragged[1] = FeatureVector::new(vec![1.0]);
        assert!(matches!(
            validate_training_set(&ragged, &y),
            Err(PhishError::Training(_))
        ));

        let mut nan = x.clone();
        nan[0] = FeatureVector::new(vec![f64::NAN, 0.0, 0.0]);
        assert!(matches!(validate_training_set(&nan, &y), Err(PhishError::Training(_))));
    }

    #[test]
    fn test_every_family_fits_and_round_trips() {
        let (x, y) = separable(20);
        for model_type in ModelType::ALL {
            let mut model = Model::new(model_type, &ModelConfig::default(), 7);
            assert!(!model.is_fitted());
            assert!(matches!(model.predict(&x[0]), Err(PhishError::ModelNotLoaded)));
            assert!(matches!(model.serialize(), Err(PhishError::ModelNotLoaded)));

            model.fit(&x, &y).unwrap();
            assert_eq!(model.dimension(), Some(3));
            assert_eq!(model.predict(&x[0]).unwrap(), Label::Phishing, "{}", model_type);
            assert_eq!(model.predict(&x[1]).unwrap(), Label::Legitimate, "{}", model_type);

            let restored = Model::deserialize(model_type, &model.serialize().unwrap()).unwrap();
            assert_eq!(restored.model_type(), model_type);
            for row in &x {
                assert_eq!(
                    restored.predict_proba(row).unwrap(),
                    model.predict_proba(row).unwrap()
                );
            }

            assert!(matches!(
                model.predict(&[1.0]),
                Err(PhishError::DimensionMismatch { expected: 3, actual: 1 })
            ));
        }
    }

    #[test]
    fn test_deserialize_rejects_wrong_family_and_garbage() {
        let (x, y) = separable(10);
        let mut model = Model::new(ModelType::NaiveBayes, &ModelConfig::default(), 1);
        model.fit(&x, &y).unwrap();
        let bytes = model.serialize().unwrap();

        assert!(matches!(
            Model::deserialize(ModelType::RandomForest, &bytes),
            Err(PhishError::ArtifactCorrupt(_))
        ));
        assert!(matches!(
            Model::deserialize(ModelType::LogisticRegression, b"not json"),
            Err(PhishError::ArtifactCorrupt(_))
        ));
    }

    #[test]
    fn test_explain_covers_nonzero_dimensions() {
        let (x, y) = separable(10);
        for model_type in ModelType::ALL {
            let mut model = Model::new(model_type, &ModelConfig::default(), 3);
            model.fit(&x, &y).unwrap();
            let contributions = model.explain(&[3.0, 0.0, 1.0]).unwrap();
            let dims: Vec<usize> = contributions.iter().map(|(i, _)| *i).collect();
            assert_eq!(dims, vec![0, 2], "{}", model_type);
            assert!(contributions.iter().all(|(_, c)| c.is_finite()));
        }
    }
}
