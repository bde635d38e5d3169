//! Logistic regression
//!
//! Features are standardized with the training mean and standard deviation,
//! then weights are fitted by full-batch gradient descent on the L2-penalized
//! log loss.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{check_dimension, nonzero_contributions, sigmoid, validate_training_set, Classifier, Label};
use crate::config::LogisticConfig;
use crate::error::{PhishError, Result};
use crate::features::FeatureVector;

/// Standard deviations below this are treated as constant features
const MIN_STD: f64 = 1e-12;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogisticParams {
    pub weights: Vec<f64>,
    pub bias: f64,
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct LogisticRegression {
    config: LogisticConfig,
    params: Option<LogisticParams>,
}

impl LogisticRegression {
    pub fn new(config: LogisticConfig) -> Self {
        Self {
            config,
            params: None,
        }
    }

    pub fn from_params(params: LogisticParams) -> Result<Self> {
        let d = params.weights.len();
        if d == 0 || params.means.len() != d || params.stds.len() != d {
            return Err(PhishError::ArtifactCorrupt(
                "logistic regression parameter lengths disagree".to_string(),
            ));
        }
        let all_finite = params
            .weights
            .iter()
            .chain(&params.means)
            .chain(&params.stds)
            .chain(std::iter::once(&params.bias))
            .all(|v| v.is_finite());
        if !all_finite || params.stds.iter().any(|s| *s <= 0.0) {
            return Err(PhishError::ArtifactCorrupt(
                "logistic regression parameters are not finite".to_string(),
            ));
        }

        Ok(Self {
            config: LogisticConfig::default(),
            params: Some(params),
        })
    }

    pub fn params(&self) -> Result<&LogisticParams> {
        self.params.as_ref().ok_or(PhishError::ModelNotLoaded)
    }

    fn standardize(params: &LogisticParams, x: &[f64]) -> Vec<f64> {
        x.iter()
            .zip(params.means.iter().zip(&params.stds))
            .map(|(value, (mean, std))| (value - mean) / std)
            .collect()
    }

    fn decision(params: &LogisticParams, z: &[f64]) -> f64 {
        params.bias + z.iter().zip(&params.weights).map(|(a, w)| a * w).sum::<f64>()
    }
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, x: &[FeatureVector], y: &[Label]) -> Result<()> {
        let d = validate_training_set(x, y)?;
        let n = x.len() as f64;

        let mut means = vec![0.0; d];
        for row in x {
            for (mean, value) in means.iter_mut().zip(row.iter()) {
                *mean += value / n;
            }
        }
        let mut stds = vec![0.0; d];
        for row in x {
            for ((std, value), mean) in stds.iter_mut().zip(row.iter()).zip(&means) {
                *std += (value - mean).powi(2) / n;
            }
        }
        for std in stds.iter_mut() {
            *std = std.sqrt();
            if *std < MIN_STD {
                *std = 1.0;
            }
        }

        let mut params = LogisticParams {
            weights: vec![0.0; d],
            bias: 0.0,
            means,
            stds,
        };
        let standardized: Vec<Vec<f64>> = x.iter().map(|row| Self::standardize(&params, row)).collect();
        let targets: Vec<f64> = y.iter().map(|label| label.target()).collect();

        let mut grad = vec![0.0; d];
        for _ in 0..self.config.epochs {
            grad.iter_mut().for_each(|g| *g = 0.0);
            let mut grad_bias = 0.0;

            for (z, target) in standardized.iter().zip(&targets) {
                let error = sigmoid(Self::decision(&params, z)) - target;
                grad_bias += error;
                for (g, value) in grad.iter_mut().zip(z) {
                    *g += error * value;
                }
            }

            for (w, g) in params.weights.iter_mut().zip(&grad) {
                *w -= self.config.learning_rate * (g / n + self.config.l2 * *w);
            }
            params.bias -= self.config.learning_rate * grad_bias / n;
        }

        debug!(
            "Fitted logistic regression: {} features, {} epochs",
            d, self.config.epochs
        );
        self.params = Some(params);
        Ok(())
    }

    fn predict_proba(&self, x: &[f64]) -> Result<f64> {
        let params = self.params()?;
        check_dimension(params.weights.len(), x)?;
        let z = Self::standardize(params, x);
        Ok(sigmoid(Self::decision(params, &z)))
    }

    fn explain(&self, x: &[f64]) -> Result<Vec<(usize, f64)>> {
        let params = self.params()?;
        check_dimension(params.weights.len(), x)?;
        Ok(nonzero_contributions(x, |i, value| {
            params.weights[i] * (value - params.means[i]) / params.stds[i]
        }))
    }

    fn dimension(&self) -> Option<usize> {
        self.params.as_ref().map(|p| p.weights.len())
    }
}
