//! Multinomial naive Bayes

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{check_dimension, nonzero_contributions, sigmoid, validate_training_set, Classifier, Label};
use crate::config::BayesConfig;
use crate::error::{PhishError, Result};
use crate::features::FeatureVector;

/// Log probabilities per class, legitimate first
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BayesParams {
    pub class_log_prior: [f64; 2],
    pub legitimate_log_prob: Vec<f64>,
    pub phishing_log_prob: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct NaiveBayes {
    config: BayesConfig,
    params: Option<BayesParams>,
}

impl NaiveBayes {
    pub fn new(config: BayesConfig) -> Self {
        Self {
            config,
            params: None,
        }
    }

    pub fn from_params(params: BayesParams) -> Result<Self> {
        let d = params.phishing_log_prob.len();
        if d == 0 || params.legitimate_log_prob.len() != d {
            return Err(PhishError::ArtifactCorrupt(
                "naive Bayes parameter lengths disagree".to_string(),
            ));
        }
        let all_finite = params
            .class_log_prior
            .iter()
            .chain(&params.legitimate_log_prob)
            .chain(&params.phishing_log_prob)
            .all(|v| v.is_finite() && *v <= 0.0);
        if !all_finite {
            return Err(PhishError::ArtifactCorrupt(
                "naive Bayes log probabilities are invalid".to_string(),
            ));
        }

        Ok(Self {
            config: BayesConfig::default(),
            params: Some(params),
        })
    }

    pub fn params(&self) -> Result<&BayesParams> {
        self.params.as_ref().ok_or(PhishError::ModelNotLoaded)
    }

    /// Smoothed log p(feature | class) from per-feature totals
    fn log_probabilities(totals: &[f64], alpha: f64) -> Vec<f64> {
        let denominator = totals.iter().sum::<f64>() + alpha * totals.len() as f64;
        totals
            .iter()
            .map(|total| ((total + alpha) / denominator).ln())
            .collect()
    }
}

impl Classifier for NaiveBayes {
    fn fit(&mut self, x: &[FeatureVector], y: &[Label]) -> Result<()> {
        let d = validate_training_set(x, y)?;
        if x.iter().any(|row| row.iter().any(|v| *v < 0.0)) {
            return Err(PhishError::Training(
                "naive Bayes requires non-negative features".to_string(),
            ));
        }

        let mut counts = [0usize; 2];
        let mut totals = [vec![0.0; d], vec![0.0; d]];
        for (row, label) in x.iter().zip(y) {
            let class = usize::from(label.is_phishing());
            counts[class] += 1;
            for (total, value) in totals[class].iter_mut().zip(row.iter()) {
                *total += value;
            }
        }

        let n = x.len() as f64;
        let alpha = self.config.alpha;
        self.params = Some(BayesParams {
            class_log_prior: [
                (counts[0] as f64 / n).ln(),
                (counts[1] as f64 / n).ln(),
            ],
            legitimate_log_prob: Self::log_probabilities(&totals[0], alpha),
            phishing_log_prob: Self::log_probabilities(&totals[1], alpha),
        });

        debug!(
            "Fitted naive Bayes: {} legitimate, {} phishing, {} features",
            counts[0], counts[1], d
        );
        Ok(())
    }

    fn predict_proba(&self, x: &[f64]) -> Result<f64> {
        let params = self.params()?;
        check_dimension(params.phishing_log_prob.len(), x)?;

        let log_odds = params.class_log_prior[1] - params.class_log_prior[0]
            + x.iter()
                .zip(params.phishing_log_prob.iter().zip(&params.legitimate_log_prob))
                .map(|(value, (phishing, legitimate))| value * (phishing - legitimate))
                .sum::<f64>();
        Ok(sigmoid(log_odds))
    }

    fn explain(&self, x: &[f64]) -> Result<Vec<(usize, f64)>> {
        let params = self.params()?;
        check_dimension(params.phishing_log_prob.len(), x)?;
        Ok(nonzero_contributions(x, |i, value| {
            value * (params.phishing_log_prob[i] - params.legitimate_log_prob[i])
        }))
    }

    fn dimension(&self) -> Option<usize> {
        self.params.as_ref().map(|p| p.phishing_log_prob.len())
    }
}
