//! Classification metrics

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::Label;

/// Counts with phishing as the positive class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

impl ConfusionMatrix {
    pub fn from_predictions(actual: &[Label], predicted: &[Label]) -> Self {
        let mut matrix = Self::default();
        for (a, p) in actual.iter().zip(predicted) {
            match (a, p) {
                (Label::Phishing, Label::Phishing) => matrix.true_positives += 1,
                (Label::Legitimate, Label::Phishing) => matrix.false_positives += 1,
                (Label::Legitimate, Label::Legitimate) => matrix.true_negatives += 1,
                (Label::Phishing, Label::Legitimate) => matrix.false_negatives += 1,
            }
        }
        matrix
    }

    pub fn total(&self) -> usize {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positives + self.true_negatives, self.total())
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    pub fn f1(&self) -> f64 {
        let (precision, recall) = (self.precision(), self.recall());
        if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        }
    }
}

/// Zero when the denominator is zero
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Evaluation results for one model on one dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub confusion_matrix: ConfusionMatrix,
    /// Accuracy on the training split, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub train_accuracy: Option<f64>,
}

impl MetricSummary {
    pub fn from_predictions(actual: &[Label], predicted: &[Label]) -> Self {
        let confusion_matrix = ConfusionMatrix::from_predictions(actual, predicted);
        Self {
            accuracy: confusion_matrix.accuracy(),
            precision: confusion_matrix.precision(),
            recall: confusion_matrix.recall(),
            f1: confusion_matrix.f1(),
            confusion_matrix,
            train_accuracy: None,
        }
    }

    pub fn with_train_accuracy(mut self, train_accuracy: f64) -> Self {
        self.train_accuracy = Some(train_accuracy);
        self
    }

    pub fn examples(&self) -> usize {
        self.confusion_matrix.total()
    }
}

impl fmt::Display for MetricSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Examples:   {}", self.examples())?;
        writeln!(f, "Accuracy:   {:.2}%", self.accuracy * 100.0)?;
        writeln!(f, "Precision:  {:.2}%", self.precision * 100.0)?;
        writeln!(f, "Recall:     {:.2}%", self.recall * 100.0)?;
        writeln!(f, "F1:         {:.2}%", self.f1 * 100.0)?;
        if let Some(train_accuracy) = self.train_accuracy {
            writeln!(f, "Train acc.: {:.2}%", train_accuracy * 100.0)?;
        }
        let m = &self.confusion_matrix;
        writeln!(f, "Confusion:  TP={} FP={} TN={} FN={}", m.true_positives, m.false_positives, m.true_negatives, m.false_negatives)
    }
}
