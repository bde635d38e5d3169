//! Random forest of CART trees
//!
//! Each tree is grown on a bootstrap sample, choosing among √d randomly drawn
//! features at every split by gini impurity. All randomness comes from one
//! `StdRng` seeded at construction, so fitting is reproducible.

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{check_dimension, nonzero_contributions, validate_training_set, Classifier, Label};
use crate::config::ForestConfig;
use crate::error::{PhishError, Result};
use crate::features::FeatureVector;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    Leaf {
        /// Share of phishing samples that reached this node
        value: f64,
    },
    Split {
        value: f64,
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

impl TreeNode {
    fn value(&self) -> f64 {
        match self {
            TreeNode::Leaf { value } | TreeNode::Split { value, .. } => *value,
        }
    }
}

/// One tree, root at index 0
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Node indices from the root to the leaf `x` falls into
    fn path(&self, x: &[f64]) -> Vec<usize> {
        let mut path = vec![0];
        let mut index = 0;
        while let TreeNode::Split {
            feature,
            threshold,
            left,
            right,
            ..
        } = self.nodes[index]
        {
            index = if x[feature] <= threshold { left } else { right };
            path.push(index);
        }
        path
    }

    fn predict(&self, x: &[f64]) -> f64 {
        let path = self.path(x);
        self.nodes[path[path.len() - 1]].value()
    }

    /// Children must come after their parent so traversal always terminates
    fn validate(&self, dimension: usize) -> bool {
        !self.nodes.is_empty()
            && self.nodes.iter().enumerate().all(|(i, node)| match *node {
                TreeNode::Leaf { value } => (0.0..=1.0).contains(&value),
                TreeNode::Split {
                    value,
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    (0.0..=1.0).contains(&value)
                        && feature < dimension
                        && threshold.is_finite()
                        && left > i
                        && right > i
                        && left < self.nodes.len()
                        && right < self.nodes.len()
                }
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForestParams {
    pub dimension: usize,
    pub trees: Vec<DecisionTree>,
}

#[derive(Debug, Clone)]
pub struct RandomForest {
    config: ForestConfig,
    seed: u64,
    params: Option<ForestParams>,
}

/// Growing state shared by the recursive tree builder
struct TreeBuilder<'a> {
    x: &'a [FeatureVector],
    targets: &'a [bool],
    config: &'a ForestConfig,
    features_per_split: usize,
    dimension: usize,
    nodes: Vec<TreeNode>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

fn gini(phishing: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let p = phishing as f64 / total as f64;
    2.0 * p * (1.0 - p)
}

impl<'a> TreeBuilder<'a> {
    fn grow(&mut self, samples: Vec<usize>, depth: usize, rng: &mut StdRng) -> usize {
        let phishing = samples.iter().filter(|&&i| self.targets[i]).count();
        let value = phishing as f64 / samples.len() as f64;
        let index = self.nodes.len();
        self.nodes.push(TreeNode::Leaf { value });

        let pure = phishing == 0 || phishing == samples.len();
        if pure || depth >= self.config.max_depth || samples.len() < self.config.min_samples_split.max(2) {
            return index;
        }

        let parent_impurity = gini(phishing, samples.len());
        let Some(best) = self.best_split(&samples, parent_impurity, rng) else {
            return index;
        };

        let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
            .iter()
            .partition(|&&i| self.x[i][best.feature] <= best.threshold);

        let left = self.grow(left_samples, depth + 1, rng);
        let right = self.grow(right_samples, depth + 1, rng);
        self.nodes[index] = TreeNode::Split {
            value,
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        index
    }

    /// Lowest weighted gini over a random feature subset, if it improves on the parent
    fn best_split(&self, samples: &[usize], parent_impurity: f64, rng: &mut StdRng) -> Option<SplitCandidate> {
        let total = samples.len();
        let total_phishing = samples.iter().filter(|&&i| self.targets[i]).count();
        let mut best: Option<SplitCandidate> = None;

        for feature in sample(rng, self.dimension, self.features_per_split).into_iter() {
            let mut column: Vec<(f64, bool)> = samples
                .iter()
                .map(|&i| (self.x[i][feature], self.targets[i]))
                .collect();
            column.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_phishing = 0;
            for split in 1..total {
                if column[split - 1].1 {
                    left_phishing += 1;
                }
                let (below, above) = (column[split - 1].0, column[split].0);
                if below == above {
                    continue;
                }

                let right_phishing = total_phishing - left_phishing;
                let impurity = (split as f64 * gini(left_phishing, split)
                    + (total - split) as f64 * gini(right_phishing, total - split))
                    / total as f64;

                let improves = impurity < parent_impurity - 1e-12;
                let better = best.as_ref().map_or(true, |b| impurity < b.impurity);
                if improves && better {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: below + (above - below) / 2.0,
                        impurity,
                    });
                }
            }
        }

        best
    }
}

impl RandomForest {
    pub fn new(config: ForestConfig, seed: u64) -> Self {
        Self {
            config,
            seed,
            params: None,
        }
    }

    pub fn from_params(params: ForestParams) -> Result<Self> {
        if params.dimension == 0 || params.trees.is_empty() {
            return Err(PhishError::ArtifactCorrupt(
                "random forest has no trees".to_string(),
            ));
        }
        if !params.trees.iter().all(|tree| tree.validate(params.dimension)) {
            return Err(PhishError::ArtifactCorrupt(
                "random forest tree structure is invalid".to_string(),
            ));
        }

        Ok(Self {
            config: ForestConfig::default(),
            seed: 0,
            params: Some(params),
        })
    }

    pub fn params(&self) -> Result<&ForestParams> {
        self.params.as_ref().ok_or(PhishError::ModelNotLoaded)
    }
}

impl Classifier for RandomForest {
    fn fit(&mut self, x: &[FeatureVector], y: &[Label]) -> Result<()> {
        let dimension = validate_training_set(x, y)?;
        let targets: Vec<bool> = y.iter().map(|label| label.is_phishing()).collect();
        let features_per_split = ((dimension as f64).sqrt().round() as usize).clamp(1, dimension);
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut trees = Vec::with_capacity(self.config.n_trees);
        for _ in 0..self.config.n_trees {
            let bootstrap: Vec<usize> = (0..x.len()).map(|_| rng.gen_range(0..x.len())).collect();
            let mut builder = TreeBuilder {
                x,
                targets: &targets,
                config: &self.config,
                features_per_split,
                dimension,
                nodes: Vec::new(),
            };
            builder.grow(bootstrap, 0, &mut rng);
            trees.push(DecisionTree {
                nodes: builder.nodes,
            });
        }

        debug!(
            "Fitted random forest: {} trees, {} features, {} per split",
            trees.len(),
            dimension,
            features_per_split
        );
        self.params = Some(ForestParams { dimension, trees });
        Ok(())
    }

    fn predict_proba(&self, x: &[f64]) -> Result<f64> {
        let params = self.params()?;
        check_dimension(params.dimension, x)?;
        let sum: f64 = params.trees.iter().map(|tree| tree.predict(x)).sum();
        Ok(sum / params.trees.len() as f64)
    }

    /// Change in phishing share credited to each split feature along the decision paths
    fn explain(&self, x: &[f64]) -> Result<Vec<(usize, f64)>> {
        let params = self.params()?;
        check_dimension(params.dimension, x)?;

        let mut totals = vec![0.0; params.dimension];
        for tree in &params.trees {
            let path = tree.path(x);
            for step in path.windows(2) {
                if let TreeNode::Split { feature, .. } = tree.nodes[step[0]] {
                    totals[feature] += tree.nodes[step[1]].value() - tree.nodes[step[0]].value();
                }
            }
        }

        let n_trees = params.trees.len() as f64;
        Ok(nonzero_contributions(x, |i, _| totals[i] / n_trees))
    }

    fn dimension(&self) -> Option<usize> {
        self.params.as_ref().map(|p| p.dimension)
    }
}
