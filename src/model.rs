//! Rating regressors.
//!
//! [`Estimator`] is the seam the trainers and the recommendation engine work
//! against. [`GbtRegressor`] is the bundled implementation: squared-error
//! gradient boosting over shallow regression trees, serialized as JSON.

use serde::{Deserialize, Serialize};

use crate::features::FeatureVector;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("model has not been fitted")]
    NotFitted,
    #[error("cannot fit on an empty training set")]
    EmptyTrainingSet,
    #[error("feature/target length mismatch: {features} rows vs {targets} targets")]
    LengthMismatch { features: usize, targets: usize },
    #[error("non-finite value in training data")]
    NonFinite,
    #[error("invalid params: {0}")]
    InvalidParams(String),
}

/// A regressor mapping a feature vector to a predicted rating.
pub trait Estimator {
    fn fit(&mut self, x: &[FeatureVector], y: &[f64]) -> Result<(), ModelError>;

    fn predict(&self, x: &FeatureVector) -> Result<f64, ModelError>;

    fn name(&self) -> &str {
        "estimator"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GbtParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
}

impl Default for GbtParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
        }
    }
}

impl GbtParams {
    fn validate(&self) -> Result<(), ModelError> {
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(ModelError::InvalidParams(format!(
                "learning_rate {}",
                self.learning_rate
            )));
        }
        if self.min_samples_leaf == 0 {
            return Err(ModelError::InvalidParams("min_samples_leaf must be >= 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Node {
    Leaf { value: f64 },
    Split { feature: usize, threshold: f64, left: Box<Node>, right: Box<Node> },
}

impl Node {
    fn eval(&self, row: &[f64; FeatureVector::DIM]) -> f64 {
        let mut node = self;
        loop {
            match node {
                Node::Leaf { value } => return *value,
                Node::Split { feature, threshold, left, right } => {
                    node = if row[*feature] <= *threshold { &**left } else { &**right };
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Fitted {
    base_score: f64,
    trees: Vec<Node>,
}

/// Gradient-boosted regression trees. Training is deterministic: splits are
/// exact and greedy, ties resolve to the lowest feature index and threshold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GbtRegressor {
    pub params: GbtParams,
    fitted: Option<Fitted>,
}

impl GbtRegressor {
    pub fn new(params: GbtParams) -> Self {
        Self { params, fitted: None }
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    pub fn n_trees(&self) -> usize {
        self.fitted.as_ref().map_or(0, |f| f.trees.len())
    }

    fn build(
        &self,
        rows: &[[f64; FeatureVector::DIM]],
        residuals: &[f64],
        idx: Vec<usize>,
        depth: usize,
    ) -> Node {
        if idx.is_empty() {
            return Node::Leaf { value: 0.0 };
        }
        let mean = idx.iter().map(|&i| residuals[i]).sum::<f64>() / idx.len() as f64;
        let min_leaf = self.params.min_samples_leaf;
        if depth >= self.params.max_depth || idx.len() < 2 * min_leaf {
            return Node::Leaf { value: mean };
        }

        let total: f64 = idx.iter().map(|&i| residuals[i]).sum();
        let n = idx.len() as f64;
        let parent_score = total * total / n;

        // (gain, feature, threshold)
        let mut best: Option<(f64, usize, f64)> = None;
        for feature in 0..FeatureVector::DIM {
            let mut order = idx.clone();
            order.sort_by(|&a, &b| rows[a][feature].total_cmp(&rows[b][feature]));

            let mut left_sum = 0.0;
            for k in 0..order.len() - 1 {
                left_sum += residuals[order[k]];
                let left_n = k + 1;
                let right_n = order.len() - left_n;
                let (lo, hi) = (rows[order[k]][feature], rows[order[k + 1]][feature]);
                if lo == hi || left_n < min_leaf || right_n < min_leaf {
                    continue;
                }
                let right_sum = total - left_sum;
                let score = left_sum * left_sum / left_n as f64
                    + right_sum * right_sum / right_n as f64;
                let gain = score - parent_score;
                if gain > 1e-12 && best.map_or(true, |(g, _, _)| gain > g) {
                    // Adjacent floats can round the midpoint up to `hi`.
                    let mut threshold = lo + (hi - lo) / 2.0;
                    if threshold >= hi {
                        threshold = lo;
                    }
                    best = Some((gain, feature, threshold));
                }
            }
        }

        let Some((_, feature, threshold)) = best else {
            return Node::Leaf { value: mean };
        };
        let (left, right): (Vec<usize>, Vec<usize>) =
            idx.into_iter().partition(|&i| rows[i][feature] <= threshold);
        Node::Split {
            feature,
            threshold,
            left: Box::new(self.build(rows, residuals, left, depth + 1)),
            right: Box::new(self.build(rows, residuals, right, depth + 1)),
        }
    }
}

impl Estimator for GbtRegressor {
    fn fit(&mut self, x: &[FeatureVector], y: &[f64]) -> Result<(), ModelError> {
        self.params.validate()?;
        if x.len() != y.len() {
            return Err(ModelError::LengthMismatch { features: x.len(), targets: y.len() });
        }
        if x.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }

        let rows: Vec<[f64; FeatureVector::DIM]> = x.iter().map(FeatureVector::to_row).collect();
        if rows.iter().flatten().chain(y).any(|v| !v.is_finite()) {
            return Err(ModelError::NonFinite);
        }

        let base_score = y.iter().sum::<f64>() / y.len() as f64;
        let mut pred = vec![base_score; y.len()];
        let mut trees = Vec::with_capacity(self.params.n_estimators);

        for _ in 0..self.params.n_estimators {
            let residuals: Vec<f64> = y.iter().zip(&pred).map(|(t, p)| t - p).collect();
            let tree = self.build(&rows, &residuals, (0..rows.len()).collect(), 0);
            for (p, row) in pred.iter_mut().zip(&rows) {
                *p += self.params.learning_rate * tree.eval(row);
            }
            trees.push(tree);
        }

        tracing::debug!(
            "fitted gbt regressor on {} rows ({} trees, base score {})",
            rows.len(),
            trees.len(),
            base_score
        );
        self.fitted = Some(Fitted { base_score, trees });
        Ok(())
    }

    fn predict(&self, x: &FeatureVector) -> Result<f64, ModelError> {
        let fitted = self.fitted.as_ref().ok_or(ModelError::NotFitted)?;
        let row = x.to_row();
        let boost: f64 = fitted.trees.iter().map(|t| t.eval(&row)).sum();
        Ok(fitted.base_score + self.params.learning_rate * boost)
    }

    fn name(&self) -> &str {
        "gbt_regressor"
    }
}
