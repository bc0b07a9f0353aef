//! Random forest of CART trees (gini impurity), bootstrap-aggregated. Trees are stored as flat node
//! arrays so a persisted forest is plain data.

use ndarray::ArrayView2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::Classifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features tried per split; `None` means floor(sqrt(n_features))
    pub max_features: Option<usize>,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Node {
    Leaf {
        probability: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

struct GrowContext<'a> {
    x: ArrayView2<'a, f64>,
    y: &'a [bool],
    params: &'a ForestParams,
    max_features: usize,
}

struct SplitChoice {
    feature: usize,
    threshold: f64,
    gain: f64,
}

fn gini(positives: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let p = positives as f64 / total as f64;
    2.0 * p * (1.0 - p)
}

impl DecisionTree {
    /// Single-leaf tree that always answers `probability`.
    pub fn constant(probability: f64) -> Self {
        Self {
            nodes: vec![Node::Leaf { probability }],
        }
    }

    fn fit(
        ctx: &GrowContext<'_>,
        samples: Vec<usize>,
        rng: &mut StdRng,
        importances: &mut [f64],
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(ctx, samples, 0, rng, importances);
        tree
    }

    fn grow(
        &mut self,
        ctx: &GrowContext<'_>,
        samples: Vec<usize>,
        depth: usize,
        rng: &mut StdRng,
        importances: &mut [f64],
    ) -> usize {
        let n = samples.len();
        let positives = samples.iter().filter(|&&i| ctx.y[i]).count();
        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf {
            probability: if n == 0 { 0.0 } else { positives as f64 / n as f64 },
        });

        if depth >= ctx.params.max_depth
            || n < ctx.params.min_samples_split
            || positives == 0
            || positives == n
        {
            return idx;
        }
        let Some(split) = best_split(ctx, &samples, positives, rng) else {
            return idx;
        };

        importances[split.feature] += split.gain * n as f64;
        let (left, right): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&i| ctx.x[[i, split.feature]] <= split.threshold);
        let left = self.grow(ctx, left, depth + 1, rng, importances);
        let right = self.grow(ctx, right, depth + 1, rng, importances);
        self.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        idx
    }

    fn leaf_probability(&self, value: impl Fn(usize) -> f64) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Leaf { probability }) => return *probability,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    idx = if value(*feature) <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                None => return f64::NAN,
            }
        }
    }

    /// Children always point forward, so traversal terminates.
    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Leaf { probability } => {
                    if !(0.0..=1.0).contains(probability) {
                        return Err(format!("leaf {i} probability {probability} out of range"));
                    }
                }
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= n_features {
                        return Err(format!("node {i} splits on missing feature {feature}"));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {i} threshold is not finite"));
                    }
                    for child in [left, right] {
                        if *child <= i || *child >= self.nodes.len() {
                            return Err(format!("node {i} has invalid child {child}"));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn best_split(
    ctx: &GrowContext<'_>,
    samples: &[usize],
    positives: usize,
    rng: &mut StdRng,
) -> Option<SplitChoice> {
    let n = samples.len();
    let min_leaf = ctx.params.min_samples_leaf.max(1);
    let parent = gini(positives, n);
    let candidates = rand::seq::index::sample(rng, ctx.x.ncols(), ctx.max_features);

    let mut best: Option<SplitChoice> = None;
    let mut column: Vec<(f64, bool)> = Vec::with_capacity(n);
    for feature in candidates.iter() {
        column.clear();
        column.extend(samples.iter().map(|&i| (ctx.x[[i, feature]], ctx.y[i])));
        column.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_pos = 0usize;
        for i in 1..n {
            if column[i - 1].1 {
                left_pos += 1;
            }
            let (lo, hi) = (column[i - 1].0, column[i].0);
            if lo == hi || i < min_leaf || n - i < min_leaf {
                continue;
            }
            let weighted = (i as f64 * gini(left_pos, i)
                + (n - i) as f64 * gini(positives - left_pos, n - i))
                / n as f64;
            let gain = parent - weighted;
            if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                let mid = lo / 2.0 + hi / 2.0;
                best = Some(SplitChoice {
                    feature,
                    threshold: if mid < hi { mid } else { lo },
                    gain,
                });
            }
        }
    }
    best
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_features: usize,
    /// Mean decrease in impurity, normalized to sum 1
    feature_importances: Vec<f64>,
}

impl RandomForest {
    /// `x` rows are samples; `y` is the delayed label per row.
    pub fn fit<'a>(x: ArrayView2<'a, f64>, y: &'a [bool], params: &'a ForestParams) -> Self {
        let (n_samples, n_features) = x.dim();
        let max_features = params
            .max_features
            .unwrap_or_else(|| (n_features as f64).sqrt() as usize)
            .clamp(1, n_features.max(1));
        let ctx = GrowContext {
            x,
            y,
            params,
            max_features,
        };

        let mut totals = vec![0.0; n_features];
        let mut trees = Vec::with_capacity(params.n_estimators);
        for t in 0..params.n_estimators {
            let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(t as u64));
            let bootstrap: Vec<usize> = (0..n_samples)
                .map(|_| rng.gen_range(0..n_samples))
                .collect();
            let mut importances = vec![0.0; n_features];
            let tree = DecisionTree::fit(&ctx, bootstrap, &mut rng, &mut importances);
            let sum: f64 = importances.iter().sum();
            if sum > 0.0 {
                for (total, imp) in totals.iter_mut().zip(&importances) {
                    *total += imp / sum;
                }
            }
            trees.push(tree);
        }

        let sum: f64 = totals.iter().sum();
        if sum > 0.0 {
            totals.iter_mut().for_each(|v| *v /= sum);
        }
        Self {
            trees,
            n_features,
            feature_importances: totals,
        }
    }

    /// Forest from prebuilt trees; importances are left at zero.
    pub fn from_trees(trees: Vec<DecisionTree>, n_features: usize) -> Self {
        Self {
            trees,
            n_features,
            feature_importances: vec![0.0; n_features],
        }
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    pub fn predict_matrix(&self, x: ArrayView2<f64>) -> Vec<f64> {
        x.outer_iter()
            .map(|row| self.mean_probability(|f| row[f]))
            .collect()
    }

    fn mean_probability(&self, value: impl Fn(usize) -> f64) -> f64 {
        if self.trees.is_empty() {
            return f64::NAN;
        }
        let sum: f64 = self.trees.iter().map(|t| t.leaf_probability(&value)).sum();
        sum / self.trees.len() as f64
    }

    pub(crate) fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        if self.n_features != n_features {
            return Err(format!(
                "forest expects {} features, schema has {n_features}",
                self.n_features
            ));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(n_features)
                .map_err(|e| format!("tree {i}: {e}"))?;
        }
        Ok(())
    }
}

impl Classifier for RandomForest {
    fn predict_proba(&self, features: &[f64]) -> f64 {
        if features.len() < self.n_features {
            return f64::NAN;
        }
        self.mean_probability(|f| features[f])
    }
}
