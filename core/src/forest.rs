//! Unsupervised anomaly model: the pluggable trait plus the isolation
//! forest implementation behind it.
//!
//! The trait has exactly two operations — fit a feature table into an
//! immutable fitted state, and score one feature vector against it — so a
//! one-class boundary or density model could be substituted without
//! touching the engine.
//!
//! Scores follow the decision-function convention: lower = more anomalous.
//! For the forest, score = 0.5 - 2^(-E[path length] / c(subsample)), which
//! lands in (-0.5, 0.5) with typical inliers slightly above zero.

use crate::rng::ModelRng;

/// An unsupervised scorer that can be fitted in bulk.
pub trait AnomalyModel: Send + Sync {
    /// Fit over a feature table (rows x features). The result is immutable.
    fn fit(&self, table: &[Vec<f64>]) -> Box<dyn FittedModel>;
}

/// The fitted, immutable state produced by `AnomalyModel::fit`.
pub trait FittedModel: Send + Sync {
    /// Score one feature vector. Lower = more anomalous.
    fn score(&self, row: &[f64]) -> f64;
}

// ── Isolation forest ─────────────────────────────────────────────────────────

pub struct IsolationForest {
    pub tree_count: usize,
    pub subsample_size: usize,
    pub seed: u64,
}

impl IsolationForest {
    pub fn new(tree_count: usize, subsample_size: usize, seed: u64) -> Self {
        Self {
            tree_count,
            subsample_size,
            seed,
        }
    }
}

impl AnomalyModel for IsolationForest {
    fn fit(&self, table: &[Vec<f64>]) -> Box<dyn FittedModel> {
        let psi = self.subsample_size.min(table.len()).max(2);
        let depth_limit = (psi as f64).log2().ceil() as usize;

        let trees = (0..self.tree_count)
            .map(|i| {
                // Stream 2i subsamples, stream 2i+1 drives the splits.
                let mut sample_rng = ModelRng::for_stream(self.seed, 2 * i as u64);
                let mut split_rng = ModelRng::for_stream(self.seed, 2 * i as u64 + 1);
                let sample = subsample(table.len(), psi, &mut sample_rng);
                let mut tree = IsoTree { nodes: Vec::new() };
                tree.grow(table, &sample, 0, depth_limit, &mut split_rng);
                tree
            })
            .collect();

        Box::new(ForestFit {
            trees,
            normalizer: avg_path_length(psi),
        })
    }
}

struct ForestFit {
    trees: Vec<IsoTree>,
    /// c(psi): expected path length of an unsuccessful BST search over the
    /// subsample size, used to normalize depths across forest shapes.
    normalizer: f64,
}

impl FittedModel for ForestFit {
    fn score(&self, row: &[f64]) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.path_length(row)).sum();
        let mean_depth = total / self.trees.len() as f64;
        let anomaly = 2f64.powf(-mean_depth / self.normalizer);
        0.5 - anomaly
    }
}

// ── Trees ────────────────────────────────────────────────────────────────────

enum IsoNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        size: usize,
    },
}

struct IsoTree {
    nodes: Vec<IsoNode>,
}

impl IsoTree {
    /// Grow a subtree over `rows` (indices into `table`); returns its node
    /// index in the arena.
    fn grow(
        &mut self,
        table: &[Vec<f64>],
        rows: &[usize],
        depth: usize,
        depth_limit: usize,
        rng: &mut ModelRng,
    ) -> usize {
        if rows.len() <= 1 || depth >= depth_limit {
            return self.push(IsoNode::Leaf { size: rows.len() });
        }

        // Candidate features are those not constant over this partition.
        let feature_count = table[rows[0]].len();
        let splittable: Vec<(usize, f64, f64)> = (0..feature_count)
            .filter_map(|f| {
                let mut lo = f64::INFINITY;
                let mut hi = f64::NEG_INFINITY;
                for &r in rows {
                    lo = lo.min(table[r][f]);
                    hi = hi.max(table[r][f]);
                }
                (hi > lo).then_some((f, lo, hi))
            })
            .collect();

        if splittable.is_empty() {
            return self.push(IsoNode::Leaf { size: rows.len() });
        }

        let (feature, lo, hi) = splittable[rng.next_u64_below(splittable.len() as u64) as usize];
        let threshold = rng.uniform(lo, hi);

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            rows.iter().copied().partition(|&r| table[r][feature] < threshold);

        let node = self.push(IsoNode::Leaf { size: 0 }); // placeholder, patched below
        let left = self.grow(table, &left_rows, depth + 1, depth_limit, rng);
        let right = self.grow(table, &right_rows, depth + 1, depth_limit, rng);
        self.nodes[node] = IsoNode::Split {
            feature,
            threshold,
            left,
            right,
        };
        node
    }

    fn push(&mut self, node: IsoNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Path depth of `row`, with the standard correction at leaves that
    /// still hold more than one point.
    fn path_length(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[idx] {
                IsoNode::Leaf { size } => return depth + avg_path_length(*size),
                IsoNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] < *threshold { *left } else { *right };
                    depth += 1.0;
                }
            }
        }
    }
}

/// Draw `k` distinct row indices out of `n` (all of them when n <= k).
fn subsample(n: usize, k: usize, rng: &mut ModelRng) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    if n <= k {
        return indices;
    }
    // Partial Fisher-Yates: only the first k positions are needed.
    for i in 0..k {
        let j = i + rng.next_u64_below((n - i) as u64) as usize;
        indices.swap(i, j);
    }
    indices.truncate(k);
    indices
}

/// c(n): average path length of an unsuccessful BST search over n points.
fn avg_path_length(n: usize) -> f64 {
    const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}
