//! Pair verifiers: same/different decisions over descriptor pairs.
//!
//! Each variant fits a distance threshold from the labeled training matrix:
//! the midpoint between the mean within-class and mean between-class pair
//! distance. `same` returns `threshold - distance`, so a positive score
//! means "same identity". Once trained, `same` is read-only.

use ndarray::Array2;
use thiserror::Error;

/// Upper bound on the training pairs enumerated for threshold fitting;
/// larger splits are stride-sampled down to this budget.
const MAX_THRESHOLD_PAIRS: usize = 100_000;

/// Variance floor for the variance-weighted metric.
const VAR_EPS: f32 = 1e-6;

#[derive(Error, Debug)]
pub enum VerifierError {
    #[error("cannot train on an empty descriptor matrix")]
    EmptyTrainingSet,
    #[error("label count {labels} does not match descriptor row count {rows}")]
    LabelCountMismatch { rows: usize, labels: usize },
    #[error("degenerate training data: needs both within-class and between-class pairs")]
    DegenerateTrainingData,
    #[error("verifier is not trained")]
    NotTrained,
    #[error("descriptor length {got} does not match trained length {expected}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Verifier variant, selected by index on the command surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifierKind {
    /// Euclidean distance threshold.
    L2,
    /// Cosine distance threshold.
    Cosine,
    /// Euclidean distance weighted by inverse within-class variance.
    VarWeighted,
}

impl VerifierKind {
    pub const ALL: [VerifierKind; 3] = [
        VerifierKind::L2,
        VerifierKind::Cosine,
        VerifierKind::VarWeighted,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            VerifierKind::L2 => "l2",
            VerifierKind::Cosine => "cos",
            VerifierKind::VarWeighted => "var_l2",
        }
    }
}

/// Fitted decision model. Replaced wholesale on retrain.
#[derive(Debug, Clone)]
struct TrainedModel {
    threshold: f32,
    input_len: usize,
    /// Per-dimension weights for [`VerifierKind::VarWeighted`].
    weights: Option<Vec<f32>>,
}

/// Threshold verifier over descriptor pairs.
#[derive(Debug, Clone)]
pub struct Verifier {
    kind: VerifierKind,
    model: Option<TrainedModel>,
}

impl Verifier {
    pub fn new(kind: VerifierKind) -> Self {
        Self { kind, model: None }
    }

    pub fn kind(&self) -> VerifierKind {
        self.kind
    }

    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    /// Fit the decision threshold from the labeled descriptor matrix.
    ///
    /// Any previously fitted state is discarded first, so a retrain never
    /// mixes observations from two training phases.
    pub fn train(&mut self, features: &Array2<f32>, labels: &[i32]) -> Result<(), VerifierError> {
        self.model = None;

        let rows = features.nrows();
        if rows == 0 {
            return Err(VerifierError::EmptyTrainingSet);
        }
        if labels.len() != rows {
            return Err(VerifierError::LabelCountMismatch { rows, labels: labels.len() });
        }

        let weights = match self.kind {
            VerifierKind::VarWeighted => Some(within_class_weights(features, labels)?),
            _ => None,
        };

        let mut same_sum = 0.0f64;
        let mut same_count = 0usize;
        let mut diff_sum = 0.0f64;
        let mut diff_count = 0usize;

        for_each_sampled_pair(rows, MAX_THRESHOLD_PAIRS, |i, j| {
            let a = features.row(i).to_vec();
            let b = features.row(j).to_vec();
            let d = self.distance_with(&a, &b, weights.as_deref());
            if labels[i] == labels[j] {
                same_sum += d as f64;
                same_count += 1;
            } else {
                diff_sum += d as f64;
                diff_count += 1;
            }
        });

        if same_count == 0 || diff_count == 0 {
            return Err(VerifierError::DegenerateTrainingData);
        }

        let mean_same = same_sum / same_count as f64;
        let mean_diff = diff_sum / diff_count as f64;
        let threshold = ((mean_same + mean_diff) / 2.0) as f32;

        tracing::debug!(
            kind = self.kind.name(),
            rows,
            same_pairs = same_count,
            diff_pairs = diff_count,
            threshold,
            "verifier trained"
        );

        self.model = Some(TrainedModel {
            threshold,
            input_len: features.ncols(),
            weights,
        });
        Ok(())
    }

    /// Score a descriptor pair: positive means "same identity".
    pub fn same(&self, a: &[f32], b: &[f32]) -> Result<f32, VerifierError> {
        let model = self.model.as_ref().ok_or(VerifierError::NotTrained)?;
        if a.len() != model.input_len || b.len() != model.input_len {
            return Err(VerifierError::DimensionMismatch {
                expected: model.input_len,
                got: if a.len() != model.input_len { a.len() } else { b.len() },
            });
        }
        let d = self.distance_with(a, b, model.weights.as_deref());
        Ok(model.threshold - d)
    }

    fn distance_with(&self, a: &[f32], b: &[f32], weights: Option<&[f32]>) -> f32 {
        match self.kind {
            VerifierKind::L2 => euclidean(a, b),
            VerifierKind::Cosine => cosine_distance(a, b),
            VerifierKind::VarWeighted => match weights {
                Some(w) => weighted_euclidean(a, b, w),
                None => euclidean(a, b),
            },
        }
    }
}

fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom > 0.0 {
        1.0 - dot / denom
    } else {
        1.0
    }
}

fn weighted_euclidean(a: &[f32], b: &[f32], weights: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .zip(weights.iter())
        .map(|((x, y), w)| w * (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Inverse variance of within-class difference vectors, per dimension.
fn within_class_weights(
    features: &Array2<f32>,
    labels: &[i32],
) -> Result<Vec<f32>, VerifierError> {
    let cols = features.ncols();
    let mut acc = vec![0.0f64; cols];
    let mut count = 0usize;

    for_each_sampled_pair(features.nrows(), MAX_THRESHOLD_PAIRS, |i, j| {
        if labels[i] != labels[j] {
            return;
        }
        let a = features.row(i);
        let b = features.row(j);
        for (k, (x, y)) in a.iter().zip(b.iter()).enumerate() {
            let d = (x - y) as f64;
            acc[k] += d * d;
        }
        count += 1;
    });

    if count == 0 {
        return Err(VerifierError::DegenerateTrainingData);
    }

    Ok(acc
        .into_iter()
        .map(|v| 1.0 / ((v / count as f64) as f32 + VAR_EPS))
        .collect())
}

/// Visit unordered row pairs (i, j), i < j. When the full pair count exceeds
/// `cap`, pairs are stride-sampled so roughly `cap` of them are visited.
fn for_each_sampled_pair(n: usize, cap: usize, mut f: impl FnMut(usize, usize)) {
    let total = n.saturating_mul(n.saturating_sub(1)) / 2;
    let stride = (total / cap.max(1)).max(1);

    let mut counter = 0usize;
    for i in 0..n {
        for j in (i + 1)..n {
            if counter % stride == 0 {
                f(i, j);
            }
            counter += 1;
        }
    }
}
