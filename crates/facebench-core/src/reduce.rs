//! Descriptor dimensionality reduction.
//!
//! A reductor only exists in fitted form: [`Reductor::fit`] consumes the
//! training descriptor matrix once per training phase and the result is
//! immutable, so evaluation can never observe a half-fitted projection.

use ndarray::{Array1, Array2, Axis};
use thiserror::Error;

/// Projection dimensionality for the PCA variants.
const PCA_DIM: usize = 64;

/// Power-iteration sweeps per component.
const POWER_ITERATIONS: usize = 50;

/// Whitening floor added to eigenvalues.
const WHITEN_EPS: f32 = 1e-6;

#[derive(Error, Debug)]
pub enum ReduceError {
    #[error("cannot fit reductor on an empty training set")]
    EmptyTrainingSet,
    #[error("descriptor length {got} does not match fitted input length {expected}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Reduction variant, selected by index on the command surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReductorKind {
    /// Pass descriptors through unchanged.
    None,
    /// Hellinger mapping: L1 normalization followed by element-wise sqrt.
    Hellinger,
    /// PCA projection fit from the training descriptor matrix.
    Pca,
    /// PCA with whitening (unit variance along each component).
    PcaWhiten,
}

impl ReductorKind {
    pub const ALL: [ReductorKind; 4] = [
        ReductorKind::None,
        ReductorKind::Hellinger,
        ReductorKind::Pca,
        ReductorKind::PcaWhiten,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            ReductorKind::None => "none",
            ReductorKind::Hellinger => "hell",
            ReductorKind::Pca => "pca",
            ReductorKind::PcaWhiten => "pca_w",
        }
    }

    /// Whether this variant needs a training matrix before first use.
    pub fn needs_fit(&self) -> bool {
        matches!(self, ReductorKind::Pca | ReductorKind::PcaWhiten)
    }
}

/// A fitted reductor.
#[derive(Debug, Clone)]
pub enum Reductor {
    None,
    Hellinger,
    Projection {
        mean: Array1<f32>,
        /// One row per retained component.
        components: Array2<f32>,
        /// Per-component scale: 1 for plain PCA, 1/sqrt(eigenvalue) whitened.
        scales: Vec<f32>,
    },
}

impl Reductor {
    /// Fit a reductor of the given kind on the training descriptor matrix
    /// (one row per descriptor). The parameterless variants ignore the
    /// matrix content but still reject an empty one, since a pipeline with
    /// zero training rows is malformed either way.
    pub fn fit(kind: ReductorKind, features: &Array2<f32>) -> Result<Self, ReduceError> {
        if features.nrows() == 0 {
            return Err(ReduceError::EmptyTrainingSet);
        }

        match kind {
            ReductorKind::None => Ok(Reductor::None),
            ReductorKind::Hellinger => Ok(Reductor::Hellinger),
            ReductorKind::Pca => Ok(fit_pca(features, false)),
            ReductorKind::PcaWhiten => Ok(fit_pca(features, true)),
        }
    }

    /// Output descriptor length for a given input length.
    pub fn output_len(&self, input_len: usize) -> usize {
        match self {
            Reductor::None | Reductor::Hellinger => input_len,
            Reductor::Projection { components, .. } => components.nrows(),
        }
    }

    /// Project one descriptor.
    pub fn reduce(&self, descriptor: &[f32]) -> Result<Vec<f32>, ReduceError> {
        match self {
            Reductor::None => Ok(descriptor.to_vec()),
            Reductor::Hellinger => Ok(hellinger(descriptor)),
            Reductor::Projection { mean, components, scales } => {
                if descriptor.len() != mean.len() {
                    return Err(ReduceError::DimensionMismatch {
                        expected: mean.len(),
                        got: descriptor.len(),
                    });
                }

                let centered: Vec<f32> = descriptor
                    .iter()
                    .zip(mean.iter())
                    .map(|(v, m)| v - m)
                    .collect();

                let out = components
                    .axis_iter(Axis(0))
                    .zip(scales.iter())
                    .map(|(comp, &s)| {
                        comp.iter().zip(centered.iter()).map(|(c, v)| c * v).sum::<f32>() * s
                    })
                    .collect();
                Ok(out)
            }
        }
    }
}

fn hellinger(descriptor: &[f32]) -> Vec<f32> {
    let l1: f32 = descriptor.iter().map(|v| v.abs()).sum();
    if l1 <= 0.0 {
        return descriptor.to_vec();
    }
    descriptor
        .iter()
        .map(|&v| {
            let n = v / l1;
            n.signum() * n.abs().sqrt()
        })
        .collect()
}

/// PCA by power iteration with deflation: finds the top components of the
/// centered training matrix without materializing a covariance matrix
/// (descriptors can be tens of thousands of dimensions wide).
fn fit_pca(features: &Array2<f32>, whiten: bool) -> Reductor {
    let rows = features.nrows();
    let cols = features.ncols();
    let dim = PCA_DIM.min(cols).min(rows.saturating_sub(1).max(1));

    let mean = features.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(cols));
    let centered = features - &mean.view().insert_axis(Axis(0));

    let mut components = Array2::<f32>::zeros((dim, cols));
    let mut scales = Vec::with_capacity(dim);
    let denom = (rows.max(2) - 1) as f32;

    for k in 0..dim {
        // Deterministic start vector, orthogonalized against found components.
        let mut v = Array1::from_shape_fn(cols, |i| {
            let seed = (i + 1) * (k + 7);
            ((seed % 251) as f32 / 251.0) - 0.5
        });

        let mut eigenvalue = 0.0f32;
        for _ in 0..POWER_ITERATIONS {
            // w = X^T (X v): covariance product without forming X^T X.
            let xv = centered.dot(&v);
            let mut w = centered.t().dot(&xv);

            for prev in 0..k {
                let comp = components.row(prev);
                let proj = comp.dot(&w);
                w = &w - &(&comp.to_owned() * proj);
            }

            let norm = w.dot(&w).sqrt();
            if norm < 1e-12 {
                break;
            }
            eigenvalue = norm / denom;
            v = w / norm;
        }

        components.row_mut(k).assign(&v);
        scales.push(if whiten {
            1.0 / (eigenvalue + WHITEN_EPS).sqrt()
        } else {
            1.0
        });
    }

    tracing::debug!(rows, cols, dim, whiten, "fitted PCA projection");

    Reductor::Projection { mean, components, scales }
}
