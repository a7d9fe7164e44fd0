//! Fold accuracy accumulation and cross-fold summary statistics.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("fold {fold} has no scored examples, accuracy is undefined")]
    EmptyFold { fold: usize },
    #[error("no fold accuracies to summarize")]
    NoFolds,
}

/// Correct/incorrect counts for one evaluation fold.
#[derive(Debug, Clone, Copy, Default)]
pub struct FoldOutcome {
    pub fold: usize,
    pub correct: usize,
    pub incorrect: usize,
}

impl FoldOutcome {
    pub fn new(fold: usize) -> Self {
        Self { fold, correct: 0, incorrect: 0 }
    }

    /// Record one prediction against its ground truth.
    pub fn record(&mut self, predicted: bool, truth: bool) {
        if predicted == truth {
            self.correct += 1;
        } else {
            self.incorrect += 1;
        }
    }

    pub fn total(&self) -> usize {
        self.correct + self.incorrect
    }

    /// Fold accuracy in [0, 1]. Errors instead of dividing by zero when the
    /// fold scored nothing (a fatal configuration problem upstream).
    pub fn accuracy(&self) -> Result<f64, StatsError> {
        if self.total() == 0 {
            return Err(StatsError::EmptyFold { fold: self.fold });
        }
        Ok(self.correct as f64 / self.total() as f64)
    }
}

/// Mean / deviation / standard error over the per-fold accuracies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub mean: f64,
    pub std_dev: f64,
    pub std_err: f64,
    pub folds: usize,
}

impl Summary {
    /// Reduce a fold-accuracy sequence: mean, sigma = sqrt of the mean
    /// squared deviation, standard error = sigma / sqrt(n).
    pub fn from_accuracies(accuracies: &[f64]) -> Result<Self, StatsError> {
        if accuracies.is_empty() {
            return Err(StatsError::NoFolds);
        }

        let n = accuracies.len() as f64;
        let mean = accuracies.iter().sum::<f64>() / n;
        let variance = accuracies.iter().map(|a| (a - mean) * (a - mean)).sum::<f64>() / n;
        let std_dev = variance.sqrt();
        let std_err = std_dev / n.sqrt();

        Ok(Self { mean, std_dev, std_err, folds: accuracies.len() })
    }
}
