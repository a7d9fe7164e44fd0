//! Run reporting: the final summary line and the optional JSON document.

use crate::eval::EvalResult;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

/// Serializable record of one benchmark run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub extractor: String,
    pub reductor: String,
    pub classifier: String,
    pub preprocess: String,
    pub protocol: String,
    pub crop: usize,
    pub flip: bool,
    pub folds: Vec<FoldReport>,
    pub mean_accuracy: f64,
    pub std_error: f64,
    pub elapsed_secs: f64,
}

#[derive(Debug, Serialize)]
pub struct FoldReport {
    pub fold: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub accuracy: f64,
}

impl RunReport {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        extractor: &str,
        reductor: &str,
        classifier: &str,
        preprocess: &str,
        protocol: &str,
        crop: usize,
        flip: bool,
        result: &EvalResult,
    ) -> Self {
        let folds = result
            .folds
            .iter()
            .map(|o| FoldReport {
                fold: o.fold,
                correct: o.correct,
                incorrect: o.incorrect,
                // Guarded by the driver before the report is built.
                accuracy: o.accuracy().unwrap_or(0.0),
            })
            .collect();

        Self {
            extractor: extractor.to_string(),
            reductor: reductor.to_string(),
            classifier: classifier.to_string(),
            preprocess: preprocess.to_string(),
            protocol: protocol.to_string(),
            crop,
            flip,
            folds,
            mean_accuracy: result.summary.mean,
            std_error: result.summary.std_err,
            elapsed_secs: result.elapsed_secs,
        }
    }

    /// The one-line run summary printed after the fold loop.
    pub fn summary_line(&self) -> String {
        format!(
            "{:<8} {:<7} {:<9} {:<6}\t{:9.4} {:9.4} {:9.4}",
            self.extractor,
            self.reductor,
            self.classifier,
            self.protocol,
            self.mean_accuracy,
            self.std_error,
            self.elapsed_secs
        )
    }

    /// Write the report as pretty-printed JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("cannot write report to {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facebench_core::{FoldOutcome, Summary};

    fn sample() -> RunReport {
        let mut fold = FoldOutcome::new(0);
        fold.record(true, true);
        fold.record(true, false);
        let result = EvalResult {
            folds: vec![fold],
            summary: Summary::from_accuracies(&[0.5]).unwrap(),
            elapsed_secs: 1.25,
        };
        RunReport::new("lbp_u", "pca", "cos", "none", "dev", 80, false, &result)
    }

    #[test]
    fn test_summary_line_contains_names_and_mean() {
        let line = sample().summary_line();
        assert!(line.contains("lbp_u"));
        assert!(line.contains("pca"));
        assert!(line.contains("cos"));
        assert!(line.contains("dev"));
        assert!(line.contains("0.5000"));
    }

    #[test]
    fn test_json_round_trip_fields() {
        let report = sample();
        let json = serde_json::to_string(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["extractor"], "lbp_u");
        assert_eq!(value["folds"][0]["correct"], 1);
        assert_eq!(value["folds"][0]["incorrect"], 1);
        assert_eq!(value["mean_accuracy"], 0.5);
    }
}
