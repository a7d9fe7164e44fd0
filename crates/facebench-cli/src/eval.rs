//! Evaluation driver: runs one of the two cross-validation protocols over
//! the loaded dataset and accumulates fold statistics.
//!
//! `dev` trains once on the designated training split and evaluates every
//! fold with that one model; `split` retrains per fold on the union of the
//! remaining folds (leave-one-fold-out). Undecodable images are reported
//! and skipped; a fold left without any scored example aborts the run.

use anyhow::{Context, Result};
use facebench_core::{FoldOutcome, GrayImage, LabelMap, Summary, VerificationPipeline};
use facebench_data::{load_gray, LfwDataset, LoadError, PairExample};
use std::path::PathBuf;
use std::time::Instant;

/// Cross-validation protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Protocol {
    /// Train once on pairsDevTrain.txt, evaluate all folds.
    Dev,
    /// Leave-one-fold-out over pairs.txt.
    Split,
}

impl Protocol {
    pub fn name(&self) -> &'static str {
        match self {
            Protocol::Dev => "dev",
            Protocol::Split => "split",
        }
    }
}

/// Where the driver gets pixels from, by dataset-relative path.
pub trait ImageSource {
    fn load(&self, relative: &str) -> Result<GrayImage, LoadError>;
}

/// Filesystem-backed source rooted at the dataset directory.
pub struct FsImageSource {
    root: PathBuf,
}

impl FsImageSource {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl ImageSource for FsImageSource {
    fn load(&self, relative: &str) -> Result<GrayImage, LoadError> {
        load_gray(&self.root.join(relative))
    }
}

/// Per-fold outcomes plus the cross-fold summary.
pub struct EvalResult {
    pub folds: Vec<FoldOutcome>,
    pub summary: Summary,
    pub elapsed_secs: f64,
}

/// Run the full evaluation. Owns the label map for the duration of the run
/// so identity ids are stable across training and every fold.
pub fn run(
    dataset: &LfwDataset,
    source: &impl ImageSource,
    pipeline: &mut VerificationPipeline,
    protocol: Protocol,
) -> Result<EvalResult> {
    let started = Instant::now();
    let mut labels = LabelMap::new();

    if protocol == Protocol::Dev {
        accumulate(pipeline, &mut labels, source, &dataset.train);
        pipeline.train().context("training on the dev split failed")?;
        tracing::info!(identities = labels.len(), "dev model trained");
    }

    let mut outcomes = Vec::with_capacity(dataset.fold_count());
    let mut accuracies = Vec::with_capacity(dataset.fold_count());

    for (fold_idx, fold) in dataset.folds.iter().enumerate() {
        if protocol == Protocol::Split {
            for (other_idx, other) in dataset.folds.iter().enumerate() {
                if other_idx == fold_idx {
                    continue;
                }
                accumulate(pipeline, &mut labels, source, other);
            }
            pipeline
                .train()
                .with_context(|| format!("training for fold {fold_idx} failed"))?;
        }

        let outcome = evaluate_fold(pipeline, source, fold_idx, fold)?;
        let accuracy = outcome
            .accuracy()
            .with_context(|| format!("fold {fold_idx} scored no examples"))?;

        println!(
            "{:4} {:5}/{:<5}  {:2.3}",
            fold_idx, outcome.correct, outcome.incorrect, accuracy
        );

        outcomes.push(outcome);
        accuracies.push(accuracy);
    }

    let summary = Summary::from_accuracies(&accuracies)?;

    Ok(EvalResult {
        folds: outcomes,
        summary,
        elapsed_secs: started.elapsed().as_secs_f64(),
    })
}

/// Add both images of every pair to the pipeline's training accumulator,
/// resolving identity labels through the run's label map. Undecodable
/// images are reported and skipped.
fn accumulate(
    pipeline: &mut VerificationPipeline,
    labels: &mut LabelMap,
    source: &impl ImageSource,
    examples: &[PairExample],
) {
    for example in examples {
        for path in [&example.image1, &example.image2] {
            let label = labels.get(path);
            match source.load(path) {
                Ok(img) => pipeline.add_training(&img, label),
                Err(err) => {
                    tracing::warn!(path = %path, error = %err, "skipping training image");
                }
            }
        }
    }
}

/// Score one fold. Pairs with an undecodable image are reported and
/// excluded from the counts.
fn evaluate_fold(
    pipeline: &VerificationPipeline,
    source: &impl ImageSource,
    fold_idx: usize,
    examples: &[PairExample],
) -> Result<FoldOutcome> {
    let mut outcome = FoldOutcome::new(fold_idx);

    for example in examples {
        let img1 = match source.load(&example.image1) {
            Ok(img) => img,
            Err(err) => {
                tracing::warn!(path = %example.image1, error = %err, "skipping pair");
                continue;
            }
        };
        let img2 = match source.load(&example.image2) {
            Ok(img) => img,
            Err(err) => {
                tracing::warn!(path = %example.image2, error = %err, "skipping pair");
                continue;
            }
        };

        let score = pipeline.same(&img1, &img2)?;
        outcome.record(score > 0.0, example.same);
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use facebench_core::{
        ExtractorKind, LandmarkFinder, LandmarkStrategy, PreprocessMode, Preprocessor,
        ReductorKind, VerifierKind,
    };
    use std::cell::RefCell;

    /// Synthetic source: each identity maps to a distinct flat intensity,
    /// with a small per-image offset. Paths listed in `broken` fail to load.
    struct SyntheticSource {
        broken: Vec<String>,
        loads: RefCell<usize>,
    }

    impl SyntheticSource {
        fn new() -> Self {
            Self { broken: Vec::new(), loads: RefCell::new(0) }
        }

        fn with_broken(paths: &[&str]) -> Self {
            Self {
                broken: paths.iter().map(|s| s.to_string()).collect(),
                loads: RefCell::new(0),
            }
        }
    }

    impl ImageSource for SyntheticSource {
        fn load(&self, relative: &str) -> Result<GrayImage, LoadError> {
            *self.loads.borrow_mut() += 1;
            if self.broken.iter().any(|b| b == relative) {
                return Err(LoadError::BadGeometry { path: relative.into() });
            }

            let identity = relative.split('/').next().unwrap_or("");
            let base = match identity {
                "alice" => 40u32,
                "bob" => 120,
                "carol" => 200,
                _ => 0,
            };
            let variant: u32 = relative
                .chars()
                .filter(|c| c.is_ascii_digit())
                .fold(0, |acc, c| acc * 10 + c.to_digit(10).unwrap())
                % 4;
            let value = (base + variant).min(255) as u8;
            Ok(GrayImage::from_fn(100, 100, move |_, _| value))
        }
    }

    fn pair(name1: &str, idx1: u32, name2: &str, idx2: u32) -> PairExample {
        PairExample {
            image1: format!("{name1}/{name1}_{idx1:04}.jpg"),
            image2: format!("{name2}/{name2}_{idx2:04}.jpg"),
            same: name1 == name2,
        }
    }

    fn dataset() -> LfwDataset {
        LfwDataset {
            train: vec![
                pair("alice", 1, "alice", 2),
                pair("bob", 1, "bob", 2),
                pair("alice", 3, "bob", 3),
                pair("bob", 1, "carol", 1),
            ],
            folds: vec![
                vec![
                    pair("alice", 1, "alice", 3),
                    pair("carol", 1, "carol", 2),
                    pair("alice", 2, "carol", 1),
                ],
                vec![
                    pair("bob", 2, "bob", 3),
                    pair("alice", 1, "bob", 1),
                    pair("carol", 2, "bob", 2),
                ],
            ],
        }
    }

    fn pipeline() -> VerificationPipeline {
        let finder = LandmarkFinder::new(LandmarkStrategy::Table, 0);
        VerificationPipeline::new(
            Preprocessor::new(PreprocessMode::None, 80, finder),
            ExtractorKind::Pixels,
            ReductorKind::None,
            VerifierKind::L2,
            false,
        )
    }

    #[test]
    fn test_dev_protocol_perfect_separation() {
        let data = dataset();
        let source = SyntheticSource::new();
        let mut p = pipeline();

        let result = run(&data, &source, &mut p, Protocol::Dev).unwrap();
        assert_eq!(result.folds.len(), 2);
        for outcome in &result.folds {
            assert_eq!(outcome.total(), 3);
            assert_eq!(outcome.incorrect, 0, "fold {}", outcome.fold);
        }
        assert!((result.summary.mean - 1.0).abs() < 1e-9);
        assert_eq!(result.summary.std_err, 0.0);
    }

    #[test]
    fn test_split_protocol_runs_all_folds() {
        let data = dataset();
        let source = SyntheticSource::new();
        let mut p = pipeline();

        let result = run(&data, &source, &mut p, Protocol::Split).unwrap();
        assert_eq!(result.folds.len(), 2);
        for outcome in &result.folds {
            assert_eq!(outcome.total(), 3);
            assert_eq!(outcome.incorrect, 0);
        }
    }

    #[test]
    fn test_dev_trains_exactly_once() {
        let data = dataset();
        let source = SyntheticSource::new();
        let mut p = pipeline();

        run(&data, &source, &mut p, Protocol::Dev).unwrap();
        // One model for the whole run: nothing accumulated after it.
        assert_eq!(p.pending_training_rows(), 0);
        assert!(p.is_trained());

        // Training loads: 4 pairs × 2 images; evaluation: 6 pairs × 2.
        assert_eq!(*source.loads.borrow(), 8 + 12);
    }

    #[test]
    fn test_split_retrains_per_fold() {
        let data = dataset();
        let source = SyntheticSource::new();
        let mut p = pipeline();

        run(&data, &source, &mut p, Protocol::Split).unwrap();
        // Per fold: 3 pairs × 2 images of training from the other fold,
        // plus 3 pairs × 2 for evaluation → (6 + 6) × 2 folds. The dev
        // train list is never touched.
        assert_eq!(*source.loads.borrow(), 24);
    }

    #[test]
    fn test_decode_failure_skips_pair() {
        let data = dataset();
        let source = SyntheticSource::with_broken(&["carol/carol_0002.jpg"]);
        let mut p = pipeline();

        let result = run(&data, &source, &mut p, Protocol::Dev).unwrap();
        // Fold 0 loses its carol/carol pair; fold 1 loses carol/bob.
        assert_eq!(result.folds[0].total(), 2);
        assert_eq!(result.folds[1].total(), 2);
    }

    #[test]
    fn test_fold_with_no_usable_examples_is_fatal() {
        let mut data = dataset();
        data.folds[1] = vec![pair("alice", 1, "carol", 9)];
        let source = SyntheticSource::with_broken(&["carol/carol_0009.jpg"]);
        let mut p = pipeline();

        assert!(run(&data, &source, &mut p, Protocol::Dev).is_err());
    }

    #[test]
    fn test_degenerate_training_is_fatal() {
        let mut data = dataset();
        // Single identity in training: no between-class pairs to fit on.
        data.train = vec![pair("alice", 1, "alice", 2), pair("alice", 3, "alice", 4)];
        let source = SyntheticSource::new();
        let mut p = pipeline();

        assert!(run(&data, &source, &mut p, Protocol::Dev).is_err());
    }
}
