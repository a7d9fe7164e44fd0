//! The end-to-end verification pipeline: preprocess → extract → reduce →
//! classify.
//!
//! Training is a two-phase state machine: descriptors accumulate in a
//! [`TrainingSet`] builder, and [`VerificationPipeline::train`] takes the
//! builder's contents (leaving it empty) to fit the reductor and the
//! verifier. Accumulated rows can therefore never be consumed twice.

use crate::extract::ExtractorKind;
use crate::image::GrayImage;
use crate::preprocess::Preprocessor;
use crate::reduce::{ReduceError, Reductor, ReductorKind};
use crate::verify::{Verifier, VerifierError, VerifierKind};
use ndarray::Array2;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("reductor: {0}")]
    Reduce(#[from] ReduceError),
    #[error("verifier: {0}")]
    Verify(#[from] VerifierError),
    #[error("pipeline is not trained")]
    NotTrained,
}

/// Accumulated (descriptor, label) observations awaiting a training pass.
#[derive(Debug, Default)]
pub struct TrainingSet {
    rows: Vec<Vec<f32>>,
    labels: Vec<i32>,
}

impl TrainingSet {
    fn push(&mut self, descriptor: Vec<f32>, label: i32) {
        self.rows.push(descriptor);
        self.labels.push(label);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Stack the rows into a matrix. `None` when empty.
    fn into_matrix(self) -> Option<(Array2<f32>, Vec<i32>)> {
        let rows = self.rows.len();
        let cols = self.rows.first()?.len();
        let flat: Vec<f32> = self.rows.into_iter().flatten().collect();
        let matrix = Array2::from_shape_vec((rows, cols), flat).ok()?;
        Some((matrix, self.labels))
    }
}

/// Configured verification pipeline.
pub struct VerificationPipeline {
    preprocessor: Preprocessor,
    extractor: ExtractorKind,
    reductor_kind: ReductorKind,
    reductor: Option<Reductor>,
    verifier: Verifier,
    flip: bool,
    training: TrainingSet,
}

impl VerificationPipeline {
    pub fn new(
        preprocessor: Preprocessor,
        extractor: ExtractorKind,
        reductor_kind: ReductorKind,
        verifier_kind: VerifierKind,
        flip: bool,
    ) -> Self {
        Self {
            preprocessor,
            extractor,
            reductor_kind,
            reductor: None,
            verifier: Verifier::new(verifier_kind),
            flip,
            training: TrainingSet::default(),
        }
    }

    /// Number of accumulated training rows.
    pub fn pending_training_rows(&self) -> usize {
        self.training.len()
    }

    pub fn is_trained(&self) -> bool {
        self.reductor.is_some() && self.verifier.is_trained()
    }

    /// Raw (pre-reduction) descriptor for one image.
    fn raw_descriptor(&self, img: &GrayImage) -> Vec<f32> {
        self.extractor.extract(&self.preprocessor.process(img))
    }

    /// Accumulate one labeled training image. With flip augmentation on,
    /// the mirrored image is added under the same label.
    pub fn add_training(&mut self, img: &GrayImage, label: i32) {
        let descriptor = self.raw_descriptor(img);
        self.training.push(descriptor, label);

        if self.flip {
            let flipped = self.raw_descriptor(&img.flip_horizontal());
            self.training.push(flipped, label);
        }
    }

    /// Consume the accumulated training set: fit the reductor on the raw
    /// descriptor matrix, reduce every row, train the verifier. The
    /// accumulator is left empty whether or not training succeeds; a failed
    /// training pass leaves the pipeline untrained.
    pub fn train(&mut self) -> Result<(), PipelineError> {
        self.reductor = None;

        let training = std::mem::take(&mut self.training);
        let row_count = training.len();
        let (raw, labels) = training
            .into_matrix()
            .ok_or(ReduceError::EmptyTrainingSet)?;

        let reductor = Reductor::fit(self.reductor_kind, &raw)?;

        let reduced_cols = reductor.output_len(raw.ncols());
        let mut reduced = Array2::<f32>::zeros((raw.nrows(), reduced_cols));
        for (i, row) in raw.outer_iter().enumerate() {
            let r = reductor.reduce(&row.to_vec())?;
            reduced.row_mut(i).assign(&ndarray::Array1::from(r));
        }

        self.verifier.train(&reduced, &labels)?;
        self.reductor = Some(reductor);

        tracing::debug!(
            rows = row_count,
            raw_len = raw.ncols(),
            reduced_len = reduced_cols,
            "pipeline trained"
        );
        Ok(())
    }

    /// Score an image pair: positive means "same identity".
    pub fn same(&self, a: &GrayImage, b: &GrayImage) -> Result<f32, PipelineError> {
        let reductor = self.reductor.as_ref().ok_or(PipelineError::NotTrained)?;

        let da = reductor.reduce(&self.raw_descriptor(a))?;
        let db = reductor.reduce(&self.raw_descriptor(b))?;
        Ok(self.verifier.same(&da, &db)?)
    }
}
