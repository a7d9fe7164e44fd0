//! facebench-core — face verification pipeline.
//!
//! Preprocessing, fiducial landmarks, texture descriptors, dimensionality
//! reduction and pair classification, plus the label map and fold statistics
//! the evaluation protocol needs. All numeric routines are explicit; there
//! is no model inference here.

pub mod extract;
pub mod image;
pub mod labels;
pub mod landmarks;
pub mod pipeline;
pub mod preprocess;
pub mod reduce;
pub mod stats;
pub mod verify;

pub use extract::ExtractorKind;
pub use image::GrayImage;
pub use labels::LabelMap;
pub use landmarks::{LandmarkFinder, LandmarkStrategy};
pub use pipeline::{PipelineError, VerificationPipeline};
pub use preprocess::{PreprocessMode, Preprocessor};
pub use reduce::ReductorKind;
pub use stats::{FoldOutcome, StatsError, Summary};
pub use verify::VerifierKind;
