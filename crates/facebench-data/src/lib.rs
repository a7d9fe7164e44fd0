//! facebench-data — dataset collaborators for the verification benchmark.
//!
//! Parses the LFW pairs protocol files and decodes face images to
//! grayscale. Parsing is pure over `&str`; only [`LfwDataset::load`] and
//! [`load_gray`] touch the filesystem.

pub mod loader;
pub mod pairs;

pub use loader::{load_gray, LoadError};
pub use pairs::{DatasetError, LfwDataset, PairExample};
