//! Grayscale image loading for the evaluation pipeline.

use facebench_core::GrayImage;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("cannot decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("unsupported image geometry for {path}")]
    BadGeometry { path: PathBuf },
}

/// Decode the file at `path` into a single-channel image.
pub fn load_gray(path: &Path) -> Result<GrayImage, LoadError> {
    let decoded = image::open(path).map_err(|source| LoadError::Decode {
        path: path.to_path_buf(),
        source,
    })?;

    let luma = decoded.to_luma8();
    let (width, height) = luma.dimensions();

    GrayImage::from_raw(luma.into_raw(), width as usize, height as usize)
        .ok_or_else(|| LoadError::BadGeometry { path: path.to_path_buf() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_decode_error() {
        let err = load_gray(Path::new("/nonexistent/face.jpg")).unwrap_err();
        assert!(matches!(err, LoadError::Decode { .. }));
    }
}
