//! Face preprocessing: canonical resize, optional photometric or geometric
//! normalization, border crop.
//!
//! Geometric normalization estimates a 4-DOF similarity transform (scale,
//! rotation, translation) from the detected fiducials to the reference table
//! by least squares, then warps with bilinear interpolation.

use crate::image::GrayImage;
use crate::landmarks::{LandmarkFinder, REFERENCE_SIZE, REFERENCE_TABLE};

/// Side length every image is brought to before the border crop (LFW images
/// are 250x250).
pub const CANONICAL_SIZE: usize = 250;

/// Tan-Triggs gamma exponent.
const GAMMA: f32 = 0.2;

/// Preprocessing mode, selected by index on the command surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreprocessMode {
    /// Canonical resize + crop only.
    None,
    /// Global histogram equalization.
    Equalize,
    /// Tan-Triggs style illumination normalization (gamma + difference of
    /// blurs + contrast rescale).
    TanTriggs,
    /// Similarity warp of detected fiducials onto the reference table.
    Align,
}

impl PreprocessMode {
    pub const ALL: [PreprocessMode; 4] = [
        PreprocessMode::None,
        PreprocessMode::Equalize,
        PreprocessMode::TanTriggs,
        PreprocessMode::Align,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            PreprocessMode::None => "none",
            PreprocessMode::Equalize => "eqhist",
            PreprocessMode::TanTriggs => "tan",
            PreprocessMode::Align => "align",
        }
    }
}

/// Configured preprocessor: mode + border crop margin.
///
/// Output size is `CANONICAL_SIZE - 2 * crop_margin` square, independent of
/// the input size.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    mode: PreprocessMode,
    crop_margin: usize,
    finder: LandmarkFinder,
}

impl Preprocessor {
    pub fn new(mode: PreprocessMode, crop_margin: usize, finder: LandmarkFinder) -> Self {
        Self { mode, crop_margin, finder }
    }

    /// Side length of the images this preprocessor produces.
    pub fn output_size(&self) -> usize {
        let margin = self.crop_margin.min((CANONICAL_SIZE - 1) / 2);
        CANONICAL_SIZE - 2 * margin
    }

    /// Normalize a raw grayscale face into the canonical cropped form.
    pub fn process(&self, img: &GrayImage) -> GrayImage {
        let canonical = img.resize(CANONICAL_SIZE, CANONICAL_SIZE);

        let canonical = if self.mode == PreprocessMode::Align {
            let points = self.finder.extract(&canonical);
            match align_to_reference(&canonical, &points) {
                Some(aligned) => aligned,
                None => {
                    // No usable fiducials: keep the unaligned canonical crop.
                    tracing::debug!("alignment skipped, no landmark points");
                    canonical
                }
            }
        } else {
            canonical
        };

        let cropped = canonical.crop_border(self.crop_margin);

        match self.mode {
            PreprocessMode::Equalize => equalize_hist(&cropped),
            PreprocessMode::TanTriggs => tan_triggs(&cropped),
            PreprocessMode::None | PreprocessMode::Align => cropped,
        }
    }
}

/// Warp `img` so `points` land on the reference table positions (scaled to
/// the image size). Returns `None` when the point set is empty or does not
/// match the reference cardinality.
pub fn align_to_reference(img: &GrayImage, points: &[(f32, f32)]) -> Option<GrayImage> {
    if points.is_empty() || points.len() != REFERENCE_TABLE.len() {
        return None;
    }

    let scale_x = img.width() as f32 / REFERENCE_SIZE as f32;
    let scale_y = img.height() as f32 / REFERENCE_SIZE as f32;
    let reference: Vec<(f32, f32)> = REFERENCE_TABLE
        .iter()
        .map(|&(x, y)| (x * scale_x, y * scale_y))
        .collect();

    let matrix = estimate_similarity_transform(points, &reference)?;
    Some(warp_similarity(img, &matrix))
}

/// Estimate a 2x3 similarity transform (4-DOF) from `src` to `dst` by least
/// squares. Returns `[a, -b, tx, b, a, ty]` for the matrix
/// `| a -b tx ; b a ty |`, or `None` for degenerate input.
pub fn estimate_similarity_transform(
    src: &[(f32, f32)],
    dst: &[(f32, f32)],
) -> Option<[f32; 6]> {
    if src.len() != dst.len() || src.len() < 2 {
        return None;
    }

    // Normal equations A^T A x = A^T b for x = [a, b, tx, ty]:
    //   sx * a - sy * b + tx = dx
    //   sy * a + sx * b + ty = dy
    let mut ata = [0.0f32; 16];
    let mut atb = [0.0f32; 4];

    for (&(sx, sy), &(dx, dy)) in src.iter().zip(dst.iter()) {
        let r1 = [sx, -sy, 1.0, 0.0];
        let r2 = [sy, sx, 0.0, 1.0];

        for j in 0..4 {
            for k in 0..4 {
                ata[j * 4 + k] += r1[j] * r1[k] + r2[j] * r2[k];
            }
            atb[j] += r1[j] * dx + r2[j] * dy;
        }
    }

    let x = solve_4x4(&ata, &atb)?;
    let (a, b, tx, ty) = (x[0], x[1], x[2], x[3]);
    Some([a, -b, tx, b, a, ty])
}

/// Solve a 4x4 linear system by Gaussian elimination with partial pivoting.
#[allow(clippy::needless_range_loop)]
fn solve_4x4(ata: &[f32; 16], atb: &[f32; 4]) -> Option<[f32; 4]> {
    let mut m = [[0.0f32; 5]; 4];
    for i in 0..4 {
        for j in 0..4 {
            m[i][j] = ata[i * 4 + j];
        }
        m[i][4] = atb[i];
    }

    for col in 0..4 {
        let mut max_row = col;
        let mut max_val = m[col][col].abs();
        for row in (col + 1)..4 {
            if m[row][col].abs() > max_val {
                max_val = m[row][col].abs();
                max_row = row;
            }
        }
        m.swap(col, max_row);

        let pivot = m[col][col];
        if pivot.abs() < 1e-12 {
            return None;
        }

        for row in (col + 1)..4 {
            let factor = m[row][col] / pivot;
            for j in col..5 {
                m[row][j] -= factor * m[col][j];
            }
        }
    }

    let mut x = [0.0f32; 4];
    for i in (0..4).rev() {
        x[i] = m[i][4];
        for j in (i + 1)..4 {
            x[i] -= m[i][j] * x[j];
        }
        x[i] /= m[i][i];
    }

    Some(x)
}

/// Apply the similarity transform, sampling the source with bilinear
/// interpolation. Output has the same size as the input.
fn warp_similarity(img: &GrayImage, matrix: &[f32; 6]) -> GrayImage {
    let (a, tx) = (matrix[0], matrix[2]);
    let (b, ty) = (matrix[3], matrix[5]);

    // Invert the 2x2 part: M = [[a, -b], [b, a]], det = a^2 + b^2.
    let det = a * a + b * b;
    if det.abs() < 1e-12 {
        return img.clone();
    }
    let ia = a / det;
    let ib = b / det;

    GrayImage::from_fn(img.width(), img.height(), |ox, oy| {
        let dx = ox as f32 - tx;
        let dy = oy as f32 - ty;
        let sx = ia * dx + ib * dy;
        let sy = -ib * dx + ia * dy;
        img.sample_bilinear(sx, sy).round().clamp(0.0, 255.0) as u8
    })
}

/// Global histogram equalization over the 256-level intensity range.
fn equalize_hist(img: &GrayImage) -> GrayImage {
    let total = img.width() * img.height();
    let mut hist = [0usize; 256];
    for &p in img.as_slice() {
        hist[p as usize] += 1;
    }

    let mut cdf = [0usize; 256];
    let mut acc = 0usize;
    for (i, &h) in hist.iter().enumerate() {
        acc += h;
        cdf[i] = acc;
    }

    let cdf_min = cdf.iter().copied().find(|&c| c > 0).unwrap_or(0);
    let denom = total.saturating_sub(cdf_min).max(1);

    let lut: Vec<u8> = cdf
        .iter()
        .map(|&c| ((c.saturating_sub(cdf_min)) as f32 / denom as f32 * 255.0).round() as u8)
        .collect();

    GrayImage::from_fn(img.width(), img.height(), |x, y| lut[img.get(x, y) as usize])
}

/// Tan-Triggs style illumination normalization: gamma compression, difference
/// of box blurs (small minus large), then rescale to the full intensity range.
fn tan_triggs(img: &GrayImage) -> GrayImage {
    let w = img.width();
    let h = img.height();

    let gamma: Vec<f32> = img
        .as_slice()
        .iter()
        .map(|&p| (p as f32 / 255.0).powf(GAMMA))
        .collect();

    let narrow = box_blur(&gamma, w, h, 1);
    let wide = box_blur(&gamma, w, h, 3);
    let dog: Vec<f32> = narrow.iter().zip(wide.iter()).map(|(n, v)| n - v).collect();

    let min = dog.iter().copied().fold(f32::INFINITY, f32::min);
    let max = dog.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = (max - min).max(1e-6);

    let data: Vec<u8> = dog
        .iter()
        .map(|&v| (((v - min) / range) * 255.0).round() as u8)
        .collect();

    GrayImage::from_raw(data, w, h).unwrap_or_else(|| img.clone())
}

/// Box blur with the given radius, edge-clamped.
fn box_blur(data: &[f32], w: usize, h: usize, radius: i32) -> Vec<f32> {
    let mut out = vec![0.0f32; w * h];
    let norm = ((2 * radius + 1) * (2 * radius + 1)) as f32;

    for y in 0..h as i32 {
        for x in 0..w as i32 {
            let mut sum = 0.0f32;
            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    let sx = (x + dx).clamp(0, w as i32 - 1) as usize;
                    let sy = (y + dy).clamp(0, h as i32 - 1) as usize;
                    sum += data[sy * w + sx];
                }
            }
            out[y as usize * w + x as usize] = sum / norm;
        }
    }

    out
}
