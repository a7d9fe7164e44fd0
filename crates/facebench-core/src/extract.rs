//! Texture descriptor extractors.
//!
//! A closed family of variants behind one enum, selected by index from the
//! command surface. Every variant is a pure function of the preprocessed
//! image: deterministic, no state between calls, fixed descriptor length for
//! a fixed input size.

use crate::image::GrayImage;

/// Cells per image side for the histogram-grid extractors.
const GRID_CELLS: usize = 8;

/// Orientation bins for the gradient extractor.
const GRAD_BINS: usize = 9;

/// Uniform-LBP bins: 58 uniform patterns + 1 catch-all.
const LBP_UNIFORM_BINS: usize = 59;

/// Local ternary pattern threshold.
const LTP_THRESHOLD: i16 = 5;

/// Descriptor extractor variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorKind {
    /// Raw intensities scaled to [0, 1].
    Pixels,
    /// 256-bin local binary pattern histograms on a cell grid.
    Lbp,
    /// 59-bin uniform-LBP histograms on a cell grid.
    LbpUniform,
    /// Local ternary patterns, two 256-bin channels per cell.
    Ltp,
    /// Gradient orientation histograms on a cell grid.
    Grad,
}

impl ExtractorKind {
    pub const ALL: [ExtractorKind; 5] = [
        ExtractorKind::Pixels,
        ExtractorKind::Lbp,
        ExtractorKind::LbpUniform,
        ExtractorKind::Ltp,
        ExtractorKind::Grad,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExtractorKind::Pixels => "pixels",
            ExtractorKind::Lbp => "lbp",
            ExtractorKind::LbpUniform => "lbp_u",
            ExtractorKind::Ltp => "ltp",
            ExtractorKind::Grad => "grad",
        }
    }

    /// Descriptor length for a square input of the given side length.
    pub fn descriptor_len(&self, image_size: usize) -> usize {
        match self {
            ExtractorKind::Pixels => image_size * image_size,
            ExtractorKind::Lbp => GRID_CELLS * GRID_CELLS * 256,
            ExtractorKind::LbpUniform => GRID_CELLS * GRID_CELLS * LBP_UNIFORM_BINS,
            ExtractorKind::Ltp => GRID_CELLS * GRID_CELLS * 512,
            ExtractorKind::Grad => GRID_CELLS * GRID_CELLS * GRAD_BINS,
        }
    }

    /// Extract the descriptor for a preprocessed image.
    pub fn extract(&self, img: &GrayImage) -> Vec<f32> {
        match self {
            ExtractorKind::Pixels => extract_pixels(img),
            ExtractorKind::Lbp => extract_lbp(img),
            ExtractorKind::LbpUniform => extract_lbp_uniform(img),
            ExtractorKind::Ltp => extract_ltp(img),
            ExtractorKind::Grad => extract_grad(img),
        }
    }
}

fn extract_pixels(img: &GrayImage) -> Vec<f32> {
    img.as_slice().iter().map(|&p| p as f32 / 255.0).collect()
}

/// 8-neighbor LBP code at (x, y), clockwise from the top-left neighbor.
#[inline]
fn lbp_code(img: &GrayImage, x: i32, y: i32) -> u8 {
    const OFFSETS: [(i32, i32); 8] = [
        (-1, -1), (0, -1), (1, -1), (1, 0),
        (1, 1), (0, 1), (-1, 1), (-1, 0),
    ];
    let center = img.get_clamped(x, y);
    let mut code = 0u8;
    for (bit, &(dx, dy)) in OFFSETS.iter().enumerate() {
        if img.get_clamped(x + dx, y + dy) >= center {
            code |= 1 << bit;
        }
    }
    code
}

/// Run `per_pixel` over every pixel of every grid cell, then L1-normalize
/// each cell histogram. `bins` is the histogram length per cell.
fn cell_histograms(
    img: &GrayImage,
    bins: usize,
    mut per_pixel: impl FnMut(i32, i32, &mut [f32]),
) -> Vec<f32> {
    let cell_w = img.width() / GRID_CELLS;
    let cell_h = img.height() / GRID_CELLS;
    let mut descriptor = vec![0.0f32; GRID_CELLS * GRID_CELLS * bins];

    for cy in 0..GRID_CELLS {
        for cx in 0..GRID_CELLS {
            let offset = (cy * GRID_CELLS + cx) * bins;
            let hist = &mut descriptor[offset..offset + bins];

            for y in 0..cell_h {
                for x in 0..cell_w {
                    per_pixel((cx * cell_w + x) as i32, (cy * cell_h + y) as i32, hist);
                }
            }

            let sum: f32 = hist.iter().sum();
            if sum > 0.0 {
                for v in hist.iter_mut() {
                    *v /= sum;
                }
            }
        }
    }

    descriptor
}

fn extract_lbp(img: &GrayImage) -> Vec<f32> {
    cell_histograms(img, 256, |x, y, hist| {
        hist[lbp_code(img, x, y) as usize] += 1.0;
    })
}

/// Map each LBP code to its uniform-pattern bin: codes with at most two
/// 0/1 transitions get their own bin, everything else shares the last one.
fn uniform_lut() -> [u8; 256] {
    let mut lut = [0u8; 256];
    let mut next_bin = 0u8;
    for code in 0..256usize {
        let c = code as u8;
        let transitions = (0..8)
            .filter(|&i| {
                let a = (c >> i) & 1;
                let b = (c >> ((i + 1) % 8)) & 1;
                a != b
            })
            .count();
        lut[code] = if transitions <= 2 {
            let bin = next_bin;
            next_bin += 1;
            bin
        } else {
            (LBP_UNIFORM_BINS - 1) as u8
        };
    }
    lut
}

fn extract_lbp_uniform(img: &GrayImage) -> Vec<f32> {
    let lut = uniform_lut();
    cell_histograms(img, LBP_UNIFORM_BINS, |x, y, hist| {
        hist[lut[lbp_code(img, x, y) as usize] as usize] += 1.0;
    })
}

/// Ternary codes at (x, y): (high, low) where high sets a bit when the
/// neighbor exceeds center + T and low when it falls below center - T.
#[inline]
fn ltp_codes(img: &GrayImage, x: i32, y: i32) -> (u8, u8) {
    const OFFSETS: [(i32, i32); 8] = [
        (-1, -1), (0, -1), (1, -1), (1, 0),
        (1, 1), (0, 1), (-1, 1), (-1, 0),
    ];
    let center = img.get_clamped(x, y) as i16;
    let mut high = 0u8;
    let mut low = 0u8;
    for (bit, &(dx, dy)) in OFFSETS.iter().enumerate() {
        let n = img.get_clamped(x + dx, y + dy) as i16;
        if n >= center + LTP_THRESHOLD {
            high |= 1 << bit;
        } else if n <= center - LTP_THRESHOLD {
            low |= 1 << bit;
        }
    }
    (high, low)
}

fn extract_ltp(img: &GrayImage) -> Vec<f32> {
    cell_histograms(img, 512, |x, y, hist| {
        let (high, low) = ltp_codes(img, x, y);
        hist[high as usize] += 1.0;
        hist[256 + low as usize] += 1.0;
    })
}

fn extract_grad(img: &GrayImage) -> Vec<f32> {
    cell_histograms(img, GRAD_BINS, |x, y, hist| {
        let gx = img.get_clamped(x + 1, y) as f32 - img.get_clamped(x - 1, y) as f32;
        let gy = img.get_clamped(x, y + 1) as f32 - img.get_clamped(x, y - 1) as f32;
        let mag = (gx * gx + gy * gy).sqrt();
        if mag > 0.0 {
            // Unsigned orientation in [0, pi).
            let angle = gy.atan2(gx).rem_euclid(std::f32::consts::PI);
            let bin = ((angle / std::f32::consts::PI) * GRAD_BINS as f32) as usize;
            hist[bin.min(GRAD_BINS - 1)] += mag;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_image() -> GrayImage {
        GrayImage::from_fn(90, 90, |x, y| ((x * 13 + y * 7) % 256) as u8)
    }

    #[test]
    fn test_descriptor_len_matches_extract() {
        let img = test_image();
        for kind in ExtractorKind::ALL {
            let d = kind.extract(&img);
            assert_eq!(d.len(), kind.descriptor_len(90), "{}", kind.name());
        }
    }

    #[test]
    fn test_constant_length_across_images() {
        let a = test_image();
        let b = GrayImage::from_fn(90, 90, |x, y| ((x + y * y) % 256) as u8);
        for kind in ExtractorKind::ALL {
            assert_eq!(kind.extract(&a).len(), kind.extract(&b).len(), "{}", kind.name());
        }
    }

    #[test]
    fn test_deterministic() {
        let img = test_image();
        for kind in ExtractorKind::ALL {
            assert_eq!(kind.extract(&img), kind.extract(&img), "{}", kind.name());
        }
    }

    #[test]
    fn test_pixels_scaling() {
        let img = GrayImage::from_fn(4, 4, |_, _| 255);
        let d = extract_pixels(&img);
        assert!(d.iter().all(|&v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_lbp_flat_image_single_code() {
        // Flat image: every neighbor == center, all comparisons are >=,
        // so every pixel gets code 0xFF.
        let img = GrayImage::from_fn(90, 90, |_, _| 100);
        let d = extract_lbp(&img);
        for cell in d.chunks(256) {
            assert!((cell[255] - 1.0).abs() < 1e-6);
            assert!(cell[..255].iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    fn test_cell_histograms_normalized() {
        let img = test_image();
        let d = extract_lbp(&img);
        for cell in d.chunks(256) {
            let sum: f32 = cell.iter().sum();
            assert!((sum - 1.0).abs() < 1e-4, "cell sum {sum}");
        }
    }

    #[test]
    fn test_uniform_lut_bin_count() {
        let lut = uniform_lut();
        let max_bin = lut.iter().max().copied().unwrap();
        assert_eq!(max_bin as usize, LBP_UNIFORM_BINS - 1);
        // Exactly 58 uniform patterns exist for 8 bits.
        let uniform_count = lut
            .iter()
            .filter(|&&b| (b as usize) < LBP_UNIFORM_BINS - 1)
            .count();
        assert_eq!(uniform_count, 58);
    }

    #[test]
    fn test_ltp_flat_image() {
        // Flat image: no neighbor crosses either threshold, both codes are 0.
        let img = GrayImage::from_fn(90, 90, |_, _| 100);
        let d = extract_ltp(&img);
        for cell in d.chunks(512) {
            assert!((cell[0] - 0.5).abs() < 1e-6);
            assert!((cell[256] - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_grad_flat_image_is_zero() {
        let img = GrayImage::from_fn(90, 90, |_, _| 100);
        let d = extract_grad(&img);
        assert!(d.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_grad_vertical_edges_single_bin() {
        // Vertical stripes: gradient is horizontal, orientation constant.
        let img = GrayImage::from_fn(90, 90, |x, _| if (x / 3) % 2 == 0 { 0 } else { 200 });
        let d = extract_grad(&img);
        for cell in d.chunks(GRAD_BINS) {
            let nonzero = cell.iter().filter(|&&v| v > 0.0).count();
            assert!(nonzero <= 1, "expected at most one orientation bin, got {nonzero}");
        }
    }

    #[test]
    fn test_from_index() {
        assert_eq!(ExtractorKind::from_index(0), Some(ExtractorKind::Pixels));
        assert_eq!(ExtractorKind::from_index(4), Some(ExtractorKind::Grad));
        assert_eq!(ExtractorKind::from_index(5), None);
    }
}
