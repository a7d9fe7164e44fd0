//! Fiducial landmark providers.
//!
//! Every strategy returns the same 20 points in the same order, so
//! downstream feature code can index them positionally. The parts-based
//! detector refines the reference table against local gradient evidence and
//! may return nothing on degenerate input; [`LandmarkFinder`] then falls
//! back to the constant table (fallback order: detector → table).

use crate::image::GrayImage;

/// Size of the image the reference table was measured on.
pub const REFERENCE_SIZE: usize = 90;

/// Number of landmarks every strategy returns.
pub const LANDMARK_COUNT: usize = 20;

/// Half-width of the detector's per-point search window, in reference pixels.
const SEARCH_RADIUS: i32 = 4;

/// Minimum mean gradient magnitude for the detector to trust its evidence.
const MIN_GRADIENT_ENERGY: f32 = 1.0;

/// 20 fiducial points measured on the mean LFW face at 90x90:
/// brow outer/inner pairs, eye corners, eye centers, nose sides, cheeks,
/// jaw sides, mouth corners, chin sides, under-eye pair.
pub const REFERENCE_TABLE: [(f32, f32); LANDMARK_COUNT] = [
    (15.0, 19.0),
    (75.0, 19.0),
    (29.0, 20.0),
    (61.0, 20.0),
    (36.0, 24.0),
    (54.0, 24.0),
    (38.0, 35.0),
    (52.0, 35.0),
    (30.0, 39.0),
    (60.0, 39.0),
    (19.0, 39.0),
    (71.0, 39.0),
    (12.0, 38.0),
    (77.0, 38.0),
    (40.0, 64.0),
    (50.0, 64.0),
    (31.0, 75.0),
    (59.0, 75.0),
    (32.0, 49.0),
    (59.0, 49.0),
];

/// Landmark extraction strategy, selected at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkStrategy {
    /// The constant reference table, scaled when the image is not 90x90.
    Table,
    /// Parts-based refinement of the table against local gradient energy.
    Detector,
}

/// Configured landmark provider: strategy plus an edge clamp margin.
#[derive(Debug, Clone, Copy)]
pub struct LandmarkFinder {
    strategy: LandmarkStrategy,
    /// Minimum distance from the image border, in pixels of the target image.
    clamp_margin: usize,
}

impl LandmarkFinder {
    pub fn new(strategy: LandmarkStrategy, clamp_margin: usize) -> Self {
        Self { strategy, clamp_margin }
    }

    /// Extract the fixed ordered landmark set for `img`.
    ///
    /// Always returns exactly [`LANDMARK_COUNT`] points: when the detector
    /// strategy yields no points, the constant table is used instead.
    pub fn extract(&self, img: &GrayImage) -> Vec<(f32, f32)> {
        let points = match self.strategy {
            LandmarkStrategy::Table => scaled_table(img),
            LandmarkStrategy::Detector => {
                let detected = detect_parts(img);
                if detected.is_empty() {
                    tracing::debug!("landmark detector returned no points, using reference table");
                    scaled_table(img)
                } else {
                    detected
                }
            }
        };

        points
            .into_iter()
            .map(|(x, y)| self.clamp(img, x, y))
            .collect()
    }

    fn clamp(&self, img: &GrayImage, x: f32, y: f32) -> (f32, f32) {
        let m = self.clamp_margin as f32;
        let max_x = (img.width() as f32 - 1.0 - m).max(m);
        let max_y = (img.height() as f32 - 1.0 - m).max(m);
        (x.clamp(m, max_x), y.clamp(m, max_y))
    }
}

/// Reference table scaled to the image size.
fn scaled_table(img: &GrayImage) -> Vec<(f32, f32)> {
    let scale_x = img.width() as f32 / REFERENCE_SIZE as f32;
    let scale_y = img.height() as f32 / REFERENCE_SIZE as f32;
    REFERENCE_TABLE
        .iter()
        .map(|&(x, y)| (x * scale_x, y * scale_y))
        .collect()
}

/// Gradient magnitude at (x, y) via central differences.
fn gradient_magnitude(img: &GrayImage, x: i32, y: i32) -> f32 {
    let gx = img.get_clamped(x + 1, y) as f32 - img.get_clamped(x - 1, y) as f32;
    let gy = img.get_clamped(x, y + 1) as f32 - img.get_clamped(x, y - 1) as f32;
    (gx * gx + gy * gy).sqrt()
}

/// Parts-based detection: for each reference point, pick the position inside
/// a local search window with the strongest gradient response. Returns an
/// empty vector when the image carries too little gradient evidence to
/// anchor the parts (e.g. a flat frame), signalling the caller to fall back.
fn detect_parts(img: &GrayImage) -> Vec<(f32, f32)> {
    let scale_x = img.width() as f32 / REFERENCE_SIZE as f32;
    let scale_y = img.height() as f32 / REFERENCE_SIZE as f32;
    let radius_x = ((SEARCH_RADIUS as f32 * scale_x).round() as i32).max(1);
    let radius_y = ((SEARCH_RADIUS as f32 * scale_y).round() as i32).max(1);

    let mut points = Vec::with_capacity(LANDMARK_COUNT);
    let mut total_energy = 0.0f32;

    for &(rx, ry) in REFERENCE_TABLE.iter() {
        let cx = (rx * scale_x).round() as i32;
        let cy = (ry * scale_y).round() as i32;

        let mut best = (cx, cy);
        let mut best_mag = -1.0f32;
        for dy in -radius_y..=radius_y {
            for dx in -radius_x..=radius_x {
                let mag = gradient_magnitude(img, cx + dx, cy + dy);
                if mag > best_mag {
                    best_mag = mag;
                    best = (cx + dx, cy + dy);
                }
            }
        }

        total_energy += best_mag;
        points.push((best.0 as f32, best.1 as f32));
    }

    if total_energy / (LANDMARK_COUNT as f32) < MIN_GRADIENT_ENERGY {
        return Vec::new();
    }

    points
}
