//! Single-channel image buffer and the pixel-level operations the
//! verification pipeline needs: clamped sampling, bilinear resize,
//! center crop, horizontal flip.

/// Grayscale image: row-major `u8` intensities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayImage {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl GrayImage {
    /// Wrap an existing row-major buffer. Returns `None` when the buffer
    /// length does not match `width * height`.
    pub fn from_raw(data: Vec<u8>, width: usize, height: usize) -> Option<Self> {
        if data.len() != width * height {
            return None;
        }
        Some(Self { data, width, height })
    }

    /// Build an image from a per-pixel function.
    pub fn from_fn(width: usize, height: usize, f: impl Fn(usize, usize) -> u8) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self { data, width, height }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Pixel at (x, y). Panics on out-of-bounds; use [`get_clamped`](Self::get_clamped)
    /// for sampling near edges.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    /// Pixel at (x, y) with coordinates clamped to the image bounds.
    #[inline]
    pub fn get_clamped(&self, x: i32, y: i32) -> u8 {
        let x = x.clamp(0, self.width as i32 - 1) as usize;
        let y = y.clamp(0, self.height as i32 - 1) as usize;
        self.data[y * self.width + x]
    }

    /// Sample at sub-pixel coordinates with bilinear interpolation.
    pub fn sample_bilinear(&self, x: f32, y: f32) -> f32 {
        let x0 = x.floor() as i32;
        let y0 = y.floor() as i32;
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;

        let tl = self.get_clamped(x0, y0) as f32;
        let tr = self.get_clamped(x0 + 1, y0) as f32;
        let bl = self.get_clamped(x0, y0 + 1) as f32;
        let br = self.get_clamped(x0 + 1, y0 + 1) as f32;

        tl * (1.0 - fx) * (1.0 - fy)
            + tr * fx * (1.0 - fy)
            + bl * (1.0 - fx) * fy
            + br * fx * fy
    }

    /// Resize with bilinear interpolation, pixel-center aligned.
    pub fn resize(&self, new_width: usize, new_height: usize) -> GrayImage {
        if new_width == self.width && new_height == self.height {
            return self.clone();
        }

        let scale_x = self.width as f32 / new_width as f32;
        let scale_y = self.height as f32 / new_height as f32;

        GrayImage::from_fn(new_width, new_height, |x, y| {
            let src_x = (x as f32 + 0.5) * scale_x - 0.5;
            let src_y = (y as f32 + 0.5) * scale_y - 0.5;
            self.sample_bilinear(src_x, src_y).round().clamp(0.0, 255.0) as u8
        })
    }

    /// Remove `margin` pixels from every border. A margin too large for the
    /// image degenerates to a 1x1 crop rather than panicking.
    pub fn crop_border(&self, margin: usize) -> GrayImage {
        let margin_x = margin.min((self.width - 1) / 2);
        let margin_y = margin.min((self.height - 1) / 2);
        let new_w = self.width - 2 * margin_x;
        let new_h = self.height - 2 * margin_y;

        GrayImage::from_fn(new_w, new_h, |x, y| self.get(x + margin_x, y + margin_y))
    }

    /// Mirror around the vertical axis.
    pub fn flip_horizontal(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            self.get(self.width - 1 - x, y)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_length_mismatch() {
        assert!(GrayImage::from_raw(vec![0u8; 10], 3, 3).is_none());
        assert!(GrayImage::from_raw(vec![0u8; 9], 3, 3).is_some());
    }

    #[test]
    fn test_get_clamped_edges() {
        let img = GrayImage::from_fn(4, 4, |x, y| (y * 4 + x) as u8);
        assert_eq!(img.get_clamped(-5, 0), img.get(0, 0));
        assert_eq!(img.get_clamped(10, 10), img.get(3, 3));
    }

    #[test]
    fn test_resize_uniform_stays_uniform() {
        let img = GrayImage::from_fn(100, 100, |_, _| 128);
        let out = img.resize(37, 53);
        assert_eq!(out.width(), 37);
        assert_eq!(out.height(), 53);
        assert!(out.as_slice().iter().all(|&p| p == 128));
    }

    #[test]
    fn test_resize_identity() {
        let img = GrayImage::from_fn(8, 8, |x, y| (x * y) as u8);
        let out = img.resize(8, 8);
        assert_eq!(out, img);
    }

    #[test]
    fn test_crop_border_size() {
        let img = GrayImage::from_fn(250, 250, |_, _| 0);
        let out = img.crop_border(80);
        assert_eq!(out.width(), 90);
        assert_eq!(out.height(), 90);
    }

    #[test]
    fn test_crop_border_content() {
        let img = GrayImage::from_fn(10, 10, |x, y| (y * 10 + x) as u8);
        let out = img.crop_border(2);
        assert_eq!(out.width(), 6);
        assert_eq!(out.get(0, 0), img.get(2, 2));
        assert_eq!(out.get(5, 5), img.get(7, 7));
    }

    #[test]
    fn test_crop_border_oversized_margin() {
        let img = GrayImage::from_fn(5, 5, |_, _| 7);
        let out = img.crop_border(100);
        assert_eq!(out.width(), 1);
        assert_eq!(out.height(), 1);
    }

    #[test]
    fn test_flip_horizontal() {
        let img = GrayImage::from_fn(3, 1, |x, _| x as u8);
        let out = img.flip_horizontal();
        assert_eq!(out.as_slice(), &[2, 1, 0]);
    }

    #[test]
    fn test_flip_involution() {
        let img = GrayImage::from_fn(7, 5, |x, y| (x * 31 + y * 7) as u8);
        assert_eq!(img.flip_horizontal().flip_horizontal(), img);
    }
}
