use crate::error::{Error, Result};

/// Single-channel float image, samples in [0, 1], row-major.
///
/// This is the working surface of the whole feature pipeline: pyramids, DoG
/// stacks, gradient fields and masks are all `GrayImage`s.
#[derive(Debug, Clone)]
pub struct GrayImage {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl GrayImage {
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    pub fn from_raw(width: usize, height: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != width * height {
            return Err(Error::InvalidDimensions(format!(
                "Data size {} doesn't match {}x{}",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        debug_assert!(x < self.width && y < self.height);
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        debug_assert!(x < self.width && y < self.height);
        self.data[y * self.width + x] = value;
    }

    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[must_use]
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    #[must_use]
    pub fn row(&self, y: usize) -> &[f32] {
        &self.data[y * self.width..(y + 1) * self.width]
    }

    /// Pixelwise difference `self - other`.
    pub fn sub(&self, other: &GrayImage) -> Result<GrayImage> {
        if self.width != other.width || self.height != other.height {
            return Err(Error::InvalidDimensions(
                "Cannot subtract images with different sizes".to_string(),
            ));
        }
        let data = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| a - b)
            .collect();
        Ok(GrayImage {
            width: self.width,
            height: self.height,
            data,
        })
    }

    /// Bilinear sample at a real-valued position. Out-of-range coordinates
    /// are clamped to the image rectangle.
    #[must_use]
    pub fn sample_bilinear(&self, x: f32, y: f32) -> f32 {
        let x = x.clamp(0.0, (self.width - 1) as f32);
        let y = y.clamp(0.0, (self.height - 1) as f32);
        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;

        let top = self.get(x0, y0) * (1.0 - fx) + self.get(x1, y0) * fx;
        let bottom = self.get(x0, y1) * (1.0 - fx) + self.get(x1, y1) * fx;
        top * (1.0 - fy) + bottom * fy
    }
}

/// Three-channel float image (RGB, each channel in [0, 1]).
#[derive(Debug, Clone)]
pub struct RgbImage {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl RgbImage {
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height * 3],
        }
    }

    pub fn from_raw(width: usize, height: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != width * height * 3 {
            return Err(Error::InvalidDimensions(format!(
                "Data size {} doesn't match {}x{}x3",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> [f32; 3] {
        debug_assert!(x < self.width && y < self.height);
        let i = (y * self.width + x) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, rgb: [f32; 3]) {
        debug_assert!(x < self.width && y < self.height);
        let i = (y * self.width + x) * 3;
        self.data[i..i + 3].copy_from_slice(&rgb);
    }

    /// Rec.601 luma conversion to a single-channel image.
    #[must_use]
    pub fn to_gray(&self) -> GrayImage {
        let mut gray = GrayImage::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let [r, g, b] = self.get(x, y);
                gray.set(x, y, 0.299 * r + 0.587 * g + 0.114 * b);
            }
        }
        gray
    }

    /// Bilinear sample of all three channels.
    #[must_use]
    pub fn sample_bilinear(&self, x: f32, y: f32) -> [f32; 3] {
        let x = x.clamp(0.0, (self.width - 1) as f32);
        let y = y.clamp(0.0, (self.height - 1) as f32);
        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;

        let mut out = [0.0f32; 3];
        let p00 = self.get(x0, y0);
        let p10 = self.get(x1, y0);
        let p01 = self.get(x0, y1);
        let p11 = self.get(x1, y1);
        for ch in 0..3 {
            let top = p00[ch] * (1.0 - fx) + p10[ch] * fx;
            let bottom = p01[ch] * (1.0 - fx) + p11[ch] * fx;
            out[ch] = top * (1.0 - fy) + bottom * fy;
        }
        out
    }
}

/// Four-channel float accumulation surface used by the compositor.
///
/// Channels hold premultiplied RGB plus accumulated alpha; `normalized`
/// divides the color back out for display.
#[derive(Debug, Clone)]
pub struct RgbaImage {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl RgbaImage {
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height * 4],
        }
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> [f32; 4] {
        debug_assert!(x < self.width && y < self.height);
        let i = (y * self.width + x) * 4;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, rgba: [f32; 4]) {
        debug_assert!(x < self.width && y < self.height);
        let i = (y * self.width + x) * 4;
        self.data[i..i + 4].copy_from_slice(&rgba);
    }

    /// Additive blend of a premultiplied sample into the accumulator.
    #[inline]
    pub fn accumulate(&mut self, x: usize, y: usize, rgb: [f32; 3], alpha: f32) {
        debug_assert!(x < self.width && y < self.height);
        let i = (y * self.width + x) * 4;
        self.data[i] += rgb[0] * alpha;
        self.data[i + 1] += rgb[1] * alpha;
        self.data[i + 2] += rgb[2] * alpha;
        self.data[i + 3] += alpha;
    }

    /// Resolve the accumulator into a displayable RGB image by dividing out
    /// the accumulated alpha. Uncovered pixels stay black.
    #[must_use]
    pub fn normalized(&self) -> RgbImage {
        let mut out = RgbImage::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let [r, g, b, a] = self.get(x, y);
                if a > f32::EPSILON {
                    out.set(
                        x,
                        y,
                        [
                            (r / a).clamp(0.0, 1.0),
                            (g / a).clamp(0.0, 1.0),
                            (b / a).clamp(0.0, 1.0),
                        ],
                    );
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gray_image_basics() {
        let mut img = GrayImage::new(4, 3);
        img.set(2, 1, 0.5);
        assert_eq!(img.get(2, 1), 0.5);
        assert_eq!(img.get(0, 0), 0.0);
        assert_eq!(img.width(), 4);
        assert_eq!(img.height(), 3);
    }

    #[test]
    fn test_sub() {
        let mut a = GrayImage::new(2, 2);
        let mut b = GrayImage::new(2, 2);
        a.fill(0.75);
        b.fill(0.25);
        let d = a.sub(&b).unwrap();
        assert!(d.data().iter().all(|&v| (v - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_sub_size_mismatch() {
        let a = GrayImage::new(2, 2);
        let b = GrayImage::new(3, 2);
        assert!(a.sub(&b).is_err());
    }

    #[test]
    fn test_bilinear_midpoint() {
        let mut img = GrayImage::new(2, 1);
        img.set(0, 0, 0.0);
        img.set(1, 0, 1.0);
        assert!((img.sample_bilinear(0.5, 0.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_rgba_accumulate_and_normalize() {
        let mut canvas = RgbaImage::new(1, 1);
        canvas.accumulate(0, 0, [1.0, 0.0, 0.0], 0.5);
        canvas.accumulate(0, 0, [0.0, 1.0, 0.0], 0.5);
        let rgb = canvas.normalized();
        let [r, g, b] = rgb.get(0, 0);
        assert!((r - 0.5).abs() < 1e-6);
        assert!((g - 0.5).abs() < 1e-6);
        assert!(b.abs() < 1e-6);
    }
}
