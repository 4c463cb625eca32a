use crate::core::GrayImage;
use crate::error::Result;
use crate::imgproc::{decimate2, gaussian_blur};

/// One scale-space octave: `scales + 3` Gaussian blurs of the input plus the
/// `scales + 2` pairwise Difference-of-Gaussian images between them.
///
/// Blur `i` is blur `i - 1` convolved with an incremental Gaussian chosen so
/// effective sigma grows by `2^(1/scales)` per step; blur `scales` therefore
/// sits one full octave (2x sigma) above the input and seeds the next octave
/// after decimation.
pub struct Octave {
    scales: usize,
    init_sigma: f32,
    blur: Vec<GrayImage>,
    dog: Vec<GrayImage>,
}

impl Octave {
    pub fn new(image: GrayImage, scales: usize, init_sigma: f32) -> Result<Self> {
        let sigma_ratio = 2.0f32.powf(1.0 / scales as f32);

        let mut blur = Vec::with_capacity(scales + 3);
        blur.push(image);
        let mut last_sigma = init_sigma;
        for i in 1..scales + 3 {
            let d_sigma = last_sigma * (sigma_ratio * sigma_ratio - 1.0).sqrt();
            blur.push(gaussian_blur(&blur[i - 1], d_sigma));
            last_sigma *= sigma_ratio;
        }

        let mut dog = Vec::with_capacity(scales + 2);
        for i in 0..scales + 2 {
            dog.push(blur[i].sub(&blur[i + 1])?);
        }

        Ok(Self {
            scales,
            init_sigma,
            blur,
            dog,
        })
    }

    #[must_use]
    pub fn scales(&self) -> usize {
        self.scales
    }

    #[must_use]
    pub fn init_sigma(&self) -> f32 {
        self.init_sigma
    }

    #[must_use]
    pub fn blur(&self, index: usize) -> &GrayImage {
        &self.blur[index]
    }

    #[must_use]
    pub fn dog(&self, index: usize) -> &GrayImage {
        &self.dog[index]
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.blur[0].width()
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.blur[0].height()
    }

    /// Decimated copy of the blur whose effective sigma is `2 * init_sigma`;
    /// input for the next octave.
    #[must_use]
    pub fn seed_for_next(&self) -> GrayImage {
        decimate2(&self.blur[self.scales])
    }
}
