use crate::core::{Mat3, RgbaImage};
use crate::imgproc::warp_accumulate;
use crate::stitching::Panorama;
use log::debug;

/// Warps every image of a panorama onto a shared canvas and blends them
/// with the alpha-falloff mask.
pub struct Stitcher {
    /// Side of the square output canvas.
    pub canvas_size: usize,
    /// Pixels per unit of the normalized keypoint frame.
    pub view_scale: f32,
}

impl Default for Stitcher {
    fn default() -> Self {
        Self {
            canvas_size: 4000,
            view_scale: 1000.0,
        }
    }
}

impl Stitcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Composite the panorama. Each image travels original pixels ->
    /// centered frame -> normalized frame -> its inverse homography ->
    /// canvas pixels, and is accumulated with premultiplied additive
    /// blending.
    #[must_use]
    pub fn stitch(&self, panorama: &Panorama) -> RgbaImage {
        let mut canvas = RgbaImage::new(self.canvas_size, self.canvas_size);
        let center = self.canvas_size as f32 / 2.0;
        let to_center = Mat3::translation(center, center);

        for image in &panorama.images {
            let width = image.original().width() as f32;
            let height = image.original().height() as f32;

            let placement = to_center
                * Mat3::scaling(self.view_scale)
                * image.homography().inverse_matrix()
                * Mat3::scaling(image.key_point_scale_factor())
                * Mat3::translation(-width / 2.0, -height / 2.0);

            debug!("compositing {}", image.file_name());
            warp_accumulate(&mut canvas, image.original(), placement);
        }

        canvas
    }
}
