use crate::calib3d::{Homography, LevMar, LevMarModel};
use crate::core::{Mat3, Vec2, Vec3};
use crate::stitching::Panorama;
use log::warn;
use ndarray::{Array1, Array2};
use std::collections::HashMap;

/// One surviving correspondence, flattened for residual evaluation:
/// positions of the two keypoints plus the panorama-image slots they belong
/// to.
#[derive(Debug, Clone)]
struct Residual {
    slot0: usize,
    slot1: usize,
    u0: Vec2,
    u1: Vec2,
}

/// Joint refinement model over all images of one panorama.
///
/// Four parameters per image, laid out `(rx, ry, rz, s)`. Image 0 is the
/// gauge: it is pinned to the identity and has no parameters, which keeps
/// the normal equations full-rank (without it the system is rank-deficient
/// by exactly one homography).
struct BundleAdjustmentModel {
    residuals: Vec<Residual>,
    image_count: usize,
}

impl BundleAdjustmentModel {
    /// Parameter offset of an image slot; the gauge image has none.
    fn param_offset(slot: usize) -> Option<usize> {
        (slot > 0).then(|| (slot - 1) * 4)
    }

    fn homography_at(p: &Array1<f32>, slot: usize) -> Homography {
        match Self::param_offset(slot) {
            None => Homography::default(),
            Some(o) => Homography::new(p[o], p[o + 1], p[o + 2], p[o + 3]),
        }
    }

    /// Derivative of one residual w.r.t. parameter `derivative_index` of the
    /// pair, indices 0..4 belonging to the slot-0 homography and 4..8 to the
    /// slot-1 inverse.
    #[allow(clippy::too_many_arguments)]
    fn derivative(
        h0: &Homography,
        h1: &Homography,
        h0m: &Mat3,
        h1m1: &Mat3,
        ab: Vec2,
        xyz: Vec3,
        r: f32,
        u1: Vec3,
        derivative_index: usize,
    ) -> f32 {
        debug_assert!(derivative_index < 8);
        if r == 0.0 {
            return 0.0;
        }

        let dxyz = if derivative_index < 4 {
            h0.matrix_derivative(derivative_index) * *h1m1 * u1
        } else {
            *h0m * h1.inverse_matrix_derivative(derivative_index - 4) * u1
        };

        // Chain rule through the projection:
        //   d(a,b)/d(x,y,z) = [ -1/z   0    x/z^2 ]
        //                     [   0  -1/z   y/z^2 ]
        let z_sqr = xyz.z * xyz.z;
        let da = -dxyz.x / xyz.z + xyz.x / z_sqr * dxyz.z;
        let db = -dxyz.y / xyz.z + xyz.y / z_sqr * dxyz.z;

        (ab.x * da + ab.y * db) / r
    }
}

impl LevMarModel for BundleAdjustmentModel {
    fn param_count(&self) -> usize {
        (self.image_count - 1) * 4
    }

    fn residual_count(&self) -> usize {
        self.residuals.len()
    }

    fn residual_error(&self, p: &Array1<f32>) -> f32 {
        let mut result = 0.0f32;
        for res in &self.residuals {
            let h0m = Self::homography_at(p, res.slot0).matrix();
            let h1m1 = Self::homography_at(p, res.slot1).inverse_matrix();
            let xyz = h0m * h1m1 * Vec3::from_point(res.u1);
            let ab = res.u0 - xyz.project();
            result += ab.norm_sqr();
        }
        result
    }

    fn next_iteration(
        &self,
        p: &Array1<f32>,
        jacobian: &mut Array2<f32>,
        residuals: &mut Array1<f32>,
    ) {
        jacobian.fill(0.0);

        for (i, res) in self.residuals.iter().enumerate() {
            let h0 = Self::homography_at(p, res.slot0);
            let h1 = Self::homography_at(p, res.slot1);
            let h0m = h0.matrix();
            let h1m1 = h1.inverse_matrix();
            let u1 = Vec3::from_point(res.u1);

            let xyz = h0m * h1m1 * u1;
            let ab = res.u0 - xyz.project();
            let r = ab.norm();
            residuals[i] = r;

            if let Some(offset) = Self::param_offset(res.slot0) {
                for k in 0..4 {
                    jacobian[[i, offset + k]] =
                        Self::derivative(&h0, &h1, &h0m, &h1m1, ab, xyz, r, u1, k);
                }
            }
            if let Some(offset) = Self::param_offset(res.slot1) {
                for k in 0..4 {
                    jacobian[[i, offset + k]] =
                        Self::derivative(&h0, &h1, &h0m, &h1m1, ab, xyz, r, u1, k + 4);
                }
            }
        }
    }
}

/// Joint Levenberg-Marquardt refinement of per-image rotation and scale over
/// every surviving correspondence of a panorama.
#[derive(Default)]
pub struct BundleAdjuster {
    levmar: LevMar,
}

impl BundleAdjuster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Estimate a homography for every image of the panorama and store it
    /// back on the images. The first image keeps the identity.
    pub fn optimize(&self, panorama: &mut Panorama) {
        let image_count = panorama.images.len();
        if image_count < 2 {
            return;
        }

        let slots: HashMap<i32, usize> = panorama
            .images
            .iter()
            .enumerate()
            .map(|(slot, image)| (image.id(), slot))
            .collect();

        let mut residuals = Vec::new();
        for image_match in &panorama.matches {
            for m in &image_match.matches {
                let (Some(&slot0), Some(&slot1)) =
                    (slots.get(&m.key(0).tag), slots.get(&m.key(1).tag))
                else {
                    continue;
                };
                residuals.push(Residual {
                    slot0,
                    slot1,
                    u0: m.key(0).pos,
                    u1: m.key(1).pos,
                });
            }
        }
        if residuals.is_empty() {
            return;
        }

        let model = BundleAdjustmentModel {
            residuals,
            image_count,
        };

        // Start every image at no rotation, unit scale.
        let mut params = Array1::<f32>::zeros(model.param_count());
        for slot in 1..image_count {
            params[(slot - 1) * 4 + 3] = 1.0;
        }

        if !self.levmar.fit(&model, &mut params) {
            warn!("bundle adjustment hit the iteration cap; keeping best parameters seen");
        }

        for (slot, image) in panorama.images.iter_mut().enumerate() {
            image.set_homography(BundleAdjustmentModel::homography_at(&params, slot));
        }
    }
}
