use crate::core::{solve3, GrayImage, Mat3, Vec3};
use crate::error::Result;
use crate::features2d::{KeyPoint, Octave, DESC_LEN, INDEX_SIZE, ORI_SIZE};
use crate::imgproc::{gaussian_blur, gradient_field, resize_bilinear};
use std::f32::consts::PI;

/// Keypoints must be at least this many samples away from the image border.
pub const BORDER_DIST: usize = 5;
/// Budget of integer re-centering steps during subpixel localization.
pub const MAX_KEYPOINT_INTERP_MOVES: usize = 5;
/// Sigma of the orientation window, as a multiple of the keypoint scale.
pub const ORI_SIGMA: f32 = 1.5;
/// Orientation histogram peaks within this fraction of the maximum spawn
/// keypoints of their own.
pub const ORI_HIST_THRESH: f32 = 0.8;
/// Spacing of descriptor index samples in pixels at the keypoint scale.
pub const MAG_FACTOR: f32 = 3.0;
/// Width of the descriptor Gaussian window relative to the index half-width.
pub const INDEX_SIGMA: f32 = 1.0;

/// Tunable knobs of the scale-space extractor. Defaults follow Lowe's
/// published values.
#[derive(Debug, Clone)]
pub struct SiftParams {
    /// 2x upsample the input before building the pyramid.
    pub double_image_size: bool,
    /// Target smoothing level at the base of the pyramid.
    pub init_sigma: f32,
    /// Discrete smoothing levels per octave.
    pub scales: usize,
    /// Base threshold on the DoG magnitude at a keypoint; divided by
    /// `scales` before use.
    pub peak_thresh_init: f32,
    /// Maximum allowed ratio of principal curvatures before a peak counts as
    /// an edge response.
    pub edge_eigen_ratio: f32,
    /// Bins in the orientation histogram (36 gives 10 degree spacing).
    pub ori_bins: usize,
    /// Post-normalization clip on descriptor components.
    pub max_index_val: f32,
}

impl Default for SiftParams {
    fn default() -> Self {
        Self {
            double_image_size: false,
            init_sigma: 1.6,
            scales: 3,
            peak_thresh_init: 0.04,
            edge_eigen_ratio: 10.0,
            ori_bins: 36,
            max_index_val: 0.2,
        }
    }
}

/// Subpixel peak location in scale space.
#[derive(Debug, Clone, Copy)]
struct ScalePoint {
    x: f32,
    y: f32,
    /// Scale relative to the octave, in sigma units of the smallest Gaussian
    /// of the DoG that identified it.
    oct_scale: f32,
}

/// Scale-space keypoint detector and descriptor.
pub struct SiftExtractor {
    params: SiftParams,
}

impl Default for SiftExtractor {
    fn default() -> Self {
        Self::new(SiftParams::default())
    }
}

impl SiftExtractor {
    #[must_use]
    pub fn new(params: SiftParams) -> Self {
        Self { params }
    }

    #[must_use]
    pub fn params(&self) -> &SiftParams {
        &self.params
    }

    fn peak_thresh(&self) -> f32 {
        self.params.peak_thresh_init / self.params.scales as f32
    }

    /// Extract keypoints from a grayscale image. Positions and scales are in
    /// the coordinates of `image`; tags are left at zero for the owner to
    /// fill in.
    pub fn extract(&self, image: &GrayImage) -> Result<Vec<KeyPoint>> {
        let mut keys = Vec::new();
        let mut pixel_size = 1.0f32;
        // Assume the camera already smoothed the signal by sigma = 0.5.
        let mut cur_sigma = 0.5f32;

        let mut img = image.clone();
        if self.params.double_image_size {
            img = resize_bilinear(&img, img.width() * 2, img.height() * 2);
            pixel_size *= 0.5;
            cur_sigma *= 2.0;
        }

        if self.params.init_sigma > cur_sigma {
            let sigma =
                (self.params.init_sigma * self.params.init_sigma - cur_sigma * cur_sigma).sqrt();
            img = gaussian_blur(&img, sigma);
        }
        cur_sigma = self.params.init_sigma;

        let min_size = BORDER_DIST * 2 + 2;
        while img.width() > min_size && img.height() > min_size {
            let octave = Octave::new(img, self.params.scales, cur_sigma)?;
            self.scan_octave(&octave, pixel_size, &mut keys);
            img = octave.seed_for_next();
            pixel_size *= 2.0;
        }

        Ok(keys)
    }

    /// Find all keypoints within one octave and append them to `keys`.
    fn scan_octave(&self, oct: &Octave, pixel_size: f32, keys: &mut Vec<KeyPoint>) {
        let width = oct.width();
        let height = oct.height();

        // One occupancy mask per octave suppresses duplicate keypoints that
        // localize onto the same integer cell.
        let mut mask = vec![false; width * height];

        for s in 1..=oct.scales() {
            let (magnitude, direction) = gradient_field(oct.blur(s));

            for y in BORDER_DIST..height - BORDER_DIST {
                for x in BORDER_DIST..width - BORDER_DIST {
                    if oct.dog(s).get(x, y).abs() < 0.8 * self.peak_thresh() {
                        continue;
                    }
                    if !is_local_extremum(oct, x, y, s) {
                        continue;
                    }
                    if self.is_on_edge(oct.dog(s), x, y) {
                        continue;
                    }
                    let Some(point) = self.localize(oct, &mut mask, x, y, s) else {
                        continue;
                    };
                    self.emit_keypoints(&magnitude, &direction, pixel_size, point, keys);
                }
            }
        }
    }

    /// Harris-style edge rejection on the 2x2 spatial Hessian of the DoG.
    fn is_on_edge(&self, dog: &GrayImage, x: usize, y: usize) -> bool {
        let d00 = dog.get(x + 1, y) + dog.get(x - 1, y) - 2.0 * dog.get(x, y);
        let d11 = dog.get(x, y + 1) + dog.get(x, y - 1) - 2.0 * dog.get(x, y);
        let d01 = 0.25
            * ((dog.get(x + 1, y + 1) - dog.get(x + 1, y - 1))
                - (dog.get(x - 1, y + 1) - dog.get(x - 1, y - 1)));

        let trace_sqr = (d00 + d11) * (d00 + d11);
        let det = d00 * d11 - d01 * d01;
        let r = self.params.edge_eigen_ratio;
        trace_sqr / det >= (r + 1.0) * (r + 1.0) / r
    }

    /// Fit a 3-D quadratic through the DoG values around `(x, y, s)` and
    /// return the offset of its peak plus the interpolated peak magnitude.
    /// `None` when the Hessian is singular.
    fn adjustment(oct: &Octave, x: usize, y: usize, s: usize) -> Option<(Vec3, f32)> {
        let below = oct.dog(s - 1);
        let current = oct.dog(s);
        let above = oct.dog(s + 1);

        // Hessian and gradient by central differences, dimensions ordered
        // (s, y, x).
        let mut h = Mat3::zero();
        h.m[0][0] = below.get(x, y) - 2.0 * current.get(x, y) + above.get(x, y);
        h.m[0][1] = 0.25
            * (above.get(x, y + 1) - above.get(x, y - 1)
                - (below.get(x, y + 1) - below.get(x, y - 1)));
        h.m[1][0] = h.m[0][1];
        h.m[0][2] = 0.25
            * (above.get(x + 1, y) - above.get(x - 1, y)
                - (below.get(x + 1, y) - below.get(x - 1, y)));
        h.m[2][0] = h.m[0][2];
        h.m[1][1] = current.get(x, y - 1) - 2.0 * current.get(x, y) + current.get(x, y + 1);
        h.m[1][2] = 0.25
            * (current.get(x + 1, y + 1) - current.get(x - 1, y + 1)
                - (current.get(x + 1, y - 1) - current.get(x - 1, y - 1)));
        h.m[2][1] = h.m[1][2];
        h.m[2][2] = current.get(x - 1, y) - 2.0 * current.get(x, y) + current.get(x + 1, y);

        let g = Vec3::new(
            0.5 * (above.get(x, y) - below.get(x, y)),
            0.5 * (current.get(x, y + 1) - current.get(x, y - 1)),
            0.5 * (current.get(x + 1, y) - current.get(x - 1, y)),
        );

        let offset = solve3(h, -g)?;
        let peak = offset.dot(g) * 0.5 + current.get(x, y);
        // Reorder (s, y, x) -> (x, y, s).
        Some((Vec3::new(offset.z, offset.y, offset.x), peak))
    }

    /// Subpixel localization. The integer sample is allowed to drift by one
    /// cell per step, up to `MAX_KEYPOINT_INTERP_MOVES` steps, when the
    /// fitted peak lands outside the current cell.
    fn localize(
        &self,
        oct: &Octave,
        mask: &mut [bool],
        x0: usize,
        y0: usize,
        s: usize,
    ) -> Option<ScalePoint> {
        let width = oct.width();
        let height = oct.height();
        let mut x = x0;
        let mut y = y0;
        let mut remaining_moves = MAX_KEYPOINT_INTERP_MOVES;

        loop {
            let (offset, peak) = Self::adjustment(oct, x, y, s)?;

            let mut nx = x;
            let mut ny = y;
            if offset.x > 0.6 && x < width - 3 {
                nx += 1;
            }
            if offset.x < -0.6 && x > 3 {
                nx -= 1;
            }
            if offset.y > 0.6 && y < height - 3 {
                ny += 1;
            }
            if offset.y < -0.6 && y > 3 {
                ny -= 1;
            }
            if remaining_moves > 0 && (nx != x || ny != y) {
                x = nx;
                y = ny;
                remaining_moves -= 1;
                continue;
            }

            if offset.x.abs() > 1.5
                || offset.y.abs() > 1.5
                || offset.z.abs() > 1.5
                || peak.abs() < self.peak_thresh()
            {
                return None;
            }

            let cell = y * width + x;
            if mask[cell] {
                return None;
            }
            mask[cell] = true;

            let oct_scale = oct.init_sigma()
                * 2.0f32.powf((s as f32 + offset.z) / oct.scales() as f32);

            return Some(ScalePoint {
                x: x as f32 + offset.x,
                y: y as f32 + offset.y,
                oct_scale,
            });
        }
    }

    /// Build the orientation histogram around a localized peak and emit one
    /// keypoint (with descriptor) per dominant orientation.
    fn emit_keypoints(
        &self,
        magnitude: &GrayImage,
        direction: &GrayImage,
        pixel_size: f32,
        point: ScalePoint,
        keys: &mut Vec<KeyPoint>,
    ) {
        let ori_bins = self.params.ori_bins;
        let mut bins = vec![0.0f32; ori_bins];

        let px = (point.x + 0.5) as usize;
        let py = (point.y + 0.5) as usize;
        let sigma = ORI_SIGMA * point.oct_scale;
        let radius = (sigma * 3.0 + 0.5) as usize;

        let x_min = px.saturating_sub(radius).max(1);
        let x_max = (px + radius).min(magnitude.width() - 1);
        let y_min = py.saturating_sub(radius).max(1);
        let y_max = (py + radius).min(magnitude.height() - 1);

        for y in y_min..y_max {
            for x in x_min..x_max {
                let mag = magnitude.get(x, y);
                if mag <= 0.0 {
                    continue;
                }

                let dx = x as f32 - point.x;
                let dy = y as f32 - point.y;
                let dist_sqr = dx * dx + dy * dy;
                if dist_sqr > (radius * radius) as f32 + 0.5 {
                    continue;
                }

                let weight = (-dist_sqr / (2.0 * sigma * sigma)).exp();
                let mut bin = (ori_bins as f32 * (direction.get(x, y) + PI + 1e-4)
                    / (2.0 * PI)) as usize;
                if bin >= ori_bins {
                    bin = 0;
                }
                bins[bin] += mag * weight;
            }
        }

        // Smooth with a circular [1/3 1/3 1/3] kernel so a noisy plateau
        // resolves into a single peak.
        for _ in 0..4 {
            let mut prev = bins[ori_bins - 1];
            for i in 0..ori_bins {
                let temp = bins[i];
                let next = bins[(i + 1) % ori_bins];
                bins[i] = (prev + bins[i] + next) / 3.0;
                prev = temp;
            }
        }

        let max_peak = bins.iter().fold(0.0f32, |m, &v| m.max(v));
        if max_peak <= 0.0 {
            return;
        }

        for i in 0..ori_bins {
            if bins[i] < max_peak * ORI_HIST_THRESH {
                continue;
            }
            let prev = bins[(i + ori_bins - 1) % ori_bins];
            let next = bins[(i + 1) % ori_bins];
            if bins[i] < prev || bins[i] < next {
                continue;
            }

            let correction = interpolate_peak(prev, bins[i], next);
            let angle = 2.0 * PI * (i as f32 + 0.5 + correction) / ori_bins as f32 - PI;

            let mut key = KeyPoint::new(
                pixel_size * point.x,
                pixel_size * point.y,
                pixel_size * point.oct_scale,
                angle,
            );
            key.desc = self.descriptor(magnitude, direction, point, angle);
            keys.push(key);
        }
    }

    /// Sample the gradient field around the keypoint into a 4x4x8 index,
    /// rotated into the keypoint frame, then flatten, normalize, clip and
    /// quantize to bytes.
    fn descriptor(
        &self,
        magnitude: &GrayImage,
        direction: &GrayImage,
        point: ScalePoint,
        angle: f32,
    ) -> [u8; DESC_LEN] {
        let spacing = point.oct_scale * MAG_FACTOR;
        let radius = (1.414 * spacing * (INDEX_SIZE + 1) as f32 / 2.0 + 0.5) as i32;
        let sigma = INDEX_SIGMA * 0.5 * INDEX_SIZE as f32;
        let (sin_a, cos_a) = angle.sin_cos();

        let ipx = (point.x + 0.5) as i32;
        let ipy = (point.y + 0.5) as i32;
        let width = magnitude.width() as i32;
        let height = magnitude.height() as i32;

        let mut index = [0.0f32; DESC_LEN];

        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let x = ipx + dx;
                let y = ipy + dy;
                if x < 1 || x >= width - 1 || y < 1 || y >= height - 1 {
                    continue;
                }

                // Rotate into the keypoint frame, apply the subpixel
                // correction and rescale to index units.
                let fdx = dx as f32;
                let fdy = dy as f32;
                let dxr = (cos_a * fdx - sin_a * fdy - (point.x - ipx as f32)) / spacing;
                let dyr = (sin_a * fdx + cos_a * fdy - (point.y - ipy as f32)) / spacing;

                let ix = dxr + INDEX_SIZE as f32 / 2.0 - 0.5;
                let iy = dyr + INDEX_SIZE as f32 / 2.0 - 0.5;
                if ix <= -1.0 || ix >= INDEX_SIZE as f32 || iy <= -1.0 || iy >= INDEX_SIZE as f32
                {
                    continue;
                }

                let mag = magnitude.get(x as usize, y as usize)
                    * (-(dxr * dxr + dyr * dyr) / (2.0 * sigma * sigma)).exp();

                let mut ori = direction.get(x as usize, y as usize) - angle;
                while ori > 2.0 * PI {
                    ori -= 2.0 * PI;
                }
                while ori < 0.0 {
                    ori += 2.0 * PI;
                }

                place_in_index(&mut index, mag, ori, ix, iy);
            }
        }

        normalize_descriptor(&mut index, self.params.max_index_val)
    }
}

/// Check for a minimum or maximum of the DoG in the 3x3x3 neighborhood.
fn is_local_extremum(oct: &Octave, x: usize, y: usize, s: usize) -> bool {
    let val = oct.dog(s).get(x, y);
    let layers = [oct.dog(s - 1), oct.dog(s), oct.dog(s + 1)];

    for layer in layers {
        for dy in -1i32..=1 {
            for dx in -1i32..=1 {
                let v = layer.get((x as i32 + dx) as usize, (y as i32 + dy) as usize);
                if val > 0.0 {
                    if v > val {
                        return false;
                    }
                } else if v < val {
                    return false;
                }
            }
        }
    }
    true
}

/// Parabolic fit through (-1, left), (0, middle), (1, right); returns the
/// peak abscissa in [-1, 1]. The middle value is assumed extremal.
fn interpolate_peak(left: f32, middle: f32, right: f32) -> f32 {
    let (l, m, r) = if middle < 0.0 {
        (-left, -middle, -right)
    } else {
        (left, middle, right)
    };
    let denom = l - 2.0 * m + r;
    if denom.abs() < f32::EPSILON {
        return 0.0;
    }
    0.5 * (l - r) / denom
}

/// Trilinearly distribute one weighted sample over the 8 surrounding
/// (x, y, orientation) bins. Orientation wraps around; spatial bins outside
/// the index are dropped.
fn place_in_index(index: &mut [f32; DESC_LEN], mag: f32, ori: f32, fx: f32, fy: f32) {
    let fo = ORI_SIZE as f32 * ori / (2.0 * PI);

    let ix = fx.floor() as i32;
    let iy = fy.floor() as i32;
    let io = fo.floor() as i32;

    let x_frac = fx - ix as f32;
    let y_frac = fy - iy as f32;
    let o_frac = fo - io as f32;

    for y in 0..2i32 {
        let y_index = iy + y;
        if y_index < 0 || y_index >= INDEX_SIZE as i32 {
            continue;
        }
        let y_weight = mag * if y == 0 { 1.0 - y_frac } else { y_frac };
        for x in 0..2i32 {
            let x_index = ix + x;
            if x_index < 0 || x_index >= INDEX_SIZE as i32 {
                continue;
            }
            let x_weight = y_weight * if x == 0 { 1.0 - x_frac } else { x_frac };
            for o in 0..2i32 {
                let o_index = (io + o).rem_euclid(ORI_SIZE as i32);
                let o_weight = x_weight * if o == 0 { 1.0 - o_frac } else { o_frac };
                index[(x_index as usize * INDEX_SIZE + y_index as usize) * ORI_SIZE
                    + o_index as usize] += o_weight;
            }
        }
    }
}

/// L2-normalize, clip at `max_index_val`, renormalize, then quantize so a
/// component of 1/512 maps to one byte step.
fn normalize_descriptor(index: &mut [f32; DESC_LEN], max_index_val: f32) -> [u8; DESC_LEN] {
    let norm = index.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in index.iter_mut() {
            *v /= norm;
        }
    }

    let mut changed = false;
    for v in index.iter_mut() {
        if *v > max_index_val {
            *v = max_index_val;
            changed = true;
        }
    }
    if changed {
        let norm = index.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in index.iter_mut() {
                *v /= norm;
            }
        }
    }

    let mut out = [0u8; DESC_LEN];
    for (dst, &v) in out.iter_mut().zip(index.iter()) {
        *dst = ((512.0 * v) as i32).min(255).max(0) as u8;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Smooth reproducible texture with enough blob structure to produce
    /// keypoints: a sum of randomly placed Gaussians.
    fn blob_image(width: usize, height: usize, seed: u32) -> GrayImage {
        let mut img = GrayImage::new(width, height);
        let mut state = seed;
        let mut next = || {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 8) as f32 / ((1u32 << 24) as f32)
        };

        let mut blobs = Vec::new();
        for _ in 0..40 {
            let cx = next() * width as f32;
            let cy = next() * height as f32;
            let r = 2.0 + next() * 6.0;
            let a = 0.3 + next() * 0.7;
            blobs.push((cx, cy, r, a));
        }

        for y in 0..height {
            for x in 0..width {
                let mut v = 0.0;
                for &(cx, cy, r, a) in &blobs {
                    let d2 = (x as f32 - cx).powi(2) + (y as f32 - cy).powi(2);
                    v += a * (-d2 / (2.0 * r * r)).exp();
                }
                img.set(x, y, v.min(1.0));
            }
        }
        img
    }

    #[test]
    fn test_extract_finds_keypoints() {
        let img = blob_image(128, 128, 7);
        let extractor = SiftExtractor::default();
        let keys = extractor.extract(&img).unwrap();
        assert!(!keys.is_empty(), "expected keypoints on a blob texture");

        for key in &keys {
            assert!(key.x >= 0.0 && key.x < 128.0);
            assert!(key.y >= 0.0 && key.y < 128.0);
            assert!(key.scale > 0.0);
            assert!(key.angle >= -PI && key.angle <= PI);
        }
    }

    #[test]
    fn test_descriptor_norm_in_band() {
        let img = blob_image(128, 128, 21);
        let extractor = SiftExtractor::default();
        let keys = extractor.extract(&img).unwrap();
        assert!(!keys.is_empty());

        for key in &keys {
            let norm: f32 = key
                .desc
                .iter()
                .map(|&b| {
                    let v = f32::from(b) / 512.0;
                    v * v
                })
                .sum::<f32>()
                .sqrt();
            assert!(
                (0.9..=1.1).contains(&norm),
                "descriptor norm {norm} out of band"
            );
        }
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let img = blob_image(96, 96, 3);
        let extractor = SiftExtractor::default();
        let a = extractor.extract(&img).unwrap();
        let b = extractor.extract(&img).unwrap();
        assert_eq!(a.len(), b.len());
        for (ka, kb) in a.iter().zip(b.iter()) {
            assert_eq!(ka.x, kb.x);
            assert_eq!(ka.y, kb.y);
            assert_eq!(ka.desc, kb.desc);
        }
    }

    #[test]
    fn test_flat_image_has_no_keypoints() {
        let mut img = GrayImage::new(64, 64);
        img.fill(0.5);
        let keys = SiftExtractor::default().extract(&img).unwrap();
        assert!(keys.is_empty());
    }

    #[test]
    fn test_interpolate_peak() {
        // Symmetric: peak at center.
        assert!(interpolate_peak(1.0, 2.0, 1.0).abs() < 1e-6);
        // Leaning right: peak shifted toward the larger neighbor.
        let p = interpolate_peak(1.0, 2.0, 1.5);
        assert!(p > 0.0 && p <= 0.5);
        // Negative-valued extremum is handled by sign flip.
        let n = interpolate_peak(-1.0, -2.0, -1.5);
        assert!(n > 0.0 && n <= 0.5);
    }
}
