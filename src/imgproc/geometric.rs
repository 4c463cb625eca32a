use crate::core::{GrayImage, Mat3, RgbImage, RgbaImage, Vec2};

/// Bilinear resize to an explicit target size.
#[must_use]
pub fn resize_bilinear(src: &GrayImage, new_width: usize, new_height: usize) -> GrayImage {
    let mut dst = GrayImage::new(new_width, new_height);
    let x_ratio = src.width() as f32 / new_width as f32;
    let y_ratio = src.height() as f32 / new_height as f32;

    for y in 0..new_height {
        for x in 0..new_width {
            let sx = (x as f32 + 0.5) * x_ratio - 0.5;
            let sy = (y as f32 + 0.5) * y_ratio - 0.5;
            dst.set(x, y, src.sample_bilinear(sx, sy));
        }
    }
    dst
}

/// 2x downsample by nearest-neighbor decimation: keep every other pixel.
///
/// The pyramid seeds depend on this exact scheme; smoothing downscalers shift
/// keypoint localization between octaves.
#[must_use]
pub fn decimate2(src: &GrayImage) -> GrayImage {
    let new_width = src.width() / 2;
    let new_height = src.height() / 2;
    let mut dst = GrayImage::new(new_width, new_height);
    for y in 0..new_height {
        for x in 0..new_width {
            dst.set(x, y, src.get(x * 2, y * 2));
        }
    }
    dst
}

/// Bilinear alpha falloff: 1 at the image center, 0 at the edges, separable
/// in x and y. Down-weights pixels near image borders during compositing.
#[inline]
#[must_use]
pub fn alpha_falloff(x: f32, y: f32, width: usize, height: usize) -> f32 {
    let fx = 1.0 - (2.0 * x / (width - 1) as f32 - 1.0).abs();
    let fy = 1.0 - (2.0 * y / (height - 1) as f32 - 1.0).abs();
    fx.max(0.0) * fy.max(0.0)
}

/// Warp `src` onto `canvas` through the forward transform `t` (source
/// coordinates to canvas coordinates), sampling bilinearly and accumulating
/// premultiplied color weighted by the alpha falloff mask.
///
/// Inverse mapping over the canvas-space bounding box of the warped source
/// rectangle. The box is taken from the transformed corners, which bounds
/// the warped quad as long as it does not cross the plane at infinity.
pub fn warp_accumulate(canvas: &mut RgbaImage, src: &RgbImage, t: Mat3) {
    let Some(inv) = t.inverse() else {
        return;
    };

    let w = src.width() as f32;
    let h = src.height() as f32;
    let corners = [
        t.transform_point(Vec2::new(0.0, 0.0)),
        t.transform_point(Vec2::new(w - 1.0, 0.0)),
        t.transform_point(Vec2::new(0.0, h - 1.0)),
        t.transform_point(Vec2::new(w - 1.0, h - 1.0)),
    ];
    let min_x = corners.iter().map(|c| c.x).fold(f32::INFINITY, f32::min);
    let max_x = corners.iter().map(|c| c.x).fold(f32::NEG_INFINITY, f32::max);
    let min_y = corners.iter().map(|c| c.y).fold(f32::INFINITY, f32::min);
    let max_y = corners.iter().map(|c| c.y).fold(f32::NEG_INFINITY, f32::max);

    let x0 = min_x.floor().max(0.0) as usize;
    let y0 = min_y.floor().max(0.0) as usize;
    let x1 = (max_x.ceil() as isize).min(canvas.width() as isize - 1);
    let y1 = (max_y.ceil() as isize).min(canvas.height() as isize - 1);
    if x1 < 0 || y1 < 0 {
        return;
    }

    for cy in y0..=y1 as usize {
        for cx in x0..=x1 as usize {
            let p = inv.transform_point(Vec2::new(cx as f32, cy as f32));
            if p.x < 0.0 || p.y < 0.0 || p.x > w - 1.0 || p.y > h - 1.0 {
                continue;
            }
            let alpha = alpha_falloff(p.x, p.y, src.width(), src.height());
            if alpha <= 0.0 {
                continue;
            }
            let rgb = src.sample_bilinear(p.x, p.y);
            canvas.accumulate(cx, cy, rgb, alpha);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimate2_picks_even_pixels() {
        let mut img = GrayImage::new(6, 4);
        for y in 0..4 {
            for x in 0..6 {
                img.set(x, y, (y * 6 + x) as f32);
            }
        }
        let half = decimate2(&img);
        assert_eq!(half.width(), 3);
        assert_eq!(half.height(), 2);
        assert_eq!(half.get(0, 0), img.get(0, 0));
        assert_eq!(half.get(1, 0), img.get(2, 0));
        assert_eq!(half.get(2, 1), img.get(4, 2));
    }

    #[test]
    fn test_resize_preserves_constant() {
        let mut img = GrayImage::new(10, 10);
        img.fill(0.3);
        let up = resize_bilinear(&img, 20, 20);
        assert_eq!(up.width(), 20);
        for &v in up.data() {
            assert!((v - 0.3).abs() < 1e-5);
        }
    }

    #[test]
    fn test_alpha_falloff_profile() {
        assert!((alpha_falloff(0.0, 0.0, 11, 11)).abs() < 1e-6);
        assert!((alpha_falloff(5.0, 5.0, 11, 11) - 1.0).abs() < 1e-6);
        assert!((alpha_falloff(10.0, 5.0, 11, 11)).abs() < 1e-6);
        let edge = alpha_falloff(2.5, 5.0, 11, 11);
        assert!(edge > 0.0 && edge < 1.0);
    }

    #[test]
    fn test_warp_accumulate_translation() {
        let mut src = RgbImage::new(5, 5);
        src.set(2, 2, [1.0, 1.0, 1.0]);
        let mut canvas = RgbaImage::new(20, 20);
        warp_accumulate(&mut canvas, &src, Mat3::translation(10.0, 10.0));

        // Source center lands at (12, 12) with full falloff weight.
        let [r, _, _, a] = canvas.get(12, 12);
        assert!(a > 0.9);
        assert!(r > 0.9);
        // Pixels outside the warped rectangle stay untouched.
        assert_eq!(canvas.get(0, 0), [0.0, 0.0, 0.0, 0.0]);
    }
}
