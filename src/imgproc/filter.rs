use crate::core::GrayImage;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Gaussian kernels are cut off this many sigmas from the center.
pub const GAUSS_TRUNCATE: f32 = 4.0;

fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (sigma * GAUSS_TRUNCATE).ceil().max(1.0) as usize;
    let mut kernel = Vec::with_capacity(2 * radius + 1);
    let denom = 2.0 * sigma * sigma;
    for i in 0..=2 * radius {
        let d = i as f32 - radius as f32;
        kernel.push((-d * d / denom).exp());
    }
    let sum: f32 = kernel.iter().sum();
    for v in &mut kernel {
        *v /= sum;
    }
    kernel
}

/// Blur with a separable Gaussian kernel, replicating pixels at the border.
#[must_use]
pub fn gaussian_blur(src: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 {
        return src.clone();
    }

    let kernel = gaussian_kernel(sigma);
    let radius = kernel.len() / 2;
    let width = src.width();
    let height = src.height();

    // Horizontal pass.
    let mut tmp = GrayImage::new(width, height);
    {
        let run_row = |y: usize, out_row: &mut [f32]| {
            let src_row = src.row(y);
            for x in 0..width {
                let mut acc = 0.0;
                for (k, &w) in kernel.iter().enumerate() {
                    let sx = (x + k).saturating_sub(radius).min(width - 1);
                    acc += src_row[sx] * w;
                }
                out_row[x] = acc;
            }
        };

        #[cfg(feature = "rayon")]
        tmp.data_mut()
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| run_row(y, row));

        #[cfg(not(feature = "rayon"))]
        tmp.data_mut()
            .chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| run_row(y, row));
    }

    // Vertical pass.
    let mut dst = GrayImage::new(width, height);
    {
        let run_row = |y: usize, out_row: &mut [f32]| {
            for x in 0..width {
                let mut acc = 0.0;
                for (k, &w) in kernel.iter().enumerate() {
                    let sy = (y + k).saturating_sub(radius).min(height - 1);
                    acc += tmp.get(x, sy) * w;
                }
                out_row[x] = acc;
            }
        };

        #[cfg(feature = "rayon")]
        dst.data_mut()
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| run_row(y, row));

        #[cfg(not(feature = "rayon"))]
        dst.data_mut()
            .chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| run_row(y, row));
    }

    dst
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_normalized() {
        let k = gaussian_kernel(1.6);
        let sum: f32 = k.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert_eq!(k.len() % 2, 1);
    }

    #[test]
    fn test_blur_preserves_constant_image() {
        let mut img = GrayImage::new(20, 20);
        img.fill(0.42);
        let blurred = gaussian_blur(&img, 2.0);
        for &v in blurred.data() {
            assert!((v - 0.42).abs() < 1e-5);
        }
    }

    #[test]
    fn test_blur_spreads_impulse() {
        let mut img = GrayImage::new(21, 21);
        img.set(10, 10, 1.0);
        let blurred = gaussian_blur(&img, 1.5);

        // Peak stays at center but shrinks; neighbors pick up mass.
        assert!(blurred.get(10, 10) < 1.0);
        assert!(blurred.get(10, 10) > blurred.get(10, 12));
        assert!(blurred.get(9, 10) > 0.0);

        // Total mass is preserved away from borders.
        let sum: f32 = blurred.data().iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
    }
}
