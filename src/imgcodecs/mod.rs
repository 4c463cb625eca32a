pub mod bmp;

pub use bmp::{read_bmp_24, write_bmp_24};

use crate::core::RgbImage;
use crate::error::Result;
use image::GenericImageView;
use std::path::Path;

/// Read an image from file into a float RGB surface.
///
/// Plain `.bmp` inputs go through the native 24-bit loader; everything else
/// (JPEG, PNG, ...) is decoded by the `image` crate.
pub fn imread<P: AsRef<Path>>(path: P) -> Result<RgbImage> {
    let path = path.as_ref();
    if path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("bmp"))
    {
        return read_bmp_24(path);
    }

    let img = image::open(path)?;
    let (width, height) = img.dimensions();
    let rgb = img.to_rgb8();
    let data = rgb
        .into_raw()
        .into_iter()
        .map(|v| f32::from(v) / 255.0)
        .collect();
    RgbImage::from_raw(width as usize, height as usize, data)
}

/// Write an image to file; the format is picked from the extension, with
/// `.bmp` handled by the native writer.
pub fn imwrite<P: AsRef<Path>>(path: P, img: &RgbImage) -> Result<()> {
    let path = path.as_ref();
    if path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("bmp"))
    {
        return write_bmp_24(path, img);
    }

    let data: Vec<u8> = (0..img.height())
        .flat_map(|y| (0..img.width()).map(move |x| (x, y)))
        .flat_map(|(x, y)| {
            img.get(x, y)
                .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
        })
        .collect();

    let buffer = image::RgbImage::from_raw(img.width() as u32, img.height() as u32, data)
        .expect("buffer length matches dimensions");
    buffer.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_read_png() {
        let mut img = RgbImage::new(16, 8);
        for x in 0..16 {
            img.set(x, 3, [1.0, 0.0, 0.0]);
        }

        let path = std::env::temp_dir().join("prec_imgcodecs_roundtrip.png");
        imwrite(&path, &img).unwrap();
        let loaded = imread(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.width(), 16);
        assert_eq!(loaded.height(), 8);
        let [r, g, b] = loaded.get(4, 3);
        assert!(r > 0.95 && g < 0.05 && b < 0.05);
    }

    #[test]
    fn test_imread_dispatches_bmp() {
        let mut img = RgbImage::new(4, 4);
        img.set(1, 1, [0.0, 1.0, 0.0]);

        let path = std::env::temp_dir().join("prec_imgcodecs_dispatch.bmp");
        imwrite(&path, &img).unwrap();
        let loaded = imread(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let [_, g, _] = loaded.get(1, 1);
        assert!(g > 0.95);
    }

    #[test]
    fn test_imread_missing_file() {
        assert!(imread("/nonexistent/prec_missing.bmp").is_err());
    }
}
