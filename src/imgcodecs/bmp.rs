//! Native reader/writer for 24-bit uncompressed BMP.
//!
//! Kept independent of the `image` crate so plain BMP inputs round-trip even
//! in minimal builds. Layout: 14-byte file header (signature `BM`), 40-byte
//! info header, bottom-up BGR rows padded to a 4-byte boundary.

use crate::core::RgbImage;
use crate::error::{Error, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

const BMP_SIGNATURE: u16 = 0x4D42;
const FILE_HEADER_LEN: u32 = 14;
const INFO_HEADER_LEN: u32 = 40;

fn read_u16(r: &mut impl Read) -> Result<u16> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32(r: &mut impl Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_i32(r: &mut impl Read) -> Result<i32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

/// Load a 24-bit uncompressed BMP file.
pub fn read_bmp_24<P: AsRef<Path>>(path: P) -> Result<RgbImage> {
    let path = path.as_ref();
    let mut f = BufReader::new(File::open(path)?);

    let err = |msg: &str| {
        Error::InvalidFormat(format!("{}: {msg}", path.display()))
    };

    if read_u16(&mut f)? != BMP_SIGNATURE {
        return Err(err("not a bitmap file"));
    }
    let _file_size = read_u32(&mut f)?;
    let _reserved1 = read_u16(&mut f)?;
    let _reserved2 = read_u16(&mut f)?;
    let pixel_offset = read_u32(&mut f)?;

    let _info_size = read_u32(&mut f)?;
    let width = read_i32(&mut f)?;
    let height = read_i32(&mut f)?;
    let _planes = read_u16(&mut f)?;
    let bits_per_pixel = read_u16(&mut f)?;
    let compression = read_u32(&mut f)?;

    if bits_per_pixel != 24 {
        return Err(err("non-truecolor bitmaps are not supported"));
    }
    if compression != 0 {
        return Err(err("compressed bitmaps are not supported"));
    }
    if width <= 0 || height <= 0 {
        return Err(err("bad image dimensions"));
    }

    let width = width as usize;
    let height = height as usize;
    let row_stride = (width * 3 + 3) & !3;

    f.seek(SeekFrom::Start(u64::from(pixel_offset)))?;

    let mut image = RgbImage::new(width, height);
    let mut row = vec![0u8; row_stride];
    // Rows are stored bottom-up.
    for y in (0..height).rev() {
        f.read_exact(&mut row)?;
        for x in 0..width {
            let b = f32::from(row[x * 3]) / 255.0;
            let g = f32::from(row[x * 3 + 1]) / 255.0;
            let r = f32::from(row[x * 3 + 2]) / 255.0;
            image.set(x, y, [r, g, b]);
        }
    }

    Ok(image)
}

/// Write an image as a 24-bit uncompressed BMP file.
pub fn write_bmp_24<P: AsRef<Path>>(path: P, image: &RgbImage) -> Result<()> {
    let mut f = BufWriter::new(File::create(path)?);

    let width = image.width();
    let height = image.height();
    let row_stride = (width * 3 + 3) & !3;
    let data_len = (row_stride * height) as u32;
    let file_size = FILE_HEADER_LEN + INFO_HEADER_LEN + data_len;

    f.write_all(&BMP_SIGNATURE.to_le_bytes())?;
    f.write_all(&file_size.to_le_bytes())?;
    f.write_all(&0u16.to_le_bytes())?;
    f.write_all(&0u16.to_le_bytes())?;
    f.write_all(&(FILE_HEADER_LEN + INFO_HEADER_LEN).to_le_bytes())?;

    f.write_all(&INFO_HEADER_LEN.to_le_bytes())?;
    f.write_all(&(width as i32).to_le_bytes())?;
    f.write_all(&(height as i32).to_le_bytes())?;
    f.write_all(&1u16.to_le_bytes())?; // planes
    f.write_all(&24u16.to_le_bytes())?;
    f.write_all(&0u32.to_le_bytes())?; // compression
    f.write_all(&data_len.to_le_bytes())?;
    f.write_all(&0i32.to_le_bytes())?;
    f.write_all(&0i32.to_le_bytes())?;
    f.write_all(&0u32.to_le_bytes())?;
    f.write_all(&0u32.to_le_bytes())?;

    let mut row = vec![0u8; row_stride];
    for y in (0..height).rev() {
        for x in 0..width {
            let [r, g, b] = image.get(x, y);
            row[x * 3] = (b.clamp(0.0, 1.0) * 255.0).round() as u8;
            row[x * 3 + 1] = (g.clamp(0.0, 1.0) * 255.0).round() as u8;
            row[x * 3 + 2] = (r.clamp(0.0, 1.0) * 255.0).round() as u8;
        }
        f.write_all(&row)?;
    }
    f.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bmp_round_trip() {
        let mut img = RgbImage::new(5, 3);
        for y in 0..3 {
            for x in 0..5 {
                img.set(x, y, [x as f32 / 4.0, y as f32 / 2.0, 0.25]);
            }
        }

        let path = std::env::temp_dir().join("prec_bmp_round_trip.bmp");
        write_bmp_24(&path, &img).unwrap();
        let loaded = read_bmp_24(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.width(), 5);
        assert_eq!(loaded.height(), 3);
        for y in 0..3 {
            for x in 0..5 {
                let a = img.get(x, y);
                let b = loaded.get(x, y);
                for ch in 0..3 {
                    assert!((a[ch] - b[ch]).abs() < 1.0 / 255.0 + 1e-6);
                }
            }
        }
    }

    #[test]
    fn test_bmp_rejects_garbage() {
        let path = std::env::temp_dir().join("prec_bmp_garbage.bmp");
        std::fs::write(&path, b"not a bitmap at all").unwrap();
        let result = read_bmp_24(&path);
        std::fs::remove_file(&path).ok();
        assert!(result.is_err());
    }
}
