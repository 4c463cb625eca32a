use crate::core::RgbImage;

/// Draw a line segment with Bresenham stepping. Endpoints outside the image
/// are clipped per pixel.
pub fn draw_line(img: &mut RgbImage, x0: i32, y0: i32, x1: i32, y1: i32, color: [f32; 3]) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let (mut x, mut y) = (x0, y0);

    loop {
        if x >= 0 && y >= 0 && (x as usize) < img.width() && (y as usize) < img.height() {
            img.set(x as usize, y as usize, color);
        }
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_horizontal_line() {
        let mut img = RgbImage::new(10, 10);
        draw_line(&mut img, 1, 5, 8, 5, [1.0, 0.0, 0.0]);
        for x in 1..=8 {
            assert_eq!(img.get(x, 5)[0], 1.0);
        }
        assert_eq!(img.get(0, 5)[0], 0.0);
    }

    #[test]
    fn test_draw_line_clips_out_of_bounds() {
        let mut img = RgbImage::new(4, 4);
        draw_line(&mut img, -5, 2, 10, 2, [0.0, 1.0, 0.0]);
        for x in 0..4 {
            assert_eq!(img.get(x, 2)[1], 1.0);
        }
    }
}
