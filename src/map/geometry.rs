use crate::braille::BrailleCanvas;

/// Bresenham line between two braille pixels.
pub fn draw_line(canvas: &mut BrailleCanvas, x0: i32, y0: i32, x1: i32, y1: i32) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let (mut x, mut y) = (x0, y0);

    loop {
        canvas.set_pixel_signed(x, y);
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

/// Line drawn `width` pixels wide by offsetting copies along the minor axis.
pub fn draw_wide_line(canvas: &mut BrailleCanvas, (x0, y0): (i32, i32), (x1, y1): (i32, i32), width: u8) {
    let steep = (y1 - y0).abs() > (x1 - x0).abs();
    for offset in 0..width.max(1) as i32 {
        let shift = if offset % 2 == 0 { offset / 2 } else { -(offset + 1) / 2 };
        if steep {
            draw_line(canvas, x0 + shift, y0, x1 + shift, y1);
        } else {
            draw_line(canvas, x0, y0 + shift, x1, y1 + shift);
        }
    }
}

/// Filled disc, used for point markers.
pub fn draw_disc(canvas: &mut BrailleCanvas, cx: i32, cy: i32, radius: i32) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                canvas.set_pixel_signed(cx + dx, cy + dy);
            }
        }
    }
}

/// Scanline fill of a closed ring. `density` in `0.0..=1.0` thins the fill
/// to a regular stipple so outlines stay readable underneath.
pub fn fill_polygon(canvas: &mut BrailleCanvas, ring: &[(i32, i32)], density: f32) {
    if ring.len() < 3 || density <= 0.0 {
        return;
    }
    let stride = (1.0 / density.min(1.0)).round().max(1.0) as i32;
    let max_y = canvas.pixel_height() as i32 - 1;
    let top = ring.iter().map(|p| p.1).min().unwrap_or(0).max(0);
    let bottom = ring.iter().map(|p| p.1).max().unwrap_or(0).min(max_y);

    let mut crossings = Vec::new();
    for y in top..=bottom {
        crossings.clear();
        let scan = y as f64 + 0.5;
        for (i, &(ax, ay)) in ring.iter().enumerate() {
            let (bx, by) = ring[(i + 1) % ring.len()];
            let (ay, by) = (ay as f64, by as f64);
            if (ay <= scan) != (by <= scan) {
                let t = (scan - ay) / (by - ay);
                crossings.push(ax as f64 + t * (bx - ax) as f64);
            }
        }
        crossings.sort_by(|a, b| a.total_cmp(b));

        for span in crossings.chunks_exact(2) {
            let (from, to) = (span[0].ceil() as i32, span[1].floor() as i32);
            for x in from.max(0)..=to {
                if (x + y) % stride == 0 {
                    canvas.set_pixel_signed(x, y);
                }
            }
        }
    }
}
