use super::BrailleCanvas;

/// Draw a line using Bresenham's algorithm
pub fn draw_line(canvas: &mut BrailleCanvas, x0: i32, y0: i32, x1: i32, y1: i32) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    let mut x = x0;
    let mut y = y0;

    loop {
        canvas.set_pixel_signed(x, y);

        if x == x1 && y == y1 {
            break;
        }

        let e2 = 2 * err;

        if e2 >= dy {
            if x == x1 {
                break;
            }
            err += dy;
            x += sx;
        }

        if e2 <= dx {
            if y == y1 {
                break;
            }
            err += dx;
            y += sy;
        }
    }
}

/// Draw a connected run of points, skipping segments that cannot touch the canvas.
/// Non-finite points break the run.
pub fn draw_polyline(canvas: &mut BrailleCanvas, points: impl IntoIterator<Item = (f64, f64)>) {
    let (width, height) = canvas.pixel_size();
    let (width, height) = (width as i32, height as i32);
    let mut prev: Option<(i32, i32)> = None;

    for (x, y) in points {
        if !x.is_finite() || !y.is_finite() {
            prev = None;
            continue;
        }
        // Clamp far-away points so the integer walk stays bounded.
        let px = x.clamp(-4.0 * width as f64, 5.0 * width as f64) as i32;
        let py = y.clamp(-4.0 * height as f64, 5.0 * height as f64) as i32;

        if let Some((prev_x, prev_y)) = prev {
            let visible = px.max(prev_x) >= 0
                && px.min(prev_x) < width
                && py.max(prev_y) >= 0
                && py.min(prev_y) < height;
            if visible {
                draw_line(canvas, prev_x, prev_y, px, py);
            }
        } else {
            canvas.set_pixel_signed(px, py);
        }

        prev = Some((px, py));
    }
}

/// Draw a point marker (small cross)
pub fn draw_marker(canvas: &mut BrailleCanvas, x: i32, y: i32, size: i32) {
    for i in -size..=size {
        canvas.set_pixel_signed(x + i, y);
        canvas.set_pixel_signed(x, y + i);
    }
}

/// Draw a filled circle (bubble series)
pub fn draw_circle(canvas: &mut BrailleCanvas, cx: i32, cy: i32, radius: i32) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                canvas.set_pixel_signed(cx + dx, cy + dy);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horizontal_line() {
        let mut canvas = BrailleCanvas::new(5, 1);
        draw_line(&mut canvas, 0, 0, 9, 0);
        // Top dot row across every cell
        assert_eq!(canvas.to_string(), "⠉⠉⠉⠉⠉");
    }

    #[test]
    fn test_vertical_line() {
        let mut canvas = BrailleCanvas::new(1, 2);
        draw_line(&mut canvas, 0, 0, 0, 7);
        assert_eq!(canvas.to_string(), "⡇\n⡇");
    }

    #[test]
    fn test_polyline_breaks_on_nan() {
        let mut canvas = BrailleCanvas::new(4, 1);
        draw_polyline(
            &mut canvas,
            [(0.0, 0.0), (1.0, 0.0), (f64::NAN, 0.0), (6.0, 0.0), (7.0, 0.0)],
        );
        // Cells 0 and 3 are drawn, the gap in between stays blank
        assert_eq!(canvas.cell(0, 0), 0x09);
        assert_eq!(canvas.cell(1, 0), 0);
        assert_eq!(canvas.cell(2, 0), 0);
        assert_eq!(canvas.cell(3, 0), 0x09);
    }

    #[test]
    fn test_offscreen_segment_skipped() {
        let mut canvas = BrailleCanvas::new(2, 1);
        draw_polyline(&mut canvas, [(-50.0, -50.0), (-10.0, -40.0)]);
        assert!(canvas.is_blank());
    }
}
