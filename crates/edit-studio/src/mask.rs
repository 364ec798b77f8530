/// Off-screen inpainting mask, rasterized at the image's native resolution
///
/// Strokes are Bresenham lines stamped with a filled disk (round cap and
/// join). Coverage is an opaque union: painted pixels are 255, everything
/// else 0, so repainting an area never changes the result.
use std::io::Cursor;

use image::{GrayImage, ImageFormat, Luma};

use crate::coords::Point;
use crate::data_url::DataUrl;
use crate::{Result, StudioError};

const PAINTED: Luma<u8> = Luma([255]);

pub const MIN_BRUSH_DIAMETER: f32 = 1.0;

#[derive(Debug, Clone)]
pub struct MaskSurface {
    pixels: GrayImage,
    brush_diameter: f32,
    last_point: Option<Point>,
    painted: usize,
}

impl MaskSurface {
    pub fn new(width: u32, height: u32, brush_diameter: f32) -> Self {
        Self {
            pixels: GrayImage::new(width, height),
            brush_diameter: brush_diameter.max(MIN_BRUSH_DIAMETER),
            last_point: None,
            painted: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn brush_diameter(&self) -> f32 {
        self.brush_diameter
    }

    /// Takes effect from the next stamped point; existing paint is untouched.
    pub fn set_brush_diameter(&mut self, diameter: f32) {
        if diameter.is_finite() {
            self.brush_diameter = diameter.max(MIN_BRUSH_DIAMETER);
        }
    }

    /// Start a stroke. A stroke with a single point leaves a round dot.
    pub fn begin(&mut self, point: Point) {
        if !is_finite(point) {
            return;
        }
        self.stamp(point);
        self.last_point = Some(point);
    }

    /// Continue the current stroke to `point`; starts one if none is open.
    pub fn extend(&mut self, point: Point) {
        if !is_finite(point) {
            return;
        }
        match self.last_point {
            Some(from) => {
                self.draw_segment(from, point);
                self.last_point = Some(point);
            }
            None => self.begin(point),
        }
    }

    pub fn end(&mut self) {
        self.last_point = None;
    }

    pub fn is_stroking(&self) -> bool {
        self.last_point.is_some()
    }

    pub fn clear(&mut self) {
        self.pixels = GrayImage::new(self.width(), self.height());
        self.last_point = None;
        self.painted = 0;
    }

    /// Match a new image's native size. Always clears.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.pixels = GrayImage::new(width, height);
        self.last_point = None;
        self.painted = 0;
    }

    pub fn has_paint(&self) -> bool {
        self.painted > 0
    }

    pub fn painted_pixels(&self) -> usize {
        self.painted
    }

    pub fn is_painted(&self, x: u32, y: u32) -> bool {
        self.pixels
            .get_pixel_checked(x, y)
            .map(|p| p.0[0] != 0)
            .unwrap_or(false)
    }

    pub fn pixels(&self) -> &GrayImage {
        &self.pixels
    }

    /// Grayscale PNG, white where painted.
    pub fn export_png(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.pixels
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| StudioError::Encode(e.to_string()))?;
        Ok(bytes)
    }

    pub fn export_data_url(&self) -> Result<String> {
        Ok(DataUrl::png(self.export_png()?).to_url())
    }

    fn radius(&self) -> f32 {
        self.brush_diameter / 2.0
    }

    fn draw_segment(&mut self, from: Point, to: Point) {
        let pad = self.radius() + 1.0;
        let Some((from, to)) = clip_segment(
            from,
            to,
            -pad,
            -pad,
            self.width() as f32 + pad,
            self.height() as f32 + pad,
        ) else {
            return;
        };

        let (mut x0, mut y0) = (from.x.floor() as i64, from.y.floor() as i64);
        let (x1, y1) = (to.x.floor() as i64, to.y.floor() as i64);
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        self.stamp(from);
        loop {
            self.stamp(Point::new(x0 as f32 + 0.5, y0 as f32 + 0.5));
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
        self.stamp(to);
    }

    /// Fill the disk of the brush around `center`, plus the pixel that
    /// contains it so sub-pixel brushes still leave a mark.
    fn stamp(&mut self, center: Point) {
        let (width, height) = self.dimensions();
        if width == 0 || height == 0 {
            return;
        }
        let r = self.radius();
        let r2 = r * r;
        let min_x = ((center.x - r).floor() as i64).max(0);
        let min_y = ((center.y - r).floor() as i64).max(0);
        let max_x = ((center.x + r).ceil() as i64).min(width as i64 - 1);
        let max_y = ((center.y + r).ceil() as i64).min(height as i64 - 1);

        for py in min_y..=max_y {
            for px in min_x..=max_x {
                let dx = px as f32 + 0.5 - center.x;
                let dy = py as f32 + 0.5 - center.y;
                if dx * dx + dy * dy <= r2 {
                    self.paint(px as u32, py as u32);
                }
            }
        }

        let (cx, cy) = (center.x.floor() as i64, center.y.floor() as i64);
        if cx >= 0 && cy >= 0 && cx < width as i64 && cy < height as i64 {
            self.paint(cx as u32, cy as u32);
        }
    }

    fn paint(&mut self, x: u32, y: u32) {
        let pixel = self.pixels.get_pixel_mut(x, y);
        if pixel.0[0] == 0 {
            *pixel = PAINTED;
            self.painted += 1;
        }
    }
}

fn is_finite(point: Point) -> bool {
    point.x.is_finite() && point.y.is_finite()
}

/// Liang–Barsky clip of a segment to an axis-aligned rectangle. Computed in
/// f64 so far-off endpoints do not lose the on-canvas part.
fn clip_segment(
    from: Point,
    to: Point,
    min_x: f32,
    min_y: f32,
    max_x: f32,
    max_y: f32,
) -> Option<(Point, Point)> {
    let (fx, fy) = (from.x as f64, from.y as f64);
    let dx = to.x as f64 - fx;
    let dy = to.y as f64 - fy;
    let mut t0 = 0.0_f64;
    let mut t1 = 1.0_f64;

    for (p, q) in [
        (-dx, fx - min_x as f64),
        (dx, max_x as f64 - fx),
        (-dy, fy - min_y as f64),
        (dy, max_y as f64 - fy),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            if t > t1 {
                return None;
            }
            t0 = t0.max(t);
        } else {
            if t < t0 {
                return None;
            }
            t1 = t1.min(t);
        }
    }

    Some((
        Point::new((fx + t0 * dx) as f32, (fy + t0 * dy) as f32),
        Point::new((fx + t1 * dx) as f32, (fy + t1 * dy) as f32),
    ))
}
