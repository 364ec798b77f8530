/// Pointer ⇄ native pixel mapping for the editing surface
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Box the image occupies on screen, in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RenderedBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl RenderedBox {
    pub const fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Largest box with the image's aspect ratio centered inside `viewport`
    /// (object-fit: contain).
    pub fn fit(viewport: RenderedBox, native_width: u32, native_height: u32) -> Self {
        if native_width == 0 || native_height == 0 || viewport.width <= 0.0 || viewport.height <= 0.0
        {
            return viewport;
        }
        let scale = (viewport.width / native_width as f32).min(viewport.height / native_height as f32);
        let width = native_width as f32 * scale;
        let height = native_height as f32 * scale;
        Self {
            left: viewport.left + (viewport.width - width) / 2.0,
            top: viewport.top + (viewport.height - height) / 2.0,
            width,
            height,
        }
    }
}

/// Maps viewport coordinates into the image's native pixel space.
///
/// Has no error conditions: points outside the rendered box map to native
/// coordinates outside the image and are clipped later by the mask.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    rendered: RenderedBox,
    native_width: u32,
    native_height: u32,
}

impl CoordinateMapper {
    pub fn new(rendered: RenderedBox, native_width: u32, native_height: u32) -> Self {
        Self {
            rendered,
            native_width,
            native_height,
        }
    }

    /// Viewport resized or image re-laid out.
    pub fn set_rendered(&mut self, rendered: RenderedBox) {
        self.rendered = rendered;
    }

    /// Image replaced with one of different native size.
    pub fn set_native_size(&mut self, width: u32, height: u32) {
        self.native_width = width;
        self.native_height = height;
    }

    pub fn rendered(&self) -> RenderedBox {
        self.rendered
    }

    pub fn native_size(&self) -> (u32, u32) {
        (self.native_width, self.native_height)
    }

    /// Display-to-native scale factor per axis. A collapsed rendered box
    /// (zero or negative extent) maps with a factor of 1.
    pub fn scale(&self) -> (f32, f32) {
        (
            axis_scale(self.native_width, self.rendered.width),
            axis_scale(self.native_height, self.rendered.height),
        )
    }

    pub fn to_native(&self, pointer: Point) -> Point {
        let (sx, sy) = self.scale();
        Point {
            x: (pointer.x - self.rendered.left) * sx,
            y: (pointer.y - self.rendered.top) * sy,
        }
    }

    pub fn to_viewport(&self, native: Point) -> Point {
        let (sx, sy) = self.scale();
        Point {
            x: native.x / sx + self.rendered.left,
            y: native.y / sy + self.rendered.top,
        }
    }

    /// Brush diameter as seen on screen for a native-pixel diameter.
    pub fn viewport_length(&self, native_length: f32) -> f32 {
        let (sx, _) = self.scale();
        native_length / sx
    }
}

fn axis_scale(native: u32, rendered: f32) -> f32 {
    if rendered > 0.0 && rendered.is_finite() && native > 0 {
        native as f32 / rendered
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: Point, b: Point) {
        assert!(
            (a.x - b.x).abs() < 1e-3 && (a.y - b.y).abs() < 1e-3,
            "{a:?} != {b:?}"
        );
    }

    #[test]
    fn test_maps_pointer_into_native_space() {
        let mapper = CoordinateMapper::new(RenderedBox::new(100.0, 50.0, 512.0, 288.0), 1024, 576);
        assert_eq!(mapper.scale(), (2.0, 2.0));
        assert_close(mapper.to_native(Point::new(100.0, 50.0)), Point::new(0.0, 0.0));
        assert_close(mapper.to_native(Point::new(356.0, 194.0)), Point::new(512.0, 288.0));
    }

    #[test]
    fn test_out_of_bounds_passes_through() {
        let mapper = CoordinateMapper::new(RenderedBox::new(10.0, 10.0, 100.0, 100.0), 200, 200);
        assert_close(mapper.to_native(Point::new(0.0, 0.0)), Point::new(-20.0, -20.0));
        assert_close(mapper.to_native(Point::new(300.0, 10.0)), Point::new(580.0, 0.0));
    }

    #[test]
    fn test_round_trip_reconstructs_pointer() {
        let boxes = [
            RenderedBox::new(0.0, 0.0, 640.0, 360.0),
            RenderedBox::new(37.5, 12.25, 333.3, 777.7),
            RenderedBox::new(-20.0, 400.0, 1920.0, 1080.0),
        ];
        let path = [
            Point::new(0.0, 0.0),
            Point::new(12.3, 45.6),
            Point::new(640.0, 360.0),
            Point::new(-50.0, 900.0),
        ];
        for rendered in boxes {
            let mapper = CoordinateMapper::new(rendered, 1344, 768);
            for p in path {
                assert_close(mapper.to_viewport(mapper.to_native(p)), p);
            }
        }
    }

    #[test]
    fn test_recomputes_after_resize() {
        let mut mapper = CoordinateMapper::new(RenderedBox::new(0.0, 0.0, 100.0, 100.0), 100, 100);
        assert_close(mapper.to_native(Point::new(50.0, 50.0)), Point::new(50.0, 50.0));
        mapper.set_rendered(RenderedBox::new(0.0, 0.0, 50.0, 50.0));
        assert_close(mapper.to_native(Point::new(50.0, 50.0)), Point::new(100.0, 100.0));
        mapper.set_native_size(400, 200);
        assert_eq!(mapper.scale(), (8.0, 4.0));
    }

    #[test]
    fn test_collapsed_box_does_not_divide_by_zero() {
        let mapper = CoordinateMapper::new(RenderedBox::new(5.0, 5.0, 0.0, 0.0), 100, 100);
        assert_eq!(mapper.scale(), (1.0, 1.0));
        assert_close(mapper.to_native(Point::new(6.0, 7.0)), Point::new(1.0, 2.0));
    }

    #[test]
    fn test_fit_letterboxes() {
        let fitted = RenderedBox::fit(RenderedBox::new(0.0, 0.0, 800.0, 800.0), 1600, 900);
        assert_eq!(fitted.width, 800.0);
        assert_eq!(fitted.height, 450.0);
        assert_eq!(fitted.top, 175.0);
        assert_eq!(fitted.left, 0.0);
    }
}
