//! Plain value types for surface-space rectangles and source-pixel rectangles.
//!
//! `RectF` is `Copy` and every operation returns a new rectangle, so the
//! viewport controller replaces its display/last/idle rectangles wholesale
//! instead of mutating them in place.

/// A point in surface coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointF {
    pub x: f32,
    pub y: f32,
}

impl PointF {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: PointF) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn midpoint(self, other: PointF) -> PointF {
        PointF::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// Axis-aligned floating point rectangle (left, top, right, bottom).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RectF {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl RectF {
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Rectangle anchored at the origin with the given size.
    pub fn from_size(width: f32, height: f32) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// True when either side is zero or negative.
    pub fn is_empty(&self) -> bool {
        !(self.width() > 0.0 && self.height() > 0.0)
    }

    pub fn translate(&self, dx: f32, dy: f32) -> Self {
        Self::new(
            self.left + dx,
            self.top + dy,
            self.right + dx,
            self.bottom + dy,
        )
    }

    /// Multiply every edge by `factor`, i.e. scale about the origin.
    pub fn scale(&self, factor: f32) -> Self {
        Self::new(
            self.left * factor,
            self.top * factor,
            self.right * factor,
            self.bottom * factor,
        )
    }

    /// Scale about `pivot` with independent horizontal and vertical factors.
    ///
    /// Each edge moves by `(factor - 1) * (edge - pivot)`, so the pivot
    /// maps onto itself.
    pub fn scale_about(&self, pivot: PointF, factor_x: f32, factor_y: f32) -> Self {
        let delta_left = (factor_x - 1.0) * (self.left - pivot.x);
        let delta_right = (factor_x - 1.0) * (self.right - pivot.x);
        let delta_top = (factor_y - 1.0) * (self.top - pivot.y);
        let delta_bottom = (factor_y - 1.0) * (self.bottom - pivot.y);
        Self::new(
            self.left + delta_left,
            self.top + delta_top,
            self.right + delta_right,
            self.bottom + delta_bottom,
        )
    }

    /// Overlap of two rectangles, `None` when they do not overlap with a
    /// positive area.
    pub fn intersect(&self, other: &RectF) -> Option<RectF> {
        let rect = RectF::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        (!rect.is_empty()).then_some(rect)
    }

    pub fn contains_rect(&self, other: &RectF) -> bool {
        self.left <= other.left
            && self.top <= other.top
            && self.right >= other.right
            && self.bottom >= other.bottom
    }
}

/// Integer rectangle in source-image pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether the rectangle lies fully inside an image of the given size.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x as u64 + self.width as u64 <= width as u64
            && self.y as u64 + self.height as u64 <= height as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_about_keeps_pivot_fixed() {
        let rect = RectF::new(10.0, 20.0, 110.0, 220.0);
        let pivot = PointF::new(60.0, 120.0);
        let scaled = rect.scale_about(pivot, 2.0, 2.0);
        assert_eq!(scaled, RectF::new(-40.0, -80.0, 160.0, 320.0));
        // Pivot sits at the same relative position before and after.
        let before = (pivot.x - rect.left) / rect.width();
        let after = (pivot.x - scaled.left) / scaled.width();
        assert_eq!(before, after);
    }

    #[test]
    fn test_intersect() {
        let a = RectF::new(0.0, 0.0, 8000.0, 6000.0);
        let b = RectF::new(0.0, 0.0, 1000.0, 800.0);
        assert_eq!(a.intersect(&b), Some(b));

        let far = RectF::new(9000.0, 0.0, 9500.0, 100.0);
        assert_eq!(a.intersect(&far), None);

        // Touching edges share no area.
        let touching = RectF::new(8000.0, 0.0, 8100.0, 100.0);
        assert_eq!(a.intersect(&touching), None);
    }

    #[test]
    fn test_empty_and_degenerate() {
        assert!(RectF::default().is_empty());
        assert!(RectF::new(5.0, 5.0, 4.0, 10.0).is_empty());
        assert!(!RectF::from_size(1.0, 1.0).is_empty());
        assert!(PixelRect::new(0, 0, 0, 10).is_empty());
    }

    #[test]
    fn test_pixel_rect_fits_within() {
        assert!(PixelRect::new(0, 0, 500, 400).fits_within(4000, 3000));
        assert!(PixelRect::new(3500, 2600, 500, 400).fits_within(4000, 3000));
        assert!(!PixelRect::new(3501, 0, 500, 400).fits_within(4000, 3000));
    }

    #[test]
    fn test_point_distance_and_midpoint() {
        let a = PointF::new(0.0, 0.0);
        let b = PointF::new(30.0, 40.0);
        assert_eq!(a.distance(b), 50.0);
        assert_eq!(a.midpoint(b), PointF::new(15.0, 20.0));
    }
}
