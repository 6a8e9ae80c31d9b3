#![forbid(unsafe_code)]

//! Geometric primitives in viewport (CSS pixel) coordinates.
//!
//! Origin is the top-left corner of the viewport; `x` grows to the right and
//! `y` grows downward. All values are `f64` because browsers report
//! fractional pixel positions for both pointers and layout boxes.

use serde::{Deserialize, Serialize};

/// A point in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Component-wise offset from `origin` to `self`.
    #[inline]
    pub fn delta_from(self, origin: Point) -> (f64, f64) {
        (self.x - origin.x, self.y - origin.y)
    }
}

/// A width/height pair.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    /// Create a new size.
    #[inline]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// True if either dimension is zero, negative, or not finite.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        !(self.width.is_finite() && self.height.is_finite())
            || self.width <= 0.0
            || self.height <= 0.0
    }

    /// Return `self`, or `fallback` when `self` is degenerate.
    ///
    /// Hidden or not-yet-laid-out elements measure as zero; callers use this
    /// to fall back to the element's nominal size.
    #[inline]
    pub fn or(self, fallback: Size) -> Size {
        if self.is_degenerate() { fallback } else { self }
    }
}

/// An axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub left: f64,
    /// Top edge.
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// Create a new rectangle.
    #[inline]
    pub const fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Create a rectangle from an origin and a size.
    #[inline]
    pub const fn from_origin_size(origin: Point, size: Size) -> Self {
        Self::new(origin.x, origin.y, size.width, size.height)
    }

    /// Top-left corner.
    #[inline]
    pub const fn origin(&self) -> Point {
        Point::new(self.left, self.top)
    }

    #[inline]
    pub const fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Right edge (exclusive).
    #[inline]
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    /// Bottom edge (exclusive).
    #[inline]
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Horizontal center.
    #[inline]
    pub fn center_x(&self) -> f64 {
        self.left + self.width / 2.0
    }

    /// Same rectangle moved to a new origin.
    #[inline]
    pub const fn with_origin(self, left: f64, top: f64) -> Self {
        Self::new(left, top, self.width, self.height)
    }

    /// Same origin with a new size.
    #[inline]
    pub const fn with_size(self, size: Size) -> Self {
        Self::new(self.left, self.top, size.width, size.height)
    }

    /// Whether the rectangle lies entirely inside `viewport` inset by `margin`.
    pub fn fits_within(&self, viewport: Size, margin: f64) -> bool {
        self.left >= margin
            && self.top >= margin
            && self.right() <= viewport.width - margin
            && self.bottom() <= viewport.height - margin
    }
}

/// Bound `value` to `[min, max]`.
///
/// Callers are expected to pass `min <= max`. When they don't, the lower
/// bound wins, which pins an element larger than its container to the
/// leading margin. A NaN `value` resolves to `min`.
#[inline]
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        return min;
    }
    value.min(max).max(min)
}

/// Clamp a desired top-left position so a `width`×`height` box stays inside
/// the viewport with `margin` pixels of clearance on every side.
///
/// If the viewport is smaller than the element plus margins, the element is
/// pinned to the margin on that axis.
pub fn compute_clamped_rect(
    desired_left: f64,
    desired_top: f64,
    width: f64,
    height: f64,
    viewport_width: f64,
    viewport_height: f64,
    margin: f64,
) -> Rect {
    let left = clamp(desired_left, margin, viewport_width - width - margin);
    let top = clamp(desired_top, margin, viewport_height - height - margin);
    Rect::new(left, top, width, height)
}

/// [`compute_clamped_rect`] for an existing rectangle.
#[inline]
pub fn clamp_rect_to_viewport(rect: Rect, viewport: Size, margin: f64) -> Rect {
    compute_clamped_rect(
        rect.left,
        rect.top,
        rect.width,
        rect.height,
        viewport.width,
        viewport.height,
        margin,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn clamp_inside_range_is_identity() {
        assert_eq!(clamp(5.0, 0.0, 10.0), 5.0);
    }

    #[test]
    fn clamp_bounds() {
        assert_eq!(clamp(-3.0, 0.0, 10.0), 0.0);
        assert_eq!(clamp(42.0, 0.0, 10.0), 10.0);
    }

    #[test]
    fn clamp_inverted_bounds_prefers_lower() {
        assert_eq!(clamp(50.0, 8.0, -20.0), 8.0);
        assert_eq!(clamp(-50.0, 8.0, -20.0), 8.0);
    }

    #[test]
    fn clamp_nan_resolves_to_min() {
        assert_eq!(clamp(f64::NAN, 4.0, 10.0), 4.0);
    }

    #[test]
    fn clamped_rect_within_bounds_is_unchanged() {
        let rect = compute_clamped_rect(50.0, 80.0, 720.0, 400.0, 1920.0, 1080.0, 8.0);
        assert_eq!(rect, Rect::new(50.0, 80.0, 720.0, 400.0));
    }

    #[test]
    fn clamped_rect_pulls_back_from_far_edges() {
        let rect = compute_clamped_rect(1900.0, 1000.0, 40.0, 40.0, 1920.0, 1080.0, 4.0);
        assert_eq!(rect.left, 1876.0);
        assert_eq!(rect.top, 1036.0);
    }

    #[test]
    fn degenerate_viewport_pins_to_margin() {
        let rect = compute_clamped_rect(300.0, 300.0, 720.0, 400.0, 500.0, 300.0, 8.0);
        assert_eq!(rect.left, 8.0);
        assert_eq!(rect.top, 8.0);
    }

    #[test]
    fn fits_within_respects_margin() {
        let viewport = Size::new(100.0, 100.0);
        assert!(Rect::new(4.0, 4.0, 92.0, 92.0).fits_within(viewport, 4.0));
        assert!(!Rect::new(3.0, 4.0, 92.0, 92.0).fits_within(viewport, 4.0));
    }

    #[test]
    fn size_or_falls_back_when_unmeasured() {
        let fallback = Size::new(40.0, 40.0);
        assert_eq!(Size::new(0.0, 0.0).or(fallback), fallback);
        assert_eq!(Size::new(48.0, 40.0).or(fallback), Size::new(48.0, 40.0));
    }
}
