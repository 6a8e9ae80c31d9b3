#![forbid(unsafe_code)]

//! Edge snapping for the floating launcher.
//!
//! After a drag ends the launcher docks to whichever vertical viewport edge
//! is nearer to its horizontal center. The chosen side is remembered by the
//! caller so a viewport resize re-applies the same side without re-deriving
//! it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::{Rect, Size, clamp};

/// Duration of the eased snap animation.
pub const SNAP_TRANSITION_MS: u32 = 150;

/// Viewport edge a floating element rests against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DockSide {
    Left,
    Right,
}

impl DockSide {
    /// Attribute value recorded on the element (`data-side`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    /// Parse an attribute value written by [`DockSide::as_str`].
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }
}

impl fmt::Display for DockSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which horizontal edge an element is positioned from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "edge", content = "offset", rename_all = "snake_case")]
pub enum HorizontalAnchor {
    /// `left: <offset>px; right: auto`.
    Left(f64),
    /// `left: auto; right: <offset>px`.
    Right(f64),
}

/// Fixed-position placement of a floating element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub horizontal: HorizontalAnchor,
    pub top: f64,
}

impl Placement {
    /// Explicit left/top placement, clearing any right anchoring.
    #[must_use]
    pub const fn explicit(left: f64, top: f64) -> Self {
        Self {
            horizontal: HorizontalAnchor::Left(left),
            top,
        }
    }

    /// Explicit placement at a rectangle's top-left corner.
    #[must_use]
    pub const fn at(rect: Rect) -> Self {
        Self::explicit(rect.left, rect.top)
    }

    /// Right-anchored placement.
    #[must_use]
    pub const fn from_right(right: f64, top: f64) -> Self {
        Self {
            horizontal: HorizontalAnchor::Right(right),
            top,
        }
    }

    /// Resolve to a left coordinate for an element of `width` in a viewport
    /// of `viewport_width`.
    #[must_use]
    pub fn resolved_left(&self, width: f64, viewport_width: f64) -> f64 {
        match self.horizontal {
            HorizontalAnchor::Left(left) => left,
            HorizontalAnchor::Right(right) => viewport_width - width - right,
        }
    }
}

/// Eased transition applied to the position properties when snapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapTransition {
    pub duration_ms: u32,
}

impl Default for SnapTransition {
    fn default() -> Self {
        Self {
            duration_ms: SNAP_TRANSITION_MS,
        }
    }
}

impl SnapTransition {
    /// CSS `transition` shorthand for the snapped properties.
    #[must_use]
    pub fn to_css(&self) -> String {
        let ms = self.duration_ms;
        format!("left {ms}ms ease-out, right {ms}ms ease-out, top {ms}ms ease-out")
    }
}

/// Decide which edge a released element docks to.
///
/// Center strictly left of the viewport midpoint docks left; the midpoint
/// itself docks right.
#[must_use]
pub fn dock_side_for(rect: Rect, viewport_width: f64) -> DockSide {
    if rect.center_x() < viewport_width / 2.0 {
        DockSide::Left
    } else {
        DockSide::Right
    }
}

/// Placement that rests `rect` against `side`, `inset` pixels from the edge.
///
/// The vertical position is kept, clamped so the element stays fully inside
/// the viewport with `vertical_margin` clearance.
#[must_use]
pub fn snap_placement(
    side: DockSide,
    rect: Rect,
    viewport: Size,
    inset: f64,
    vertical_margin: f64,
) -> Placement {
    let top = clamp(
        rect.top,
        vertical_margin,
        viewport.height - rect.height - vertical_margin,
    );
    match side {
        DockSide::Left => Placement::explicit(inset, top),
        DockSide::Right => Placement::from_right(inset, top),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn left_of_midpoint_docks_left() {
        let rect = Rect::new(100.0, 50.0, 40.0, 40.0);
        assert_eq!(dock_side_for(rect, 1000.0), DockSide::Left);
    }

    #[test]
    fn midpoint_tie_docks_right() {
        let rect = Rect::new(480.0, 50.0, 40.0, 40.0);
        assert_eq!(rect.center_x(), 500.0);
        assert_eq!(dock_side_for(rect, 1000.0), DockSide::Right);
    }

    #[test]
    fn snap_keeps_top_within_viewport() {
        let viewport = Size::new(1000.0, 600.0);
        let rect = Rect::new(700.0, 590.0, 40.0, 40.0);
        let placement = snap_placement(DockSide::Right, rect, viewport, 8.0, 4.0);
        assert_eq!(placement, Placement::from_right(8.0, 556.0));
    }

    #[test]
    fn resolved_left_for_right_anchor() {
        let placement = Placement::from_right(8.0, 0.0);
        assert_eq!(placement.resolved_left(40.0, 1000.0), 952.0);
    }

    #[test]
    fn transition_css_lists_position_properties() {
        assert_eq!(
            SnapTransition::default().to_css(),
            "left 150ms ease-out, right 150ms ease-out, top 150ms ease-out"
        );
    }

    #[test]
    fn dock_side_round_trips_through_attribute() {
        for side in [DockSide::Left, DockSide::Right] {
            assert_eq!(DockSide::parse(side.as_str()), Some(side));
        }
        assert_eq!(DockSide::parse("top"), None);
    }
}
