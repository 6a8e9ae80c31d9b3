#![no_main]

use arbitrary::Arbitrary;
use cigi_core::{DockSide, Rect, Size, dock_side_for, drag_rect, snap_placement};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct DragInput {
    viewport: (u16, u16),
    element: (u16, u16),
    origin: (i32, i32),
    deltas: Vec<(i32, i32)>,
    margin: u8,
}

fuzz_target!(|input: DragInput| {
    let viewport = Size::new(f64::from(input.viewport.0), f64::from(input.viewport.1));
    let size = Size::new(f64::from(input.element.0), f64::from(input.element.1));
    let margin = f64::from(input.margin);
    let origin = Rect::new(
        f64::from(input.origin.0),
        f64::from(input.origin.1),
        size.width,
        size.height,
    );
    let fits_x = size.width + 2.0 * margin <= viewport.width;
    let fits_y = size.height + 2.0 * margin <= viewport.height;

    let mut last = origin;
    for (dx, dy) in input.deltas.iter().take(64) {
        let rect = drag_rect(origin, f64::from(*dx), f64::from(*dy), size, viewport, margin);
        assert!(rect.left >= margin && rect.top >= margin, "{rect:?}");
        if fits_x {
            assert!(rect.right() <= viewport.width - margin, "{rect:?}");
        }
        if fits_y {
            assert!(rect.bottom() <= viewport.height - margin, "{rect:?}");
        }
        last = rect;
    }

    // Snapping is deterministic and respects the chosen edge.
    let side = dock_side_for(last, viewport.width);
    assert_eq!(side, dock_side_for(last, viewport.width));
    let placement = snap_placement(side, last, viewport, margin, margin);
    assert_eq!(placement, snap_placement(side, last, viewport, margin, margin));
    let left = placement.resolved_left(last.width, viewport.width);
    match side {
        DockSide::Left => assert_eq!(left, margin),
        DockSide::Right => assert_eq!(left, viewport.width - last.width - margin),
    }
});
