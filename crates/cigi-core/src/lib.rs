#![forbid(unsafe_code)]

//! Host-independent engine for the CIGI page overlay.
//!
//! # Role in CIGI Overlay
//! `cigi-core` owns the parts of the overlay that are pure functions of their
//! inputs: clamp/bounds math, the per-element pointer gesture state machine,
//! and the edge-snapping rule for the floating launcher. Nothing in here
//! touches the DOM, a store, or a clock.
//!
//! # How it fits in the system
//! `cigi-overlay` drives these pieces from its controllers against an
//! abstract host, and `cigi-web` feeds them real browser pointer events.

pub mod geometry;
pub mod gesture;
pub mod snap;

pub use geometry::{Point, Rect, Size, clamp, clamp_rect_to_viewport, compute_clamped_rect};
pub use gesture::{
    DEFAULT_DRAG_THRESHOLD, GestureEffect, GestureError, GestureInput, GestureMachine,
    GestureNoopReason, GestureSession, GestureState, GestureTransition, ResizeBounds, drag_rect,
    exceeds_threshold, resize_size,
};
pub use snap::{
    DockSide, HorizontalAnchor, Placement, SNAP_TRANSITION_MS, SnapTransition, dock_side_for,
    snap_placement,
};
