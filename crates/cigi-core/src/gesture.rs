#![forbid(unsafe_code)]

//! Pointer gesture state machine shared by the drag and resize controllers.
//!
//! One [`GestureMachine`] exists per interactive element. It turns the three
//! pointer phases (down, move, up) plus the trailing `click` into explicit
//! transitions, so the guards and side effects of each phase can be tested
//! without a browser.
//!
//! # State Machine
//!
//! ```text
//! Idle --down--> Active --up--> Settling --click--> Idle
//!                  |                 \--down--> Active
//!                  \--cancel--> Idle
//! ```
//!
//! # Invariants
//!
//! 1. At most one pointer drives a machine at a time; input from any other
//!    pointer is a no-op.
//! 2. `moved` flips to true the first time `|dx| > threshold` or
//!    `|dy| > threshold` and never flips back within a session.
//! 3. Exactly one click following a real drag is suppressed; any click in
//!    `Idle` passes through.
//! 4. `transition_id` increases by one on every applied input, no-ops
//!    included.
//!
//! # Failure Modes
//!
//! - A pointer that disappears without an `up` leaves the machine `Active`
//!   until a `Cancel` or the next `up` from the same pointer arrives.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect, Size, clamp};

/// Movement (in CSS pixels, per axis) beyond which a press becomes a drag.
pub const DEFAULT_DRAG_THRESHOLD: f64 = 3.0;

/// The ephemeral record of one pointer-down-to-pointer-up interaction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GestureSession {
    pub pointer_id: u32,
    /// Pointer position at pointer-down.
    pub start: Point,
    /// Element rectangle at pointer-down.
    pub origin: Rect,
    /// Latest pointer position seen by the session.
    pub current: Point,
    /// Whether the pointer has moved beyond the drag threshold.
    pub moved: bool,
}

impl GestureSession {
    /// Displacement of the latest pointer position from the start.
    #[must_use]
    pub fn delta(&self) -> (f64, f64) {
        self.current.delta_from(self.start)
    }
}

/// Lifecycle state of one gesture machine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GestureState {
    Idle,
    Active(GestureSession),
    /// Pointer released; waiting for the click the browser dispatches after
    /// pointer-up so a real drag can swallow it.
    Settling { pointer_id: u32, was_dragged: bool },
}

/// One input to [`GestureMachine::apply`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureInput {
    PointerDown {
        pointer_id: u32,
        position: Point,
        /// Element rectangle measured at pointer-down.
        origin: Rect,
    },
    PointerMove {
        pointer_id: u32,
        position: Point,
    },
    PointerUp {
        pointer_id: u32,
        position: Point,
    },
    /// Pointer cancel, lost capture, or window blur. `None` cancels whatever
    /// pointer is active.
    Cancel {
        pointer_id: Option<u32>,
    },
    Click,
}

impl GestureInput {
    fn position(&self) -> Option<Point> {
        match self {
            Self::PointerDown { position, .. }
            | Self::PointerMove { position, .. }
            | Self::PointerUp { position, .. } => Some(*position),
            Self::Cancel { .. } | Self::Click => None,
        }
    }
}

/// Why an input was accepted without changing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureNoopReason {
    NoActiveSession,
    SessionAlreadyActive,
    PointerMismatch,
    ClickDuringSession,
}

/// Effect emitted by one transition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum GestureEffect {
    Began {
        pointer_id: u32,
        start: Point,
        origin: Rect,
    },
    Moved {
        pointer_id: u32,
        dx: f64,
        dy: f64,
        /// True only on the move that first crossed the drag threshold.
        drag_started: bool,
    },
    Released {
        pointer_id: u32,
        dx: f64,
        dy: f64,
        was_dragged: bool,
    },
    Canceled {
        pointer_id: u32,
    },
    ClickPassed,
    ClickSuppressed,
    Noop {
        reason: GestureNoopReason,
    },
}

/// One state-machine transition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GestureTransition {
    pub transition_id: u64,
    pub from: GestureState,
    pub to: GestureState,
    pub effect: GestureEffect,
}

/// Gesture machine configuration/runtime errors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureError {
    InvalidThreshold { threshold: f64 },
    NonFinitePosition { x: f64, y: f64 },
}

impl fmt::Display for GestureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidThreshold { threshold } => {
                write!(f, "drag threshold must be finite and >= 0 (got {threshold})")
            }
            Self::NonFinitePosition { x, y } => {
                write!(f, "pointer position must be finite (got {x}, {y})")
            }
        }
    }
}

impl std::error::Error for GestureError {}

/// Per-element pointer gesture machine.
#[derive(Debug, Clone, PartialEq)]
pub struct GestureMachine {
    state: GestureState,
    threshold: f64,
    transition_counter: u64,
}

impl Default for GestureMachine {
    fn default() -> Self {
        Self {
            state: GestureState::Idle,
            threshold: DEFAULT_DRAG_THRESHOLD,
            transition_counter: 0,
        }
    }
}

impl GestureMachine {
    /// Construct a machine with an explicit drag threshold.
    pub fn new(threshold: f64) -> Result<Self, GestureError> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(GestureError::InvalidThreshold { threshold });
        }
        Ok(Self {
            threshold,
            ..Self::default()
        })
    }

    #[must_use]
    pub const fn state(&self) -> GestureState {
        self.state
    }

    #[must_use]
    pub const fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Whether a pointer is currently held down on the element.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.state, GestureState::Active(_))
    }

    /// The active session, if any.
    #[must_use]
    pub const fn session(&self) -> Option<GestureSession> {
        match self.state {
            GestureState::Active(session) => Some(session),
            _ => None,
        }
    }

    /// Pointer id of the active session, if any.
    #[must_use]
    pub fn active_pointer(&self) -> Option<u32> {
        self.session().map(|session| session.pointer_id)
    }

    /// Return to `Idle` unconditionally, e.g. when the element is removed
    /// mid-gesture.
    pub fn reset(&mut self) {
        self.state = GestureState::Idle;
    }

    /// Apply one input and report the resulting transition.
    pub fn apply(&mut self, input: GestureInput) -> Result<GestureTransition, GestureError> {
        if let Some(position) = input.position()
            && !(position.x.is_finite() && position.y.is_finite())
        {
            return Err(GestureError::NonFinitePosition {
                x: position.x,
                y: position.y,
            });
        }

        let from = self.state;
        let effect = match (self.state, input) {
            (
                GestureState::Idle | GestureState::Settling { .. },
                GestureInput::PointerDown {
                    pointer_id,
                    position,
                    origin,
                },
            ) => {
                self.state = GestureState::Active(GestureSession {
                    pointer_id,
                    start: position,
                    origin,
                    current: position,
                    moved: false,
                });
                GestureEffect::Began {
                    pointer_id,
                    start: position,
                    origin,
                }
            }
            (GestureState::Active(_), GestureInput::PointerDown { .. }) => GestureEffect::Noop {
                reason: GestureNoopReason::SessionAlreadyActive,
            },
            (GestureState::Active(session), GestureInput::PointerMove { pointer_id, position }) => {
                if pointer_id != session.pointer_id {
                    GestureEffect::Noop {
                        reason: GestureNoopReason::PointerMismatch,
                    }
                } else {
                    let (dx, dy) = position.delta_from(session.start);
                    let crossed = exceeds_threshold(dx, dy, self.threshold);
                    let drag_started = crossed && !session.moved;
                    self.state = GestureState::Active(GestureSession {
                        current: position,
                        moved: session.moved || crossed,
                        ..session
                    });
                    GestureEffect::Moved {
                        pointer_id,
                        dx,
                        dy,
                        drag_started,
                    }
                }
            }
            (GestureState::Active(session), GestureInput::PointerUp { pointer_id, position }) => {
                if pointer_id != session.pointer_id {
                    GestureEffect::Noop {
                        reason: GestureNoopReason::PointerMismatch,
                    }
                } else {
                    let (dx, dy) = position.delta_from(session.start);
                    let was_dragged = session.moved || exceeds_threshold(dx, dy, self.threshold);
                    self.state = GestureState::Settling {
                        pointer_id,
                        was_dragged,
                    };
                    GestureEffect::Released {
                        pointer_id,
                        dx,
                        dy,
                        was_dragged,
                    }
                }
            }
            (GestureState::Active(session), GestureInput::Cancel { pointer_id }) => {
                if pointer_id.is_some_and(|id| id != session.pointer_id) {
                    GestureEffect::Noop {
                        reason: GestureNoopReason::PointerMismatch,
                    }
                } else {
                    self.state = GestureState::Idle;
                    GestureEffect::Canceled {
                        pointer_id: session.pointer_id,
                    }
                }
            }
            (GestureState::Active(_), GestureInput::Click) => GestureEffect::Noop {
                reason: GestureNoopReason::ClickDuringSession,
            },
            (GestureState::Settling { was_dragged, .. }, GestureInput::Click) => {
                self.state = GestureState::Idle;
                if was_dragged {
                    GestureEffect::ClickSuppressed
                } else {
                    GestureEffect::ClickPassed
                }
            }
            (GestureState::Idle, GestureInput::Click) => GestureEffect::ClickPassed,
            (
                GestureState::Idle | GestureState::Settling { .. },
                GestureInput::PointerMove { .. }
                | GestureInput::PointerUp { .. }
                | GestureInput::Cancel { .. },
            ) => GestureEffect::Noop {
                reason: GestureNoopReason::NoActiveSession,
            },
        };

        self.transition_counter = self.transition_counter.saturating_add(1);
        let transition = GestureTransition {
            transition_id: self.transition_counter,
            from,
            to: self.state,
            effect,
        };
        tracing::trace!(
            transition_id = transition.transition_id,
            effect = ?transition.effect,
            "gesture transition"
        );
        Ok(transition)
    }
}

/// Whether a displacement counts as a drag rather than click jitter.
#[inline]
#[must_use]
pub fn exceeds_threshold(dx: f64, dy: f64, threshold: f64) -> bool {
    dx.abs() > threshold || dy.abs() > threshold
}

/// New element rectangle for a drag displacement of `(dx, dy)` from `origin`.
///
/// Each axis is clamped independently against the live `viewport` and the
/// element's current `measured` size.
#[must_use]
pub fn drag_rect(
    origin: Rect,
    dx: f64,
    dy: f64,
    measured: Size,
    viewport: Size,
    margin: f64,
) -> Rect {
    let left = clamp(
        origin.left + dx,
        margin,
        viewport.width - measured.width - margin,
    );
    let top = clamp(
        origin.top + dy,
        margin,
        viewport.height - measured.height - margin,
    );
    Rect::new(left, top, measured.width, measured.height)
}

/// Size limits for a resizable element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResizeBounds {
    /// Fixed floor for both dimensions.
    pub min: Size,
    /// Clearance kept between the element and the right/bottom viewport edge.
    pub margin: f64,
}

/// New element size for a resize displacement of `(dx, dy)` from the size at
/// gesture start.
///
/// The ceiling is recomputed from the element's current top-left corner and
/// the live viewport so the element never extends past the viewport edge.
/// Width and height are clamped independently; no aspect-ratio lock.
#[must_use]
pub fn resize_size(
    origin: Size,
    dx: f64,
    dy: f64,
    top_left: Point,
    viewport: Size,
    bounds: ResizeBounds,
) -> Size {
    let max_width = viewport.width - top_left.x - bounds.margin;
    let max_height = viewport.height - top_left.y - bounds.margin;
    Size::new(
        clamp(origin.width + dx, bounds.min.width, max_width),
        clamp(origin.height + dy, bounds.min.height, max_height),
    )
}
