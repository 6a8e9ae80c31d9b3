#![forbid(unsafe_code)]

//! Pointer lifecycle adapter for the overlay elements.
//!
//! Browser pointer signals arrive from several places: `pointerdown` on the
//! launcher, the panel header or the resize handle, and `pointermove`,
//! `pointerup`, `pointercancel`, `blur` and `visibilitychange` at window
//! scope. This module folds them into [`OverlayEvent`]s while enforcing:
//! - one active pointer per grab area, so the launcher, the panel header
//!   and the resize handle track their gestures independently,
//! - primary-button activation only,
//! - cancellation on interruption paths (blur, hidden tab, lost capture,
//!   leave before capture was acknowledged).
//!
//! Capture itself is requested by the controllers through the host; the
//! adapter only tracks whether the page acknowledged it.

use cigi_core::Point;
use cigi_overlay::{OverlayEvent, OverlayTarget};

/// Mouse button reported by a pointer event (`PointerEvent.button`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Middle,
    Secondary,
    Other(i16),
}

impl PointerButton {
    #[must_use]
    pub const fn from_dom(button: i16) -> Self {
        match button {
            0 => Self::Primary,
            1 => Self::Middle,
            2 => Self::Secondary,
            other => Self::Other(other),
        }
    }
}

/// Adapter configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerCaptureConfig {
    /// Button required to begin a gesture.
    pub activation_button: PointerButton,
    /// If true, pointer leave cancels the gesture when capture was requested
    /// but never acknowledged.
    pub cancel_on_leave_without_capture: bool,
}

impl Default for PointerCaptureConfig {
    fn default() -> Self {
        Self {
            activation_button: PointerButton::Primary,
            cancel_on_leave_without_capture: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaptureState {
    Requested,
    Acquired,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ActivePointer {
    pointer_id: u32,
    target: OverlayTarget,
    button: PointerButton,
    capture_state: CaptureState,
}

/// Lifecycle phase recorded for one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    PointerDown,
    PointerMove,
    PointerUp,
    PointerCancel,
    PointerLeave,
    Blur,
    VisibilityHidden,
    LostPointerCapture,
    CaptureAcquired,
}

impl PointerPhase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PointerDown => "pointer_down",
            Self::PointerMove => "pointer_move",
            Self::PointerUp => "pointer_up",
            Self::PointerCancel => "pointer_cancel",
            Self::PointerLeave => "pointer_leave",
            Self::Blur => "blur",
            Self::VisibilityHidden => "visibility_hidden",
            Self::LostPointerCapture => "lost_pointer_capture",
            Self::CaptureAcquired => "capture_acquired",
        }
    }
}

/// Why an incoming signal was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerIgnoredReason {
    ButtonNotAllowed,
    ButtonMismatch,
    ActivePointerAlreadyInProgress,
    NoActivePointer,
    PointerMismatch,
    LeaveWhileCaptured,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerLogOutcome {
    Forwarded,
    CaptureStateUpdated,
    Ignored(PointerIgnoredReason),
}

/// Structured record of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerLogEntry {
    pub phase: PointerPhase,
    pub sequence: Option<u64>,
    pub pointer_id: Option<u32>,
    pub target: Option<OverlayTarget>,
    pub position: Option<Point>,
    pub outcome: PointerLogOutcome,
}

impl PointerLogEntry {
    /// Emit the record as a `debug` event.
    pub fn emit(&self) {
        tracing::debug!(
            phase = self.phase.as_str(),
            sequence = self.sequence,
            pointer_id = self.pointer_id,
            target = ?self.target,
            x = self.position.map(|p| p.x),
            y = self.position.map(|p| p.y),
            outcome = ?self.outcome,
            "pointer dispatch"
        );
    }
}

/// Result of one lifecycle signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerDispatch {
    /// Event to hand to the overlay runtime, if any.
    pub event: Option<OverlayEvent>,
    pub log: PointerLogEntry,
}

impl PointerDispatch {
    fn ignored(
        phase: PointerPhase,
        reason: PointerIgnoredReason,
        pointer_id: Option<u32>,
        target: Option<OverlayTarget>,
        position: Option<Point>,
    ) -> Self {
        Self {
            event: None,
            log: PointerLogEntry {
                phase,
                sequence: None,
                pointer_id,
                target,
                position,
                outcome: PointerLogOutcome::Ignored(reason),
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct DispatchContext {
    phase: PointerPhase,
    pointer_id: u32,
    target: OverlayTarget,
    position: Option<Point>,
}

const fn slot(target: OverlayTarget) -> usize {
    match target {
        OverlayTarget::Button => 0,
        OverlayTarget::PanelHeader => 1,
        OverlayTarget::PanelResizeHandle => 2,
    }
}

/// Folds browser pointer signals into overlay events.
///
/// Each grab area has its own slot, so gestures on different elements run
/// independently; a second pointer on a busy element is ignored.
#[derive(Debug, Clone)]
pub struct PointerCaptureAdapter {
    config: PointerCaptureConfig,
    active: [Option<ActivePointer>; 3],
    next_sequence: u64,
}

impl Default for PointerCaptureAdapter {
    fn default() -> Self {
        Self::new(PointerCaptureConfig::default())
    }
}

impl PointerCaptureAdapter {
    #[must_use]
    pub fn new(config: PointerCaptureConfig) -> Self {
        Self {
            config,
            active: [None; 3],
            next_sequence: 1,
        }
    }

    #[must_use]
    pub const fn config(&self) -> PointerCaptureConfig {
        self.config
    }

    /// Pointer driving the gesture on `target`, if any.
    #[must_use]
    pub fn active_pointer_id(&self, target: OverlayTarget) -> Option<u32> {
        self.active[slot(target)].map(|active| active.pointer_id)
    }

    /// Grab area `pointer_id` is driving, if any.
    #[must_use]
    pub fn active_target(&self, pointer_id: u32) -> Option<OverlayTarget> {
        self.find(pointer_id).map(|active| active.target)
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.active.iter().all(Option::is_none)
    }

    fn find(&self, pointer_id: u32) -> Option<ActivePointer> {
        self.active
            .iter()
            .flatten()
            .find(|active| active.pointer_id == pointer_id)
            .copied()
    }

    /// `pointerdown` on one of the overlay's grab areas.
    pub fn pointer_down(
        &mut self,
        target: OverlayTarget,
        pointer_id: u32,
        button: PointerButton,
        position: Point,
    ) -> PointerDispatch {
        let phase = PointerPhase::PointerDown;
        if button != self.config.activation_button {
            return PointerDispatch::ignored(
                phase,
                PointerIgnoredReason::ButtonNotAllowed,
                Some(pointer_id),
                Some(target),
                Some(position),
            );
        }
        if self.active[slot(target)].is_some() || self.find(pointer_id).is_some() {
            return PointerDispatch::ignored(
                phase,
                PointerIgnoredReason::ActivePointerAlreadyInProgress,
                Some(pointer_id),
                Some(target),
                Some(position),
            );
        }
        self.active[slot(target)] = Some(ActivePointer {
            pointer_id,
            target,
            button,
            capture_state: CaptureState::Requested,
        });
        self.forward(
            DispatchContext {
                phase,
                pointer_id,
                target,
                position: Some(position),
            },
            OverlayEvent::PointerDown {
                target,
                pointer_id,
                position,
            },
        )
    }

    /// `gotpointercapture` for an active pointer.
    pub fn capture_acquired(&mut self, pointer_id: u32) -> PointerDispatch {
        let phase = PointerPhase::CaptureAcquired;
        let mut active = match self.expect_active(phase, pointer_id, None) {
            Ok(active) => active,
            Err(ignored) => return ignored,
        };
        active.capture_state = CaptureState::Acquired;
        self.active[slot(active.target)] = Some(active);
        PointerDispatch {
            event: None,
            log: PointerLogEntry {
                phase,
                sequence: None,
                pointer_id: Some(pointer_id),
                target: Some(active.target),
                position: None,
                outcome: PointerLogOutcome::CaptureStateUpdated,
            },
        }
    }

    pub fn pointer_move(&mut self, pointer_id: u32, position: Point) -> PointerDispatch {
        let phase = PointerPhase::PointerMove;
        let active = match self.expect_active(phase, pointer_id, Some(position)) {
            Ok(active) => active,
            Err(ignored) => return ignored,
        };
        self.forward(
            DispatchContext {
                phase,
                pointer_id,
                target: active.target,
                position: Some(position),
            },
            OverlayEvent::PointerMove { pointer_id, position },
        )
    }

    pub fn pointer_up(
        &mut self,
        pointer_id: u32,
        button: PointerButton,
        position: Point,
    ) -> PointerDispatch {
        let phase = PointerPhase::PointerUp;
        let active = match self.expect_active(phase, pointer_id, Some(position)) {
            Ok(active) => active,
            Err(ignored) => return ignored,
        };
        if active.button != button {
            return PointerDispatch::ignored(
                phase,
                PointerIgnoredReason::ButtonMismatch,
                Some(pointer_id),
                Some(active.target),
                Some(position),
            );
        }
        self.active[slot(active.target)] = None;
        self.forward(
            DispatchContext {
                phase,
                pointer_id,
                target: active.target,
                position: Some(position),
            },
            OverlayEvent::PointerUp { pointer_id, position },
        )
    }

    /// `pointercancel`. `None` cancels every active gesture.
    pub fn pointer_cancel(&mut self, pointer_id: Option<u32>) -> Vec<PointerDispatch> {
        match pointer_id {
            Some(pointer_id) => vec![self.cancel_pointer(PointerPhase::PointerCancel, pointer_id)],
            None => self.cancel_all(PointerPhase::PointerCancel),
        }
    }

    /// `pointerleave`: cancels only if capture was never acknowledged.
    pub fn pointer_leave(&mut self, pointer_id: u32) -> PointerDispatch {
        let phase = PointerPhase::PointerLeave;
        let active = match self.expect_active(phase, pointer_id, None) {
            Ok(active) => active,
            Err(ignored) => return ignored,
        };
        if active.capture_state == CaptureState::Requested
            && self.config.cancel_on_leave_without_capture
        {
            self.cancel_pointer(phase, pointer_id)
        } else {
            PointerDispatch::ignored(
                phase,
                PointerIgnoredReason::LeaveWhileCaptured,
                Some(pointer_id),
                Some(active.target),
                None,
            )
        }
    }

    /// Window blur cancels every active gesture.
    pub fn blur(&mut self) -> Vec<PointerDispatch> {
        self.cancel_all(PointerPhase::Blur)
    }

    /// A hidden tab cancels every active gesture.
    pub fn visibility_hidden(&mut self) -> Vec<PointerDispatch> {
        self.cancel_all(PointerPhase::VisibilityHidden)
    }

    pub fn lost_pointer_capture(&mut self, pointer_id: u32) -> PointerDispatch {
        self.cancel_pointer(PointerPhase::LostPointerCapture, pointer_id)
    }

    fn expect_active(
        &self,
        phase: PointerPhase,
        pointer_id: u32,
        position: Option<Point>,
    ) -> Result<ActivePointer, PointerDispatch> {
        if let Some(active) = self.find(pointer_id) {
            return Ok(active);
        }
        let reason = if self.is_idle() {
            PointerIgnoredReason::NoActivePointer
        } else {
            PointerIgnoredReason::PointerMismatch
        };
        Err(PointerDispatch::ignored(phase, reason, Some(pointer_id), None, position))
    }

    fn cancel_pointer(&mut self, phase: PointerPhase, pointer_id: u32) -> PointerDispatch {
        match self.expect_active(phase, pointer_id, None) {
            Ok(active) => self.cancel(phase, active),
            Err(ignored) => ignored,
        }
    }

    /// Cancel every active slot. With nothing active the result is a single
    /// ignored dispatch, so the signal still shows up in the log.
    fn cancel_all(&mut self, phase: PointerPhase) -> Vec<PointerDispatch> {
        let active: Vec<ActivePointer> = self.active.iter().flatten().copied().collect();
        if active.is_empty() {
            return vec![PointerDispatch::ignored(
                phase,
                PointerIgnoredReason::NoActivePointer,
                None,
                None,
                None,
            )];
        }
        active.into_iter().map(|active| self.cancel(phase, active)).collect()
    }

    fn cancel(&mut self, phase: PointerPhase, active: ActivePointer) -> PointerDispatch {
        self.active[slot(active.target)] = None;
        self.forward(
            DispatchContext {
                phase,
                pointer_id: active.pointer_id,
                target: active.target,
                position: None,
            },
            OverlayEvent::PointerCancel {
                pointer_id: Some(active.pointer_id),
            },
        )
    }

    fn forward(&mut self, context: DispatchContext, event: OverlayEvent) -> PointerDispatch {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.saturating_add(1);
        PointerDispatch {
            event: Some(event),
            log: PointerLogEntry {
                phase: context.phase,
                sequence: Some(sequence),
                pointer_id: Some(context.pointer_id),
                target: Some(context.target),
                position: context.position,
                outcome: PointerLogOutcome::Forwarded,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pos(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    fn adapter() -> PointerCaptureAdapter {
        PointerCaptureAdapter::new(PointerCaptureConfig::default())
    }

    #[test]
    fn pointer_down_forwards_and_tracks_pointer() {
        let mut adapter = adapter();
        let dispatch =
            adapter.pointer_down(OverlayTarget::Button, 11, PointerButton::Primary, pos(5.0, 8.0));
        assert_eq!(
            dispatch.event,
            Some(OverlayEvent::PointerDown {
                target: OverlayTarget::Button,
                pointer_id: 11,
                position: pos(5.0, 8.0),
            })
        );
        assert_eq!(dispatch.log.sequence, Some(1));
        assert_eq!(adapter.active_pointer_id(OverlayTarget::Button), Some(11));
        assert_eq!(adapter.active_target(11), Some(OverlayTarget::Button));
    }

    #[test]
    fn secondary_button_is_ignored() {
        let mut adapter = adapter();
        let dispatch = adapter.pointer_down(
            OverlayTarget::PanelHeader,
            3,
            PointerButton::from_dom(2),
            pos(1.0, 1.0),
        );
        assert_eq!(dispatch.event, None);
        assert_eq!(
            dispatch.log.outcome,
            PointerLogOutcome::Ignored(PointerIgnoredReason::ButtonNotAllowed)
        );
        assert!(adapter.is_idle());
    }

    #[test]
    fn gestures_on_different_elements_are_independent() {
        let mut adapter = adapter();
        let primary = PointerButton::Primary;
        adapter.pointer_down(OverlayTarget::PanelHeader, 1, primary, pos(0.0, 0.0));
        let resize =
            adapter.pointer_down(OverlayTarget::PanelResizeHandle, 2, primary, pos(9.0, 9.0));
        assert_eq!(resize.log.outcome, PointerLogOutcome::Forwarded);
        assert_eq!(adapter.active_pointer_id(OverlayTarget::PanelHeader), Some(1));
        assert_eq!(adapter.active_pointer_id(OverlayTarget::PanelResizeHandle), Some(2));

        let moved = adapter.pointer_move(2, pos(20.0, 20.0));
        assert_eq!(moved.log.target, Some(OverlayTarget::PanelResizeHandle));
        adapter.pointer_up(1, primary, pos(5.0, 0.0));
        assert_eq!(adapter.active_pointer_id(OverlayTarget::PanelHeader), None);
        assert_eq!(adapter.active_pointer_id(OverlayTarget::PanelResizeHandle), Some(2));
    }

    #[test]
    fn second_pointer_on_busy_element_is_rejected() {
        let mut adapter = adapter();
        adapter.pointer_down(OverlayTarget::PanelHeader, 1, PointerButton::Primary, pos(0.0, 0.0));
        let dispatch = adapter.pointer_down(
            OverlayTarget::PanelHeader,
            2,
            PointerButton::Primary,
            pos(0.0, 0.0),
        );
        assert_eq!(
            dispatch.log.outcome,
            PointerLogOutcome::Ignored(PointerIgnoredReason::ActivePointerAlreadyInProgress)
        );
        assert_eq!(adapter.active_pointer_id(OverlayTarget::PanelHeader), Some(1));
        assert_eq!(adapter.active_target(2), None);
    }

    #[test]
    fn foreign_move_is_ignored() {
        let mut adapter = adapter();
        adapter.pointer_down(OverlayTarget::Button, 9, PointerButton::Primary, pos(10.0, 10.0));
        let dispatch = adapter.pointer_move(77, pos(14.0, 14.0));
        assert_eq!(dispatch.event, None);
        assert_eq!(
            dispatch.log.outcome,
            PointerLogOutcome::Ignored(PointerIgnoredReason::PointerMismatch)
        );
        assert_eq!(adapter.active_pointer_id(OverlayTarget::Button), Some(9));
    }

    #[test]
    fn pointer_up_ends_gesture() {
        let mut adapter = adapter();
        adapter.pointer_down(OverlayTarget::Button, 9, PointerButton::Primary, pos(1.0, 1.0));
        adapter.capture_acquired(9);
        let dispatch = adapter.pointer_up(9, PointerButton::Primary, pos(6.0, 1.0));
        assert_eq!(
            dispatch.event,
            Some(OverlayEvent::PointerUp {
                pointer_id: 9,
                position: pos(6.0, 1.0)
            })
        );
        assert!(adapter.is_idle());
    }

    #[test]
    fn pointer_up_with_wrong_button_is_ignored() {
        let mut adapter = adapter();
        adapter.pointer_down(OverlayTarget::Button, 4, PointerButton::Primary, pos(2.0, 2.0));
        let dispatch = adapter.pointer_up(4, PointerButton::Secondary, pos(3.0, 2.0));
        assert_eq!(
            dispatch.log.outcome,
            PointerLogOutcome::Ignored(PointerIgnoredReason::ButtonMismatch)
        );
        assert_eq!(adapter.active_pointer_id(OverlayTarget::Button), Some(4));
    }

    #[test]
    fn blur_cancels_every_active_gesture() {
        let mut adapter = adapter();
        adapter.pointer_down(OverlayTarget::PanelHeader, 6, PointerButton::Primary, pos(0.0, 0.0));
        adapter.pointer_down(
            OverlayTarget::PanelResizeHandle,
            7,
            PointerButton::Primary,
            pos(9.0, 9.0),
        );
        let dispatches = adapter.blur();
        assert!(dispatches.iter().all(|d| d.log.phase == PointerPhase::Blur));
        assert_eq!(
            dispatches.iter().map(|d| d.event).collect::<Vec<_>>(),
            vec![
                Some(OverlayEvent::PointerCancel { pointer_id: Some(6) }),
                Some(OverlayEvent::PointerCancel { pointer_id: Some(7) }),
            ]
        );
        assert!(adapter.is_idle());
        let idle = adapter.blur();
        assert_eq!(idle.len(), 1);
        assert_eq!(
            idle[0].log.outcome,
            PointerLogOutcome::Ignored(PointerIgnoredReason::NoActivePointer)
        );
    }

    #[test]
    fn hidden_tab_and_lost_capture_cancel() {
        let mut adapter = adapter();
        adapter.pointer_down(OverlayTarget::Button, 8, PointerButton::Primary, pos(5.0, 2.0));
        assert!(adapter.visibility_hidden()[0].event.is_some());

        adapter.pointer_down(OverlayTarget::Button, 42, PointerButton::Primary, pos(7.0, 7.0));
        assert_eq!(adapter.lost_pointer_capture(41).event, None);
        assert_eq!(
            adapter.lost_pointer_capture(42).event,
            Some(OverlayEvent::PointerCancel { pointer_id: Some(42) })
        );
    }

    #[test]
    fn leave_before_capture_ack_cancels() {
        let mut adapter = adapter();
        adapter.pointer_down(
            OverlayTarget::PanelResizeHandle,
            31,
            PointerButton::Primary,
            pos(1.0, 1.0),
        );
        let dispatch = adapter.pointer_leave(31);
        assert_eq!(dispatch.log.phase, PointerPhase::PointerLeave);
        assert_eq!(dispatch.event, Some(OverlayEvent::PointerCancel { pointer_id: Some(31) }));
        assert!(adapter.is_idle());
    }

    #[test]
    fn leave_after_capture_ack_is_ignored() {
        let mut adapter = adapter();
        adapter.pointer_down(OverlayTarget::PanelHeader, 55, PointerButton::Primary, pos(4.0, 4.0));
        let ack = adapter.capture_acquired(55);
        assert_eq!(ack.log.outcome, PointerLogOutcome::CaptureStateUpdated);
        let dispatch = adapter.pointer_leave(55);
        assert_eq!(dispatch.event, None);
        assert_eq!(
            dispatch.log.outcome,
            PointerLogOutcome::Ignored(PointerIgnoredReason::LeaveWhileCaptured)
        );
        assert_eq!(adapter.active_pointer_id(OverlayTarget::PanelHeader), Some(55));
    }

    #[test]
    fn default_adapter_numbers_from_one() {
        let mut adapter = PointerCaptureAdapter::default();
        let down =
            adapter.pointer_down(OverlayTarget::Button, 3, PointerButton::Primary, pos(0.0, 0.0));
        assert_eq!(down.log.sequence, Some(1));
        assert_eq!(adapter.config(), PointerCaptureConfig::default());
    }

    #[test]
    fn sequences_increase_only_on_forwarded_dispatches() {
        let mut adapter = adapter();
        adapter.pointer_move(1, pos(0.0, 0.0));
        let down =
            adapter.pointer_down(OverlayTarget::Button, 1, PointerButton::Primary, pos(0.0, 0.0));
        let moved = adapter.pointer_move(1, pos(3.0, 0.0));
        assert_eq!(down.log.sequence, Some(1));
        assert_eq!(moved.log.sequence, Some(2));
    }
}
