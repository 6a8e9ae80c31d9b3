#![forbid(unsafe_code)]

//! Drag and resize controllers.
//!
//! A controller binds one [`GestureMachine`] to one element handle and turns
//! gesture transitions into page mutations:
//!
//! - [`DragController`] moves the launcher or the panel. Each move places the
//!   element at `origin + delta`, clamped against the live viewport and the
//!   element's measured size. On release the launcher snaps to the nearer
//!   edge; the panel reports its final position for persistence.
//! - [`ResizeController`] grows or shrinks the panel from its corner handle,
//!   with a fixed floor and a ceiling recomputed on every move.
//!
//! Pointer capture is best-effort: if the page throws on capture or release
//! the failure is logged and the gesture continues without it.

use cigi_core::{
    DockSide, GestureEffect, GestureError, GestureInput, GestureMachine, Placement, Point, Rect,
    ResizeBounds, Size, SnapTransition, dock_side_for, drag_rect, resize_size, snap_placement,
};

use crate::config::OverlayConfig;
use crate::host::{Cursor, ElementHandle, OverlayHost};
use crate::position::WindowPosition;

/// Result of feeding one pointer event to a controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControllerOutcome {
    /// The event did not belong to this controller's gesture.
    Ignored,
    Began,
    Moved { rect: Rect, drag_started: bool },
    Resized { size: Size },
    /// Launcher released and docked.
    Snapped { side: DockSide, placement: Placement, was_dragged: bool },
    /// Panel released at `position`.
    Released { position: WindowPosition, was_dragged: bool },
    ResizeFinished { size: Size },
    /// Gesture abandoned. A launcher still re-docks.
    Canceled { snapped: Option<DockSide> },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SnapSettings {
    inset: f64,
    vertical_margin: f64,
    transition: SnapTransition,
}

fn capture(host: &mut dyn OverlayHost, handle: ElementHandle, pointer_id: u32) {
    if let Err(error) = host.capture_pointer(handle, pointer_id) {
        tracing::warn!(
            element = handle.kind().as_str(),
            pointer_id,
            %error,
            "pointer capture failed; continuing without it"
        );
    }
}

fn release(host: &mut dyn OverlayHost, handle: ElementHandle, pointer_id: u32) {
    if let Err(error) = host.release_pointer(handle, pointer_id) {
        tracing::warn!(
            element = handle.kind().as_str(),
            pointer_id,
            %error,
            "pointer release failed"
        );
    }
}

/// Drag handling for one element.
#[derive(Debug, Clone)]
pub struct DragController {
    handle: ElementHandle,
    machine: GestureMachine,
    margin: f64,
    fallback_size: Size,
    snap: Option<SnapSettings>,
}

impl DragController {
    /// Controller for the launcher: clamps with the launcher margin and snaps
    /// on release.
    pub fn for_button(handle: ElementHandle, config: &OverlayConfig) -> Result<Self, GestureError> {
        Ok(Self {
            handle,
            machine: GestureMachine::new(config.drag.threshold)?,
            margin: config.button.drag_margin,
            fallback_size: config.button.size,
            snap: Some(SnapSettings {
                inset: config.button.snap_inset,
                vertical_margin: config.button.drag_margin,
                transition: config.button.snap_transition(),
            }),
        })
    }

    /// Controller for the panel header: clamps with the panel margin and
    /// reports the final position on release.
    pub fn for_panel(handle: ElementHandle, config: &OverlayConfig) -> Result<Self, GestureError> {
        Ok(Self {
            handle,
            machine: GestureMachine::new(config.drag.threshold)?,
            margin: config.panel.margin,
            fallback_size: Size::new(config.panel.default_width, config.panel.min_size.height),
            snap: None,
        })
    }

    #[must_use]
    pub const fn handle(&self) -> ElementHandle {
        self.handle
    }

    #[must_use]
    pub const fn machine(&self) -> &GestureMachine {
        &self.machine
    }

    /// Whether `pointer_id` drives the active gesture.
    #[must_use]
    pub fn owns_pointer(&self, pointer_id: u32) -> bool {
        self.machine.active_pointer() == Some(pointer_id)
    }

    fn measured(&self, host: &dyn OverlayHost) -> Rect {
        let rect = host.measure(self.handle);
        rect.with_size(rect.size().or(self.fallback_size))
    }

    pub fn pointer_down(
        &mut self,
        host: &mut dyn OverlayHost,
        pointer_id: u32,
        position: Point,
    ) -> Result<ControllerOutcome, GestureError> {
        let origin = self.measured(host);
        let transition = self.machine.apply(GestureInput::PointerDown {
            pointer_id,
            position,
            origin,
        })?;
        let GestureEffect::Began { .. } = transition.effect else {
            return Ok(ControllerOutcome::Ignored);
        };
        capture(host, self.handle, pointer_id);
        host.set_transition(self.handle, None);
        host.place(self.handle, Placement::at(origin));
        host.set_cursor(self.handle, Cursor::Grabbing);
        tracing::debug!(
            element = self.handle.kind().as_str(),
            pointer_id,
            x = position.x,
            y = position.y,
            "drag began"
        );
        Ok(ControllerOutcome::Began)
    }

    pub fn pointer_move(
        &mut self,
        host: &mut dyn OverlayHost,
        pointer_id: u32,
        position: Point,
    ) -> Result<ControllerOutcome, GestureError> {
        let transition = self.machine.apply(GestureInput::PointerMove { pointer_id, position })?;
        let GestureEffect::Moved { dx, dy, drag_started, .. } = transition.effect else {
            return Ok(ControllerOutcome::Ignored);
        };
        let Some(session) = self.machine.session() else {
            return Ok(ControllerOutcome::Ignored);
        };
        let measured = host.measure(self.handle).size().or(self.fallback_size);
        let rect = drag_rect(session.origin, dx, dy, measured, host.viewport(), self.margin);
        host.place(self.handle, Placement::at(rect));
        if drag_started {
            tracing::debug!(
                element = self.handle.kind().as_str(),
                pointer_id,
                dx,
                dy,
                "drag threshold crossed"
            );
        }
        Ok(ControllerOutcome::Moved { rect, drag_started })
    }

    pub fn pointer_up(
        &mut self,
        host: &mut dyn OverlayHost,
        pointer_id: u32,
        position: Point,
    ) -> Result<ControllerOutcome, GestureError> {
        let transition = self.machine.apply(GestureInput::PointerUp { pointer_id, position })?;
        let GestureEffect::Released { was_dragged, dx, dy, .. } = transition.effect else {
            return Ok(ControllerOutcome::Ignored);
        };
        release(host, self.handle, pointer_id);
        host.set_cursor(self.handle, Cursor::Grab);
        tracing::debug!(
            element = self.handle.kind().as_str(),
            pointer_id,
            dx,
            dy,
            was_dragged,
            "drag released"
        );
        match self.snap {
            Some(snap) => {
                let (side, placement) = self.snap_to_nearer_edge(host, snap);
                Ok(ControllerOutcome::Snapped {
                    side,
                    placement,
                    was_dragged,
                })
            }
            None => {
                let rect = host.measure(self.handle);
                Ok(ControllerOutcome::Released {
                    position: WindowPosition::new(rect.left, rect.top),
                    was_dragged,
                })
            }
        }
    }

    /// Abandon the active gesture (pointer cancel, lost capture, blur).
    pub fn cancel(
        &mut self,
        host: &mut dyn OverlayHost,
        pointer_id: Option<u32>,
    ) -> Result<ControllerOutcome, GestureError> {
        let transition = self.machine.apply(GestureInput::Cancel { pointer_id })?;
        let GestureEffect::Canceled { pointer_id } = transition.effect else {
            return Ok(ControllerOutcome::Ignored);
        };
        release(host, self.handle, pointer_id);
        host.set_cursor(self.handle, Cursor::Grab);
        let snapped = self
            .snap
            .map(|snap| self.snap_to_nearer_edge(host, snap).0);
        Ok(ControllerOutcome::Canceled { snapped })
    }

    /// Feed the `click` that follows a pointer-up. Returns `true` if the
    /// click should act, `false` if it is the one swallowed after a drag.
    pub fn click(&mut self) -> bool {
        match self.machine.apply(GestureInput::Click) {
            Ok(transition) => matches!(transition.effect, GestureEffect::ClickPassed),
            Err(_) => false,
        }
    }

    /// Drop any in-flight gesture before the element goes away.
    pub fn detach(&mut self, host: &mut dyn OverlayHost) {
        if let Some(pointer_id) = self.machine.active_pointer() {
            release(host, self.handle, pointer_id);
        }
        self.machine.reset();
    }

    fn snap_to_nearer_edge(
        &self,
        host: &mut dyn OverlayHost,
        snap: SnapSettings,
    ) -> (DockSide, Placement) {
        let viewport = host.viewport();
        let rect = self.measured(host);
        let side = dock_side_for(rect, viewport.width);
        let placement = snap_placement(side, rect, viewport, snap.inset, snap.vertical_margin);
        host.set_transition(self.handle, Some(snap.transition));
        host.place(self.handle, placement);
        host.set_dock_side(self.handle, side);
        tracing::debug!(
            element = self.handle.kind().as_str(),
            side = side.as_str(),
            "snapped to edge"
        );
        (side, placement)
    }
}

/// Corner-handle resize for the panel.
#[derive(Debug, Clone)]
pub struct ResizeController {
    handle: ElementHandle,
    machine: GestureMachine,
    bounds: ResizeBounds,
}

impl ResizeController {
    pub fn new(handle: ElementHandle, config: &OverlayConfig) -> Result<Self, GestureError> {
        Ok(Self {
            handle,
            machine: GestureMachine::new(config.drag.threshold)?,
            bounds: config.panel.resize_bounds(),
        })
    }

    #[must_use]
    pub const fn handle(&self) -> ElementHandle {
        self.handle
    }

    #[must_use]
    pub const fn machine(&self) -> &GestureMachine {
        &self.machine
    }

    #[must_use]
    pub fn owns_pointer(&self, pointer_id: u32) -> bool {
        self.machine.active_pointer() == Some(pointer_id)
    }

    pub fn pointer_down(
        &mut self,
        host: &mut dyn OverlayHost,
        pointer_id: u32,
        position: Point,
    ) -> Result<ControllerOutcome, GestureError> {
        let origin = host.measure(self.handle);
        let transition = self.machine.apply(GestureInput::PointerDown {
            pointer_id,
            position,
            origin,
        })?;
        let GestureEffect::Began { .. } = transition.effect else {
            return Ok(ControllerOutcome::Ignored);
        };
        capture(host, self.handle, pointer_id);
        // Pin the top-left corner so growth extends right and down.
        host.place(self.handle, Placement::at(origin));
        host.set_cursor(self.handle, Cursor::ResizeDiagonal);
        tracing::debug!(pointer_id, width = origin.width, height = origin.height, "resize began");
        Ok(ControllerOutcome::Began)
    }

    pub fn pointer_move(
        &mut self,
        host: &mut dyn OverlayHost,
        pointer_id: u32,
        position: Point,
    ) -> Result<ControllerOutcome, GestureError> {
        let transition = self.machine.apply(GestureInput::PointerMove { pointer_id, position })?;
        let GestureEffect::Moved { dx, dy, .. } = transition.effect else {
            return Ok(ControllerOutcome::Ignored);
        };
        let Some(session) = self.machine.session() else {
            return Ok(ControllerOutcome::Ignored);
        };
        let current = host.measure(self.handle);
        let size = resize_size(
            session.origin.size(),
            dx,
            dy,
            current.origin(),
            host.viewport(),
            self.bounds,
        );
        host.set_size(self.handle, size);
        Ok(ControllerOutcome::Resized { size })
    }

    pub fn pointer_up(
        &mut self,
        host: &mut dyn OverlayHost,
        pointer_id: u32,
        position: Point,
    ) -> Result<ControllerOutcome, GestureError> {
        let transition = self.machine.apply(GestureInput::PointerUp { pointer_id, position })?;
        let GestureEffect::Released { .. } = transition.effect else {
            return Ok(ControllerOutcome::Ignored);
        };
        release(host, self.handle, pointer_id);
        host.set_cursor(self.handle, Cursor::Move);
        // No click follows a resize that matters to us.
        self.machine.reset();
        let size = host.measure(self.handle).size();
        tracing::debug!(pointer_id, width = size.width, height = size.height, "resize finished");
        Ok(ControllerOutcome::ResizeFinished { size })
    }

    pub fn cancel(
        &mut self,
        host: &mut dyn OverlayHost,
        pointer_id: Option<u32>,
    ) -> Result<ControllerOutcome, GestureError> {
        let transition = self.machine.apply(GestureInput::Cancel { pointer_id })?;
        let GestureEffect::Canceled { pointer_id } = transition.effect else {
            return Ok(ControllerOutcome::Ignored);
        };
        release(host, self.handle, pointer_id);
        host.set_cursor(self.handle, Cursor::Move);
        Ok(ControllerOutcome::Canceled { snapped: None })
    }

    pub fn detach(&mut self, host: &mut dyn OverlayHost) {
        if let Some(pointer_id) = self.machine.active_pointer() {
            release(host, self.handle, pointer_id);
        }
        self.machine.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ElementContent, ElementKind, PanelContent};
    use crate::simulator::{HeadlessHost, HostCall};

    fn host_with(kind: ElementKind, rect: Rect) -> (HeadlessHost, ElementHandle) {
        let mut host = HeadlessHost::new(Size::new(1000.0, 800.0));
        let content = match kind {
            ElementKind::FloatingButton => ElementContent::FloatingButton {
                title: String::new(),
                icon: String::new(),
            },
            ElementKind::Panel => ElementContent::Panel(PanelContent {
                title: String::new(),
                minimize_label: String::new(),
                tabs: Vec::new(),
            }),
        };
        let handle = host.mount(&content).expect("mount");
        host.set_size(handle, rect.size());
        host.place(handle, Placement::at(rect));
        host.set_visible(handle, true);
        host.clear_calls();
        (host, handle)
    }

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    #[test]
    fn button_drag_moves_then_snaps_left() {
        let (mut host, handle) =
            host_with(ElementKind::FloatingButton, Rect::new(952.0, 380.0, 40.0, 40.0));
        let mut drag =
            DragController::for_button(handle, &OverlayConfig::default()).expect("valid");
        drag.pointer_down(&mut host, 1, p(970.0, 400.0)).expect("finite");
        assert_eq!(
            host.node(ElementKind::FloatingButton).map(|n| n.captured_pointer),
            Some(Some(1))
        );
        let moved = drag.pointer_move(&mut host, 1, p(170.0, 420.0)).expect("finite");
        assert_eq!(
            moved,
            ControllerOutcome::Moved {
                rect: Rect::new(152.0, 400.0, 40.0, 40.0),
                drag_started: true
            }
        );
        let released = drag.pointer_up(&mut host, 1, p(170.0, 420.0)).expect("finite");
        assert_eq!(
            released,
            ControllerOutcome::Snapped {
                side: DockSide::Left,
                placement: Placement::explicit(8.0, 400.0),
                was_dragged: true
            }
        );
        assert_eq!(host.dock_side(ElementKind::FloatingButton), Some(DockSide::Left));
        assert!(!drag.click(), "click after drag is swallowed");
        assert!(drag.click(), "next click acts");
    }

    #[test]
    fn drag_clamps_inside_viewport() {
        let (mut host, handle) =
            host_with(ElementKind::FloatingButton, Rect::new(500.0, 400.0, 40.0, 40.0));
        let mut drag =
            DragController::for_button(handle, &OverlayConfig::default()).expect("valid");
        drag.pointer_down(&mut host, 1, p(520.0, 420.0)).expect("finite");
        let moved = drag.pointer_move(&mut host, 1, p(5000.0, -5000.0)).expect("finite");
        assert_eq!(
            moved,
            ControllerOutcome::Moved {
                rect: Rect::new(956.0, 4.0, 40.0, 40.0),
                drag_started: true
            }
        );
    }

    #[test]
    fn tap_is_not_a_drag() {
        let (mut host, handle) =
            host_with(ElementKind::FloatingButton, Rect::new(952.0, 380.0, 40.0, 40.0));
        let mut drag =
            DragController::for_button(handle, &OverlayConfig::default()).expect("valid");
        drag.pointer_down(&mut host, 1, p(970.0, 400.0)).expect("finite");
        drag.pointer_move(&mut host, 1, p(972.0, 397.0)).expect("finite");
        let released = drag.pointer_up(&mut host, 1, p(972.0, 397.0)).expect("finite");
        assert!(matches!(released, ControllerOutcome::Snapped { was_dragged: false, .. }));
        assert!(drag.click());
    }

    #[test]
    fn drag_start_clears_anchoring_and_transition() {
        let (mut host, handle) =
            host_with(ElementKind::FloatingButton, Rect::new(952.0, 380.0, 40.0, 40.0));
        host.place(handle, Placement::from_right(8.0, 380.0));
        host.clear_calls();
        let mut drag =
            DragController::for_button(handle, &OverlayConfig::default()).expect("valid");
        drag.pointer_down(&mut host, 1, p(970.0, 400.0)).expect("finite");
        let kind = ElementKind::FloatingButton;
        assert_eq!(
            host.calls(),
            &[
                HostCall::CapturePointer { kind, pointer_id: 1 },
                HostCall::SetTransition { kind, transition: None },
                HostCall::Place {
                    kind,
                    placement: Placement::explicit(952.0, 380.0)
                },
                HostCall::SetCursor {
                    kind,
                    cursor: Cursor::Grabbing
                },
            ]
        );
    }

    #[test]
    fn capture_failure_is_not_fatal() {
        let (mut host, handle) =
            host_with(ElementKind::Panel, Rect::new(100.0, 100.0, 720.0, 400.0));
        host.fail_pointer_capture(true);
        let mut drag = DragController::for_panel(handle, &OverlayConfig::default()).expect("valid");
        assert_eq!(
            drag.pointer_down(&mut host, 2, p(150.0, 110.0)).expect("finite"),
            ControllerOutcome::Began
        );
        drag.pointer_move(&mut host, 2, p(200.0, 160.0)).expect("finite");
        let released = drag.pointer_up(&mut host, 2, p(200.0, 160.0)).expect("finite");
        assert_eq!(
            released,
            ControllerOutcome::Released {
                position: WindowPosition::new(150.0, 150.0),
                was_dragged: true
            }
        );
    }

    #[test]
    fn foreign_pointer_does_not_move_element() {
        let (mut host, handle) =
            host_with(ElementKind::Panel, Rect::new(100.0, 100.0, 720.0, 400.0));
        let mut drag = DragController::for_panel(handle, &OverlayConfig::default()).expect("valid");
        drag.pointer_down(&mut host, 1, p(150.0, 110.0)).expect("finite");
        host.clear_calls();
        assert_eq!(
            drag.pointer_move(&mut host, 2, p(400.0, 400.0)).expect("finite"),
            ControllerOutcome::Ignored
        );
        assert!(host.calls().is_empty());
    }

    #[test]
    fn canceled_button_drag_still_docks() {
        let (mut host, handle) =
            host_with(ElementKind::FloatingButton, Rect::new(952.0, 380.0, 40.0, 40.0));
        let mut drag =
            DragController::for_button(handle, &OverlayConfig::default()).expect("valid");
        drag.pointer_down(&mut host, 1, p(970.0, 400.0)).expect("finite");
        drag.pointer_move(&mut host, 1, p(100.0, 400.0)).expect("finite");
        let canceled = drag.cancel(&mut host, None).expect("valid");
        assert_eq!(canceled, ControllerOutcome::Canceled { snapped: Some(DockSide::Left) });
        assert!(!drag.machine().is_active());
    }

    #[test]
    fn resize_respects_floor_and_viewport() {
        let (mut host, handle) =
            host_with(ElementKind::Panel, Rect::new(200.0, 100.0, 720.0, 400.0));
        let mut resize = ResizeController::new(handle, &OverlayConfig::default()).expect("valid");
        resize.pointer_down(&mut host, 5, p(920.0, 500.0)).expect("finite");
        let grown = resize.pointer_move(&mut host, 5, p(2000.0, 2000.0)).expect("finite");
        assert_eq!(grown, ControllerOutcome::Resized { size: Size::new(792.0, 692.0) });
        let shrunk = resize.pointer_move(&mut host, 5, p(0.0, 0.0)).expect("finite");
        assert_eq!(shrunk, ControllerOutcome::Resized { size: Size::new(360.0, 200.0) });
        let done = resize.pointer_up(&mut host, 5, p(0.0, 0.0)).expect("finite");
        assert_eq!(done, ControllerOutcome::ResizeFinished { size: Size::new(360.0, 200.0) });
        assert!(!resize.owns_pointer(5));
    }

    #[test]
    fn detach_releases_active_pointer() {
        let (mut host, handle) =
            host_with(ElementKind::Panel, Rect::new(100.0, 100.0, 720.0, 400.0));
        let mut drag = DragController::for_panel(handle, &OverlayConfig::default()).expect("valid");
        drag.pointer_down(&mut host, 3, p(150.0, 110.0)).expect("finite");
        drag.detach(&mut host);
        assert!(host.calls().contains(&HostCall::ReleasePointer {
            kind: ElementKind::Panel,
            pointer_id: 3
        }));
        assert!(!drag.owns_pointer(3));
    }
}
