#![forbid(unsafe_code)]

//! Headless host and helpers for exercising the overlay without a browser.
//!
//! [`HeadlessHost`] keeps a tiny model of the page (one record per mounted
//! element) and logs every mutation as a [`HostCall`], so tests can assert
//! both the resulting layout and the exact sequence of page writes.
//! Pair it with [`crate::store::ChangeQueue`] to decide when each
//! simulated context processes store notifications.

use std::collections::BTreeMap;

use cigi_core::{DockSide, Placement, Rect, Size, SnapTransition};

use crate::host::{
    Cursor, ElementContent, ElementHandle, ElementKind, HostError, OverlayHost, PanelContent,
};
use crate::theme::{ThemeName, ThemeSink};

/// One recorded page mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    Mount { kind: ElementKind, node: u64 },
    Unmount { kind: ElementKind, node: u64 },
    SetVisible { kind: ElementKind, visible: bool },
    Place { kind: ElementKind, placement: Placement },
    SetSize { kind: ElementKind, size: Size },
    SetTransition { kind: ElementKind, transition: Option<SnapTransition> },
    SetCursor { kind: ElementKind, cursor: Cursor },
    SetDockSide { kind: ElementKind, side: DockSide },
    CapturePointer { kind: ElementKind, pointer_id: u32 },
    ReleasePointer { kind: ElementKind, pointer_id: u32 },
}

/// Model of one element in the simulated page.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessNode {
    pub kind: ElementKind,
    pub visible: bool,
    pub placement: Placement,
    pub size: Size,
    pub transition: Option<SnapTransition>,
    pub cursor: Option<Cursor>,
    pub dock_side: Option<DockSide>,
    pub content: Option<ElementContent>,
    pub captured_pointer: Option<u32>,
}

impl HeadlessNode {
    fn blank(kind: ElementKind) -> Self {
        Self {
            kind,
            visible: false,
            placement: Placement::explicit(0.0, 0.0),
            size: Size::default(),
            transition: None,
            cursor: None,
            dock_side: None,
            content: None,
            captured_pointer: None,
        }
    }
}

/// In-memory [`OverlayHost`].
#[derive(Debug, Clone)]
pub struct HeadlessHost {
    viewport: Size,
    nodes: BTreeMap<u64, HeadlessNode>,
    next_node: u64,
    calls: Vec<HostCall>,
    fail_capture: bool,
    fail_mount: bool,
    theme: Option<ThemeName>,
}

impl HeadlessHost {
    #[must_use]
    pub fn new(viewport: Size) -> Self {
        Self {
            viewport,
            nodes: BTreeMap::new(),
            next_node: 1,
            calls: Vec::new(),
            fail_capture: false,
            fail_mount: false,
            theme: None,
        }
    }

    /// Resize the simulated viewport. Does not notify anyone.
    pub fn set_viewport(&mut self, viewport: Size) {
        self.viewport = viewport;
    }

    /// Make pointer capture and release throw, as some pages do.
    pub fn fail_pointer_capture(&mut self, fail: bool) {
        self.fail_capture = fail;
    }

    /// Make every mount fail.
    pub fn fail_mount(&mut self, fail: bool) {
        self.fail_mount = fail;
    }

    /// Insert a node carrying `kind`'s stable id, as if left behind by an
    /// earlier instance. Not recorded as a call.
    pub fn preexisting(&mut self, kind: ElementKind) -> ElementHandle {
        let node = self.next_node;
        self.next_node += 1;
        self.nodes.insert(node, HeadlessNode::blank(kind));
        ElementHandle::new(kind, node)
    }

    #[must_use]
    pub fn calls(&self) -> &[HostCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<HostCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Number of nodes of `kind` in the page.
    #[must_use]
    pub fn count(&self, kind: ElementKind) -> usize {
        self.nodes.values().filter(|n| n.kind == kind).count()
    }

    #[must_use]
    pub fn node(&self, kind: ElementKind) -> Option<&HeadlessNode> {
        self.nodes.values().find(|n| n.kind == kind)
    }

    /// Resolved on-screen rectangle of the first node of `kind`.
    #[must_use]
    pub fn rect(&self, kind: ElementKind) -> Option<Rect> {
        self.node(kind).map(|node| self.resolve(node))
    }

    #[must_use]
    pub fn is_visible(&self, kind: ElementKind) -> bool {
        self.node(kind).is_some_and(|n| n.visible)
    }

    #[must_use]
    pub fn dock_side(&self, kind: ElementKind) -> Option<DockSide> {
        self.node(kind).and_then(|n| n.dock_side)
    }

    #[must_use]
    pub fn panel_content(&self) -> Option<&PanelContent> {
        match self.node(ElementKind::Panel)?.content.as_ref()? {
            ElementContent::Panel(content) => Some(content),
            ElementContent::FloatingButton { .. } => None,
        }
    }

    /// Theme most recently applied through [`ThemeSink`].
    #[must_use]
    pub fn theme(&self) -> Option<ThemeName> {
        self.theme
    }

    fn resolve(&self, node: &HeadlessNode) -> Rect {
        Rect::new(
            node.placement.resolved_left(node.size.width, self.viewport.width),
            node.placement.top,
            node.size.width,
            node.size.height,
        )
    }

    fn with_node(
        &mut self,
        handle: ElementHandle,
        call: HostCall,
        f: impl FnOnce(&mut HeadlessNode),
    ) {
        if let Some(node) = self.nodes.get_mut(&handle.node()) {
            f(node);
            self.calls.push(call);
        }
    }
}

impl OverlayHost for HeadlessHost {
    fn viewport(&self) -> Size {
        self.viewport
    }

    fn find(&mut self, kind: ElementKind) -> Option<ElementHandle> {
        self.nodes
            .iter()
            .find(|(_, n)| n.kind == kind)
            .map(|(node, _)| ElementHandle::new(kind, *node))
    }

    fn mount(&mut self, content: &ElementContent) -> Result<ElementHandle, HostError> {
        let kind = content.kind();
        if self.fail_mount {
            return Err(HostError::Mount {
                kind,
                reason: "simulated failure".into(),
            });
        }
        let node = self.next_node;
        self.next_node += 1;
        let mut record = HeadlessNode::blank(kind);
        record.content = Some(content.clone());
        self.nodes.insert(node, record);
        self.calls.push(HostCall::Mount { kind, node });
        Ok(ElementHandle::new(kind, node))
    }

    fn unmount(&mut self, handle: ElementHandle) {
        if self.nodes.remove(&handle.node()).is_some() {
            self.calls.push(HostCall::Unmount {
                kind: handle.kind(),
                node: handle.node(),
            });
        }
    }

    fn set_visible(&mut self, handle: ElementHandle, visible: bool) {
        let kind = handle.kind();
        self.with_node(handle, HostCall::SetVisible { kind, visible }, |n| n.visible = visible);
    }

    fn measure(&self, handle: ElementHandle) -> Rect {
        self.nodes
            .get(&handle.node())
            .map(|node| self.resolve(node))
            .unwrap_or_default()
    }

    fn place(&mut self, handle: ElementHandle, placement: Placement) {
        let kind = handle.kind();
        self.with_node(handle, HostCall::Place { kind, placement }, |n| n.placement = placement);
    }

    fn set_size(&mut self, handle: ElementHandle, size: Size) {
        let kind = handle.kind();
        self.with_node(handle, HostCall::SetSize { kind, size }, |n| n.size = size);
    }

    fn set_transition(&mut self, handle: ElementHandle, transition: Option<SnapTransition>) {
        let kind = handle.kind();
        self.with_node(handle, HostCall::SetTransition { kind, transition }, |n| {
            n.transition = transition;
        });
    }

    fn set_cursor(&mut self, handle: ElementHandle, cursor: Cursor) {
        let kind = handle.kind();
        self.with_node(handle, HostCall::SetCursor { kind, cursor }, |n| n.cursor = Some(cursor));
    }

    fn set_dock_side(&mut self, handle: ElementHandle, side: DockSide) {
        let kind = handle.kind();
        self.with_node(handle, HostCall::SetDockSide { kind, side }, |n| n.dock_side = Some(side));
    }

    fn capture_pointer(&mut self, handle: ElementHandle, pointer_id: u32) -> Result<(), HostError> {
        if self.fail_capture {
            return Err(HostError::PointerCapture {
                pointer_id,
                reason: "simulated failure".into(),
            });
        }
        let kind = handle.kind();
        self.with_node(handle, HostCall::CapturePointer { kind, pointer_id }, |n| {
            n.captured_pointer = Some(pointer_id);
        });
        Ok(())
    }

    fn release_pointer(&mut self, handle: ElementHandle, pointer_id: u32) -> Result<(), HostError> {
        if self.fail_capture {
            return Err(HostError::PointerCapture {
                pointer_id,
                reason: "simulated failure".into(),
            });
        }
        let kind = handle.kind();
        self.with_node(handle, HostCall::ReleasePointer { kind, pointer_id }, |n| {
            n.captured_pointer = None;
        });
        Ok(())
    }
}

impl ThemeSink for HeadlessHost {
    fn apply_palette(&mut self, theme: ThemeName) {
        self.theme = Some(theme);
    }
}
