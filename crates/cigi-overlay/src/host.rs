#![forbid(unsafe_code)]

//! The page seam.
//!
//! [`OverlayHost`] is the only way the overlay touches the page. The browser
//! binding implements it over the DOM; [`crate::simulator::HeadlessHost`]
//! implements it in memory and records every mutation.
//!
//! Hosts are deliberately dumb: they create and style nodes when told to and
//! report measurements. Every decision (where to place, when to hide, which
//! edge to dock to) is made by the overlay runtime.

use std::fmt;

use cigi_core::{DockSide, Placement, Rect, Size, SnapTransition};

/// The two singleton overlay elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementKind {
    FloatingButton,
    Panel,
}

impl ElementKind {
    /// Stable DOM identifier of the element.
    #[must_use]
    pub const fn dom_id(self) -> &'static str {
        match self {
            Self::FloatingButton => "__cigi_overlay_fab__",
            Self::Panel => "__cigi_overlay_window__",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FloatingButton => "floating_button",
            Self::Panel => "panel",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque reference to a mounted element, returned by
/// [`OverlayHost::mount`] and threaded through to the controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle {
    kind: ElementKind,
    node: u64,
}

impl ElementHandle {
    /// Hosts mint handles; `node` is whatever identifies the node to them.
    #[must_use]
    pub const fn new(kind: ElementKind, node: u64) -> Self {
        Self { kind, node }
    }

    #[must_use]
    pub const fn kind(&self) -> ElementKind {
        self.kind
    }

    #[must_use]
    pub const fn node(&self) -> u64 {
        self.node
    }
}

/// Static text of the overlay panel, already localized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelContent {
    pub title: String,
    pub minimize_label: String,
    pub tabs: Vec<String>,
}

/// What to render inside a newly mounted element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementContent {
    FloatingButton { title: String, icon: String },
    Panel(PanelContent),
}

impl ElementContent {
    #[must_use]
    pub const fn kind(&self) -> ElementKind {
        match self {
            Self::FloatingButton { .. } => ElementKind::FloatingButton,
            Self::Panel(_) => ElementKind::Panel,
        }
    }
}

/// Pointer affordance shown over an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    Grab,
    Grabbing,
    Move,
    ResizeDiagonal,
}

impl Cursor {
    #[must_use]
    pub const fn as_css(self) -> &'static str {
        match self {
            Self::Grab => "grab",
            Self::Grabbing => "grabbing",
            Self::Move => "move",
            Self::ResizeDiagonal => "nwse-resize",
        }
    }
}

/// Host-level failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// The page refused to create the element.
    Mount { kind: ElementKind, reason: String },
    /// Pointer capture or release threw.
    PointerCapture { pointer_id: u32, reason: String },
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mount { kind, reason } => write!(f, "cannot mount {kind}: {reason}"),
            Self::PointerCapture { pointer_id, reason } => {
                write!(f, "pointer capture failed for pointer {pointer_id}: {reason}")
            }
        }
    }
}

impl std::error::Error for HostError {}

/// Page operations the overlay needs.
pub trait OverlayHost {
    /// Current viewport size in CSS pixels.
    fn viewport(&self) -> Size;

    /// An element with the kind's stable id that already exists in the page.
    ///
    /// Only consulted when an element is about to be created, so an element
    /// left behind by an earlier instance is adopted instead of duplicated.
    fn find(&mut self, kind: ElementKind) -> Option<ElementHandle>;

    /// Create the element, hidden, with `content` rendered inside.
    fn mount(&mut self, content: &ElementContent) -> Result<ElementHandle, HostError>;

    /// Remove the element from the page.
    fn unmount(&mut self, handle: ElementHandle);

    fn set_visible(&mut self, handle: ElementHandle, visible: bool);

    /// Current on-screen rectangle. A hidden or unlaid element may measure
    /// as zero-sized.
    fn measure(&self, handle: ElementHandle) -> Rect;

    /// Position the element; replaces any previous anchoring.
    fn place(&mut self, handle: ElementHandle, placement: Placement);

    fn set_size(&mut self, handle: ElementHandle, size: Size);

    /// Enable the eased position transition, or disable it with `None`.
    fn set_transition(&mut self, handle: ElementHandle, transition: Option<SnapTransition>);

    fn set_cursor(&mut self, handle: ElementHandle, cursor: Cursor);

    /// Record the docked edge on the element (`data-side`).
    fn set_dock_side(&mut self, handle: ElementHandle, side: DockSide);

    fn capture_pointer(&mut self, handle: ElementHandle, pointer_id: u32) -> Result<(), HostError>;

    fn release_pointer(&mut self, handle: ElementHandle, pointer_id: u32) -> Result<(), HostError>;
}
