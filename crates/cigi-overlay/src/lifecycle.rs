#![forbid(unsafe_code)]

//! Element lifecycle: the floating launcher and the overlay panel.
//!
//! Each element is a singleton that moves between three states:
//!
//! ```text
//! Absent --create--> Visible <--show/hide--> Hidden
//!    ^                  |                       |
//!    \-----remove-------+-----------------------/
//! ```
//!
//! The [`ElementRegistry`] holds the handle returned at creation and the
//! current state of both elements. Nothing is looked up in the page after
//! creation; the registry is the source of truth.
//!
//! # Invariants
//!
//! 1. At most one launcher and one panel exist.
//! 2. While the panel is visible, the launcher is hidden or absent.
//! 3. Minimizing the panel re-evaluates the launcher from preferences; it is
//!    never restored unconditionally.
//! 4. Applying the same [`PreferenceSet`] twice issues no host call the
//!    second time.

use std::fmt;

use cigi_core::{DockSide, Placement, Rect, Size, clamp, clamp_rect_to_viewport, snap_placement};
use cigi_i18n::Localizer;

use crate::config::{ButtonConfig, OverlayConfig, PanelConfig};
use crate::host::{Cursor, ElementContent, ElementHandle, ElementKind, OverlayHost, PanelContent};
use crate::position::PositionStoreAdapter;
use crate::prefs::PreferenceSet;

/// Lifecycle state of one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ElementState {
    #[default]
    Absent,
    Visible,
    Hidden,
}

impl ElementState {
    #[must_use]
    pub const fn is_present(self) -> bool {
        !matches!(self, Self::Absent)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Visible => "visible",
            Self::Hidden => "hidden",
        }
    }
}

impl fmt::Display for ElementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What caused a lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCause {
    Preferences,
    PanelOpened,
    PanelMinimized,
    /// A show request the preferences do not allow.
    Refused,
    LocaleChanged,
    Teardown,
}

/// One applied state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleTransition {
    pub element: ElementKind,
    pub from: ElementState,
    pub to: ElementState,
    pub cause: TransitionCause,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Slot {
    handle: Option<ElementHandle>,
    state: ElementState,
}

/// Handles and states of both overlay elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRegistry {
    button: Slot,
    panel: Slot,
    dock_side: DockSide,
}

impl Default for ElementRegistry {
    fn default() -> Self {
        Self {
            button: Slot::default(),
            panel: Slot::default(),
            dock_side: DockSide::Right,
        }
    }
}

impl ElementRegistry {
    #[must_use]
    pub fn state(&self, kind: ElementKind) -> ElementState {
        self.slot(kind).state
    }

    #[must_use]
    pub fn handle(&self, kind: ElementKind) -> Option<ElementHandle> {
        self.slot(kind).handle
    }

    /// Edge the launcher last docked to.
    #[must_use]
    pub const fn dock_side(&self) -> DockSide {
        self.dock_side
    }

    /// Record the edge chosen by a snap.
    pub fn set_dock_side(&mut self, side: DockSide) {
        self.dock_side = side;
    }

    fn slot(&self, kind: ElementKind) -> &Slot {
        match kind {
            ElementKind::FloatingButton => &self.button,
            ElementKind::Panel => &self.panel,
        }
    }

    fn slot_mut(&mut self, kind: ElementKind) -> &mut Slot {
        match kind {
            ElementKind::FloatingButton => &mut self.button,
            ElementKind::Panel => &mut self.panel,
        }
    }
}

/// Collaborators needed to build the panel.
#[derive(Clone, Copy)]
pub struct PanelServices<'a> {
    pub localizer: &'a Localizer,
    pub positions: &'a PositionStoreAdapter,
}

fn localized_or(localizer: &Localizer, key: &str, default: &str) -> String {
    let text = localizer.text(key);
    if text == key { default.to_owned() } else { text }
}

impl PanelContent {
    /// Panel text in the localizer's current locale.
    #[must_use]
    pub fn localized(localizer: &Localizer) -> Self {
        Self {
            title: localized_or(localizer, "overlayTitle", "CIGI Overlay"),
            minimize_label: localized_or(localizer, "overlayMinimize", "Minimize"),
            tabs: [
                ("overlayTabOverview", "Overview"),
                ("overlayTabLayers", "Layers"),
                ("overlayTabSettings", "Settings"),
            ]
            .into_iter()
            .map(|(key, default)| localized_or(localizer, key, default))
            .collect(),
        }
    }
}

/// Owns the element state machines and drives the host through them.
#[derive(Debug, Clone)]
pub struct ElementLifecycleManager {
    registry: ElementRegistry,
    button: ButtonConfig,
    panel: PanelConfig,
}

type Transitions = Vec<LifecycleTransition>;

impl ElementLifecycleManager {
    #[must_use]
    pub fn new(config: &OverlayConfig) -> Self {
        Self {
            registry: ElementRegistry::default(),
            button: config.button.clone(),
            panel: config.panel.clone(),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &ElementRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ElementRegistry {
        &mut self.registry
    }

    fn record(
        &mut self,
        out: &mut Transitions,
        element: ElementKind,
        to: ElementState,
        cause: TransitionCause,
    ) {
        let slot = self.registry.slot_mut(element);
        let from = slot.state;
        if from == to {
            return;
        }
        slot.state = to;
        if to == ElementState::Absent {
            slot.handle = None;
        }
        tracing::info!(
            element = element.as_str(),
            from = from.as_str(),
            to = to.as_str(),
            cause = ?cause,
            "element transition"
        );
        out.push(LifecycleTransition {
            element,
            from,
            to,
            cause,
        });
    }

    fn create_button(&mut self, host: &mut dyn OverlayHost) -> Option<ElementHandle> {
        let content = ElementContent::FloatingButton {
            title: self.button.title.clone(),
            icon: self.button.icon.clone(),
        };
        let handle = match host.find(ElementKind::FloatingButton) {
            Some(existing) => {
                tracing::debug!(element = "floating_button", "adopting existing element");
                existing
            }
            None => match host.mount(&content) {
                Ok(handle) => handle,
                Err(error) => {
                    tracing::warn!(element = "floating_button", %error, "mount failed");
                    return None;
                }
            },
        };
        let viewport = host.viewport();
        let size = self.button.size;
        host.set_size(handle, size);
        host.place(
            handle,
            Placement::from_right(
                self.button.snap_inset,
                viewport.height / 2.0 - size.height / 2.0,
            ),
        );
        host.set_dock_side(handle, DockSide::Right);
        host.set_cursor(handle, Cursor::Grab);
        self.registry.dock_side = DockSide::Right;
        self.registry.button.handle = Some(handle);
        Some(handle)
    }

    fn create_panel(
        &mut self,
        host: &mut dyn OverlayHost,
        services: PanelServices<'_>,
    ) -> Option<ElementHandle> {
        let content = ElementContent::Panel(PanelContent::localized(services.localizer));
        let handle = match host.find(ElementKind::Panel) {
            Some(existing) => {
                tracing::debug!(element = "panel", "adopting existing element");
                existing
            }
            None => match host.mount(&content) {
                Ok(handle) => handle,
                Err(error) => {
                    tracing::warn!(element = "panel", %error, "mount failed");
                    return None;
                }
            },
        };
        let viewport = host.viewport();
        let margin = self.panel.margin;
        let size = self.fit_panel_size(self.panel.default_size(viewport), viewport);
        host.set_size(handle, size);
        let top = viewport.height * self.panel.default_top_ratio;
        let anchored = Rect::new(
            viewport.width - self.panel.default_right - size.width,
            top,
            size.width,
            size.height,
        );
        let clamped = clamp_rect_to_viewport(anchored, viewport, margin);
        if clamped == anchored {
            host.place(handle, Placement::from_right(self.panel.default_right, top));
        } else {
            tracing::debug!(
                left = clamped.left,
                top = clamped.top,
                "default panel clamped to viewport"
            );
            host.place(handle, Placement::at(clamped));
        }
        let measured = host.measure(handle).size().or(size);
        if let Some(rect) = services.positions.restore(measured, viewport, margin) {
            host.place(handle, Placement::at(rect));
        }
        self.registry.panel.handle = Some(handle);
        Some(handle)
    }

    /// Create the launcher if absent. A new launcher stays hidden while the
    /// panel is visible.
    pub fn ensure_button(&mut self, host: &mut dyn OverlayHost) -> Transitions {
        let mut out = Vec::new();
        self.ensure_button_into(host, TransitionCause::Preferences, &mut out);
        out
    }

    fn ensure_button_into(
        &mut self,
        host: &mut dyn OverlayHost,
        cause: TransitionCause,
        out: &mut Transitions,
    ) {
        if self.registry.button.state.is_present() {
            return;
        }
        let Some(handle) = self.create_button(host) else {
            return;
        };
        if self.registry.panel.state == ElementState::Visible {
            self.record(out, ElementKind::FloatingButton, ElementState::Hidden, cause);
        } else {
            host.set_visible(handle, true);
            self.record(out, ElementKind::FloatingButton, ElementState::Visible, cause);
        }
    }

    /// Show the launcher, or remove it if `prefs` disallow it.
    pub fn show_button(&mut self, host: &mut dyn OverlayHost, prefs: PreferenceSet) -> Transitions {
        let mut out = Vec::new();
        self.show_button_into(host, prefs, TransitionCause::PanelMinimized, &mut out);
        out
    }

    fn show_button_into(
        &mut self,
        host: &mut dyn OverlayHost,
        prefs: PreferenceSet,
        cause: TransitionCause,
        out: &mut Transitions,
    ) {
        if !prefs.button_allowed() {
            self.remove_into(host, ElementKind::FloatingButton, TransitionCause::Refused, out);
            return;
        }
        match self.registry.button.state {
            ElementState::Visible => {}
            ElementState::Absent => self.ensure_button_into(host, cause, out),
            ElementState::Hidden => {
                if let Some(handle) = self.registry.button.handle {
                    host.set_visible(handle, true);
                    self.resnap_button(host, handle);
                    self.record(out, ElementKind::FloatingButton, ElementState::Visible, cause);
                }
            }
        }
    }

    /// Hide the launcher without removing it.
    pub fn hide_button(&mut self, host: &mut dyn OverlayHost) -> Transitions {
        let mut out = Vec::new();
        self.hide_into(host, ElementKind::FloatingButton, TransitionCause::PanelOpened, &mut out);
        out
    }

    fn hide_into(
        &mut self,
        host: &mut dyn OverlayHost,
        kind: ElementKind,
        cause: TransitionCause,
        out: &mut Transitions,
    ) {
        let slot = *self.registry.slot(kind);
        if slot.state != ElementState::Visible {
            return;
        }
        if let Some(handle) = slot.handle {
            host.set_visible(handle, false);
        }
        self.record(out, kind, ElementState::Hidden, cause);
    }

    fn remove_into(
        &mut self,
        host: &mut dyn OverlayHost,
        kind: ElementKind,
        cause: TransitionCause,
        out: &mut Transitions,
    ) {
        let slot = *self.registry.slot(kind);
        if !slot.state.is_present() {
            return;
        }
        if let Some(handle) = slot.handle {
            host.unmount(handle);
        }
        self.record(out, kind, ElementState::Absent, cause);
    }

    /// Remove the launcher from the page.
    pub fn remove_button(&mut self, host: &mut dyn OverlayHost) -> Transitions {
        let mut out = Vec::new();
        self.remove_into(host, ElementKind::FloatingButton, TransitionCause::Preferences, &mut out);
        out
    }

    /// Show the panel, creating it if needed, and hide the launcher.
    pub fn open_panel(
        &mut self,
        host: &mut dyn OverlayHost,
        services: PanelServices<'_>,
    ) -> Transitions {
        let mut out = Vec::new();
        self.hide_into(host, ElementKind::FloatingButton, TransitionCause::PanelOpened, &mut out);
        match self.registry.panel.state {
            ElementState::Visible => {}
            ElementState::Absent => {
                if let Some(handle) = self.create_panel(host, services) {
                    host.set_visible(handle, true);
                    self.record(
                        &mut out,
                        ElementKind::Panel,
                        ElementState::Visible,
                        TransitionCause::PanelOpened,
                    );
                }
            }
            ElementState::Hidden => {
                if let Some(handle) = self.registry.panel.handle {
                    host.set_visible(handle, true);
                    self.reclamp_panel(host, handle);
                    self.record(
                        &mut out,
                        ElementKind::Panel,
                        ElementState::Visible,
                        TransitionCause::PanelOpened,
                    );
                }
            }
        }
        out
    }

    /// Hide the panel and re-evaluate the launcher from `prefs`.
    pub fn minimize_panel(
        &mut self,
        host: &mut dyn OverlayHost,
        prefs: PreferenceSet,
    ) -> Transitions {
        let mut out = Vec::new();
        self.minimize_into(host, prefs, &mut out);
        out
    }

    fn minimize_into(
        &mut self,
        host: &mut dyn OverlayHost,
        prefs: PreferenceSet,
        out: &mut Transitions,
    ) {
        self.hide_into(host, ElementKind::Panel, TransitionCause::PanelMinimized, out);
        self.show_button_into(host, prefs, TransitionCause::PanelMinimized, out);
    }

    /// Remove the panel from the page.
    pub fn remove_panel(&mut self, host: &mut dyn OverlayHost) -> Transitions {
        let mut out = Vec::new();
        self.remove_into(host, ElementKind::Panel, TransitionCause::Preferences, &mut out);
        out
    }

    /// Remove both elements.
    pub fn teardown(&mut self, host: &mut dyn OverlayHost) -> Transitions {
        let mut out = Vec::new();
        self.remove_into(host, ElementKind::FloatingButton, TransitionCause::Teardown, &mut out);
        self.remove_into(host, ElementKind::Panel, TransitionCause::Teardown, &mut out);
        out
    }

    /// Bring both elements in line with `prefs`.
    pub fn apply_preferences(
        &mut self,
        host: &mut dyn OverlayHost,
        prefs: PreferenceSet,
    ) -> Transitions {
        let mut out = Vec::new();
        if !prefs.overlay_enabled {
            self.remove_into(
                host,
                ElementKind::FloatingButton,
                TransitionCause::Preferences,
                &mut out,
            );
            self.remove_into(host, ElementKind::Panel, TransitionCause::Preferences, &mut out);
        } else if prefs.floating_button_enabled {
            self.ensure_button_into(host, TransitionCause::Preferences, &mut out);
        } else {
            self.remove_into(
                host,
                ElementKind::FloatingButton,
                TransitionCause::Preferences,
                &mut out,
            );
            self.minimize_into(host, prefs, &mut out);
        }
        out
    }

    /// Rebuild the panel so its static text follows the current locale.
    /// Visibility is preserved; an absent panel stays absent.
    pub fn recreate_panel(
        &mut self,
        host: &mut dyn OverlayHost,
        services: PanelServices<'_>,
    ) -> Transitions {
        let mut out = Vec::new();
        let previous = self.registry.panel.state;
        if !previous.is_present() {
            return out;
        }
        self.remove_into(host, ElementKind::Panel, TransitionCause::LocaleChanged, &mut out);
        if let Some(handle) = self.create_panel(host, services) {
            if previous == ElementState::Visible {
                host.set_visible(handle, true);
            }
            self.record(&mut out, ElementKind::Panel, previous, TransitionCause::LocaleChanged);
        }
        out
    }

    /// Re-fit visible elements after the viewport changed: the panel is
    /// clamped back inside, the launcher re-snaps to its recorded edge.
    pub fn on_viewport_resized(&mut self, host: &mut dyn OverlayHost, prefs: PreferenceSet) {
        if self.registry.panel.state == ElementState::Visible
            && let Some(handle) = self.registry.panel.handle
        {
            self.reclamp_panel(host, handle);
        }
        if prefs.button_allowed()
            && self.registry.button.state == ElementState::Visible
            && let Some(handle) = self.registry.button.handle
        {
            self.resnap_button(host, handle);
        }
    }

    fn reclamp_panel(&self, host: &mut dyn OverlayHost, handle: ElementHandle) {
        let viewport = host.viewport();
        let rect = host.measure(handle);
        let size = rect.size().or(self.panel.default_size(viewport));
        let margin = self.panel.margin;
        let fitted = self.fit_panel_size(size, viewport);
        if fitted != size {
            host.set_size(handle, fitted);
        }
        let clamped = clamp_rect_to_viewport(rect.with_size(fitted), viewport, margin);
        if clamped.left != rect.left || clamped.top != rect.top {
            tracing::debug!(left = clamped.left, top = clamped.top, "panel re-clamped to viewport");
            host.place(handle, Placement::at(clamped));
        }
    }

    /// Shrink `size` to the viewport less the margins, never below the
    /// minimum panel size.
    fn fit_panel_size(&self, size: Size, viewport: Size) -> Size {
        let margin = self.panel.margin;
        Size::new(
            clamp(size.width, self.panel.min_size.width, viewport.width - 2.0 * margin),
            clamp(size.height, self.panel.min_size.height, viewport.height - 2.0 * margin),
        )
    }

    fn resnap_button(&self, host: &mut dyn OverlayHost, handle: ElementHandle) {
        let viewport = host.viewport();
        let measured = host.measure(handle);
        let rect = measured.with_size(measured.size().or(self.button.size));
        let side = self.registry.dock_side;
        let placement =
            snap_placement(side, rect, viewport, self.button.snap_inset, self.button.drag_margin);
        host.set_transition(handle, Some(self.button.snap_transition()));
        host.place(handle, placement);
        host.set_dock_side(handle, side);
    }
}
