#![forbid(unsafe_code)]

//! The overlay runtime: one per page context.
//!
//! [`Overlay`] owns the host, the stores, the localizer, the element
//! lifecycle and the gesture controllers, and is the single dispatch point
//! for everything the page reports:
//!
//! - [`Overlay::startup`] on load,
//! - [`Overlay::on_storage_change`] for each store notification,
//! - [`Overlay::locale_reloaded`] when a message fetch completes,
//! - [`Overlay::on_viewport_resized`] on window resize,
//! - [`Overlay::handle_event`] for pointer, click and minimize input.
//!
//! # Reconciliation
//!
//! Every reconciliation re-reads the full preference set and applies it; the
//! change payload is never trusted. Reconciliation is idempotent, so two
//! rapid notifications simply run it twice.
//!
//! # Failure Modes
//!
//! Nothing here returns an error to the page. Unavailable stores read as
//! "everything off", bad persisted values fall back to defaults, gesture
//! input with non-finite coordinates is dropped, and each of those is logged
//! at `warn`.

use std::fmt;
use std::rc::Rc;

use cigi_core::{GestureError, GestureMachine, Point};
use cigi_i18n::{I18nError, Localizer, MessageTable, ReloadTicket};
use web_time::Instant;

use crate::config::OverlayConfig;
use crate::controller::{ControllerOutcome, DragController, ResizeController};
use crate::host::{ElementKind, OverlayHost};
use crate::lifecycle::{
    ElementLifecycleManager, ElementRegistry, LifecycleTransition, PanelServices,
};
use crate::position::PositionStoreAdapter;
use crate::prefs::{PreferenceSet, migrate_legacy_preferences, read_preferences};
use crate::store::{KeyValueStore, StorageChange};
use crate::sync::{ChangeDisposition, SyncCoordinator, SyncStats};

/// Which overlay part received a pointer-down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayTarget {
    Button,
    PanelHeader,
    PanelResizeHandle,
}

/// Page input routed to the overlay.
///
/// Moves, releases and cancels are window-scoped and carry no target; they
/// go to whichever controller owns the pointer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverlayEvent {
    PointerDown {
        target: OverlayTarget,
        pointer_id: u32,
        position: Point,
    },
    PointerMove { pointer_id: u32, position: Point },
    PointerUp { pointer_id: u32, position: Point },
    /// `None` cancels whatever gesture is active (window blur).
    PointerCancel { pointer_id: Option<u32> },
    ButtonClick,
    MinimizeClick,
}

/// Result of [`Overlay::handle_event`].
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    Ignored,
    Gesture(ControllerOutcome),
    Lifecycle(Vec<LifecycleTransition>),
}

/// Result of startup or of a store notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStep {
    Ignored,
    Reconciled(Vec<LifecycleTransition>),
    /// Messages for the ticket's locale must be fetched and handed to
    /// [`Overlay::locale_reloaded`] before the UI is reconciled.
    AwaitingMessages(ReloadTicket),
}

/// Overlay state for one page.
pub struct Overlay<H: OverlayHost> {
    host: H,
    config: OverlayConfig,
    store: Rc<dyn KeyValueStore>,
    positions: PositionStoreAdapter,
    localizer: Localizer,
    lifecycle: ElementLifecycleManager,
    sync: SyncCoordinator,
    preferences: PreferenceSet,
    button_drag: Option<DragController>,
    panel_drag: Option<DragController>,
    panel_resize: Option<ResizeController>,
    reconciliations: u64,
}

impl<H: OverlayHost + fmt::Debug> fmt::Debug for Overlay<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Overlay")
            .field("host", &self.host)
            .field("store", &self.store.name())
            .field("registry", self.lifecycle.registry())
            .field("preferences", &self.preferences)
            .field("reconciliations", &self.reconciliations)
            .finish_non_exhaustive()
    }
}

impl<H: OverlayHost> Overlay<H> {
    /// `store` is the shared preference store; `page_local` backs position
    /// persistence when the shared store is unavailable.
    pub fn new(
        host: H,
        config: OverlayConfig,
        store: Rc<dyn KeyValueStore>,
        page_local: Rc<dyn KeyValueStore>,
        localizer: Localizer,
    ) -> Self {
        let positions = PositionStoreAdapter::new(Rc::clone(&store), page_local, &config.storage);
        let lifecycle = ElementLifecycleManager::new(&config);
        let sync = SyncCoordinator::new(&config.storage);
        Self {
            host,
            config,
            store,
            positions,
            localizer,
            lifecycle,
            sync,
            preferences: PreferenceSet::default(),
            button_drag: None,
            panel_drag: None,
            panel_resize: None,
            reconciliations: 0,
        }
    }

    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    #[must_use]
    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &ElementRegistry {
        self.lifecycle.registry()
    }

    #[must_use]
    pub fn localizer(&self) -> &Localizer {
        &self.localizer
    }

    #[must_use]
    pub fn positions(&self) -> &PositionStoreAdapter {
        &self.positions
    }

    /// Preferences applied by the latest reconciliation.
    #[must_use]
    pub const fn preferences(&self) -> PreferenceSet {
        self.preferences
    }

    #[must_use]
    pub const fn reconciliations(&self) -> u64 {
        self.reconciliations
    }

    #[must_use]
    pub fn sync_stats(&self) -> SyncStats {
        self.sync.stats()
    }

    /// Cold start: migrate legacy fields, then either reconcile or ask for
    /// the override locale's messages first.
    pub fn startup(&mut self) -> SyncStep {
        if let Err(error) = migrate_legacy_preferences(&*self.store, &self.config.storage) {
            tracing::warn!(store = self.store.name(), %error, "preference migration skipped");
        }
        let stored = read_preferences(&*self.store, &self.config.storage);
        tracing::info!(
            overlay_enabled = stored.flags.overlay_enabled,
            floating_button_enabled = stored.flags.floating_button_enabled,
            locale_override = stored.locale_override.as_deref().unwrap_or(""),
            "overlay starting"
        );
        match stored.locale_override {
            Some(locale) => self.request_locale(&locale),
            None => SyncStep::Reconciled(self.reconcile()),
        }
    }

    /// Re-read the preferences and bring both elements in line.
    pub fn reconcile(&mut self) -> Vec<LifecycleTransition> {
        let started = Instant::now();
        let flags = read_preferences(&*self.store, &self.config.storage).flags;
        let span = tracing::info_span!(
            "overlay.reconcile",
            reconciliation = self.reconciliations + 1,
            overlay_enabled = flags.overlay_enabled,
            floating_button_enabled = flags.floating_button_enabled,
        );
        let _guard = span.enter();
        self.preferences = flags;
        let transitions = self.lifecycle.apply_preferences(&mut self.host, flags);
        self.sync_controllers();
        self.reconciliations += 1;
        tracing::info!(
            transitions = transitions.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "reconciled"
        );
        transitions
    }

    /// Handle one store notification.
    pub fn on_storage_change(&mut self, change: &StorageChange) -> SyncStep {
        match self.sync.classify(change) {
            ChangeDisposition::Ignore => SyncStep::Ignored,
            ChangeDisposition::Reconcile => SyncStep::Reconciled(self.reconcile()),
            ChangeDisposition::ReloadLocale(Some(locale)) => self.request_locale(&locale),
            ChangeDisposition::ReloadLocale(None) => {
                self.localizer.reset();
                let mut transitions = self.recreate_panel();
                transitions.extend(self.reconcile());
                SyncStep::Reconciled(transitions)
            }
        }
    }

    fn request_locale(&mut self, locale: &str) -> SyncStep {
        match self.localizer.begin_reload(locale) {
            Ok(ticket) => {
                tracing::info!(
                    locale = ticket.locale(),
                    path = ticket.path(),
                    "loading override messages"
                );
                SyncStep::AwaitingMessages(ticket)
            }
            Err(error) => {
                tracing::warn!(locale, %error, "locale override ignored");
                self.localizer.reset();
                SyncStep::Reconciled(self.reconcile())
            }
        }
    }

    /// Install fetched messages, rebuild the panel in the new locale and
    /// reconcile. A ticket superseded by a later reload changes nothing.
    pub fn locale_reloaded(
        &mut self,
        ticket: &ReloadTicket,
        messages: Result<MessageTable, I18nError>,
    ) -> Vec<LifecycleTransition> {
        if !self.localizer.install(ticket, messages) {
            return Vec::new();
        }
        let mut transitions = self.recreate_panel();
        transitions.extend(self.reconcile());
        transitions
    }

    fn recreate_panel(&mut self) -> Vec<LifecycleTransition> {
        let services = PanelServices {
            localizer: &self.localizer,
            positions: &self.positions,
        };
        let transitions = self.lifecycle.recreate_panel(&mut self.host, services);
        self.sync_controllers();
        transitions
    }

    /// Clamp the panel and re-dock the launcher after a viewport change.
    /// Only the flags are read; no full reconciliation runs.
    pub fn on_viewport_resized(&mut self) {
        let flags = read_preferences(&*self.store, &self.config.storage).flags;
        let viewport = self.host.viewport();
        tracing::debug!(width = viewport.width, height = viewport.height, "viewport resized");
        self.lifecycle.on_viewport_resized(&mut self.host, flags);
    }

    /// Show the panel and hide the launcher.
    pub fn open_panel(&mut self) -> Vec<LifecycleTransition> {
        let services = PanelServices {
            localizer: &self.localizer,
            positions: &self.positions,
        };
        let transitions = self.lifecycle.open_panel(&mut self.host, services);
        self.sync_controllers();
        transitions
    }

    /// Hide the panel; the launcher comes back only if the stored
    /// preferences allow it.
    pub fn minimize_panel(&mut self) -> Vec<LifecycleTransition> {
        let flags = read_preferences(&*self.store, &self.config.storage).flags;
        self.preferences = flags;
        let transitions = self.lifecycle.minimize_panel(&mut self.host, flags);
        self.sync_controllers();
        transitions
    }

    /// Remove both elements, e.g. when the page unloads the overlay root.
    pub fn teardown(&mut self) -> Vec<LifecycleTransition> {
        let transitions = self.lifecycle.teardown(&mut self.host);
        self.sync_controllers();
        transitions
    }

    pub fn handle_event(&mut self, event: OverlayEvent) -> EventOutcome {
        let result = match event {
            OverlayEvent::PointerDown {
                target,
                pointer_id,
                position,
            } => self.pointer_down(target, pointer_id, position),
            OverlayEvent::PointerMove { pointer_id, position } => {
                self.pointer_move(pointer_id, position)
            }
            OverlayEvent::PointerUp { pointer_id, position } => {
                self.pointer_up(pointer_id, position)
            }
            OverlayEvent::PointerCancel { pointer_id } => self.pointer_cancel(pointer_id),
            OverlayEvent::ButtonClick => {
                let acts = self.button_drag.as_mut().is_none_or(DragController::click);
                if !acts {
                    tracing::debug!("click after drag suppressed");
                    return EventOutcome::Ignored;
                }
                return EventOutcome::Lifecycle(self.open_panel());
            }
            OverlayEvent::MinimizeClick => return EventOutcome::Lifecycle(self.minimize_panel()),
        };
        match result {
            Ok(ControllerOutcome::Ignored) => EventOutcome::Ignored,
            Ok(outcome) => {
                self.apply_outcome(outcome);
                EventOutcome::Gesture(outcome)
            }
            Err(error) => {
                tracing::warn!(%error, "pointer event dropped");
                EventOutcome::Ignored
            }
        }
    }

    fn pointer_down(
        &mut self,
        target: OverlayTarget,
        pointer_id: u32,
        position: Point,
    ) -> Result<ControllerOutcome, GestureError> {
        let host = &mut self.host;
        match target {
            OverlayTarget::Button => match self.button_drag.as_mut() {
                Some(drag) => drag.pointer_down(host, pointer_id, position),
                None => Ok(ControllerOutcome::Ignored),
            },
            OverlayTarget::PanelHeader => match self.panel_drag.as_mut() {
                Some(drag) => drag.pointer_down(host, pointer_id, position),
                None => Ok(ControllerOutcome::Ignored),
            },
            OverlayTarget::PanelResizeHandle => match self.panel_resize.as_mut() {
                Some(resize) => resize.pointer_down(host, pointer_id, position),
                None => Ok(ControllerOutcome::Ignored),
            },
        }
    }

    fn pointer_move(
        &mut self,
        pointer_id: u32,
        position: Point,
    ) -> Result<ControllerOutcome, GestureError> {
        let host = &mut self.host;
        if let Some(drag) = self.button_drag.as_mut().filter(|d| d.owns_pointer(pointer_id)) {
            return drag.pointer_move(host, pointer_id, position);
        }
        if let Some(drag) = self.panel_drag.as_mut().filter(|d| d.owns_pointer(pointer_id)) {
            return drag.pointer_move(host, pointer_id, position);
        }
        if let Some(resize) = self.panel_resize.as_mut().filter(|r| r.owns_pointer(pointer_id)) {
            return resize.pointer_move(host, pointer_id, position);
        }
        Ok(ControllerOutcome::Ignored)
    }

    fn pointer_up(
        &mut self,
        pointer_id: u32,
        position: Point,
    ) -> Result<ControllerOutcome, GestureError> {
        let host = &mut self.host;
        if let Some(drag) = self.button_drag.as_mut().filter(|d| d.owns_pointer(pointer_id)) {
            return drag.pointer_up(host, pointer_id, position);
        }
        if let Some(drag) = self.panel_drag.as_mut().filter(|d| d.owns_pointer(pointer_id)) {
            return drag.pointer_up(host, pointer_id, position);
        }
        if let Some(resize) = self.panel_resize.as_mut().filter(|r| r.owns_pointer(pointer_id)) {
            return resize.pointer_up(host, pointer_id, position);
        }
        Ok(ControllerOutcome::Ignored)
    }

    fn pointer_cancel(
        &mut self,
        pointer_id: Option<u32>,
    ) -> Result<ControllerOutcome, GestureError> {
        let host = &mut self.host;
        let owns = |machine: &GestureMachine| {
            let active = machine.active_pointer();
            active.is_some() && (pointer_id.is_none() || pointer_id == active)
        };
        if let Some(drag) = self.button_drag.as_mut().filter(|d| owns(d.machine())) {
            return drag.cancel(host, pointer_id);
        }
        if let Some(drag) = self.panel_drag.as_mut().filter(|d| owns(d.machine())) {
            return drag.cancel(host, pointer_id);
        }
        if let Some(resize) = self.panel_resize.as_mut().filter(|r| owns(r.machine())) {
            return resize.cancel(host, pointer_id);
        }
        Ok(ControllerOutcome::Ignored)
    }

    fn apply_outcome(&mut self, outcome: ControllerOutcome) {
        match outcome {
            ControllerOutcome::Snapped { side, .. }
            | ControllerOutcome::Canceled { snapped: Some(side) } => {
                self.lifecycle.registry_mut().set_dock_side(side);
            }
            ControllerOutcome::Released { position, .. } => {
                self.positions.persist(position);
            }
            _ => {}
        }
    }

    /// Attach controllers to newly created elements and drop the ones whose
    /// element was removed or replaced.
    fn sync_controllers(&mut self) {
        let registry = self.lifecycle.registry();
        let button = registry.handle(ElementKind::FloatingButton);
        let panel = registry.handle(ElementKind::Panel);

        if let Some(mut drag) = self.button_drag.take_if(|d| Some(d.handle()) != button) {
            drag.detach(&mut self.host);
        }
        if let Some(mut drag) = self.panel_drag.take_if(|d| Some(d.handle()) != panel) {
            drag.detach(&mut self.host);
        }
        if let Some(mut resize) = self.panel_resize.take_if(|r| Some(r.handle()) != panel) {
            resize.detach(&mut self.host);
        }

        if self.button_drag.is_none()
            && let Some(handle) = button
        {
            self.button_drag = attach(DragController::for_button(handle, &self.config));
        }
        if let Some(handle) = panel {
            if self.panel_drag.is_none() {
                self.panel_drag = attach(DragController::for_panel(handle, &self.config));
            }
            if self.panel_resize.is_none() {
                self.panel_resize = attach(ResizeController::new(handle, &self.config));
            }
        }
    }
}

fn attach<C>(controller: Result<C, GestureError>) -> Option<C> {
    match controller {
        Ok(controller) => Some(controller),
        Err(error) => {
            tracing::warn!(%error, "gesture controller not attached");
            None
        }
    }
}
