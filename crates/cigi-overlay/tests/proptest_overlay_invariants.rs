//! Property-based invariant tests for the overlay runtime.
//!
//! 1. Whatever sequence of opens, minimizes and preference flips runs, the
//!    launcher is never visible while the panel is visible
//! 2. At most one node of each element kind exists in the page
//! 3. Reconciling the same stored preferences twice issues no host call the
//!    second time
//! 4. A launcher dragged anywhere stays inside the viewport and ends docked
//!    against a side edge
//! 5. A persisted panel position always restores inside the viewport margins

use std::rc::Rc;

use cigi_core::{Point, Size};
use cigi_i18n::Localizer;
use cigi_overlay::simulator::HeadlessHost;
use cigi_overlay::{
    ElementKind, ElementState, KeyValueStore, MemoryStore, Overlay, OverlayConfig, OverlayEvent,
    OverlayTarget, StorageArea, entries,
};
use proptest::prelude::*;
use serde_json::json;

#[derive(Debug, Clone, Copy)]
enum Step {
    Open,
    Minimize,
    SetOverlay(bool),
    SetButton(bool),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        Just(Step::Open),
        Just(Step::Minimize),
        any::<bool>().prop_map(Step::SetOverlay),
        any::<bool>().prop_map(Step::SetButton),
    ]
}

fn overlay(store: &MemoryStore, viewport: Size) -> Overlay<HeadlessHost> {
    let mut overlay = Overlay::new(
        HeadlessHost::new(viewport),
        OverlayConfig::default(),
        Rc::new(store.clone()),
        Rc::new(MemoryStore::new(StorageArea::Session)),
        Localizer::default(),
    );
    overlay.startup();
    overlay
}

fn run(overlay: &mut Overlay<HeadlessHost>, store: &MemoryStore, step: Step) {
    match step {
        Step::Open => {
            overlay.open_panel();
        }
        Step::Minimize => {
            overlay.minimize_panel();
        }
        Step::SetOverlay(on) => {
            store.set(entries([("overlayEnabled", json!(on))])).unwrap();
            overlay.reconcile();
        }
        Step::SetButton(on) => {
            store.set(entries([("floatingButtonEnabled", json!(on))])).unwrap();
            overlay.reconcile();
        }
    }
}

proptest! {
    #[test]
    fn launcher_and_panel_are_mutually_exclusive(
        initial in (any::<bool>(), any::<bool>()),
        steps in prop::collection::vec(step(), 1..40),
    ) {
        let store = MemoryStore::new(StorageArea::Local);
        store.seed([
            ("overlayEnabled", json!(initial.0)),
            ("floatingButtonEnabled", json!(initial.1)),
        ]);
        let mut overlay = overlay(&store, Size::new(1280.0, 800.0));
        for step in steps {
            run(&mut overlay, &store, step);
            let host = overlay.host();
            let panel = host.is_visible(ElementKind::Panel);
            prop_assert!(!(panel && host.is_visible(ElementKind::FloatingButton)));
            prop_assert!(host.count(ElementKind::Panel) <= 1);
            prop_assert!(host.count(ElementKind::FloatingButton) <= 1);
            let registry = overlay.registry();
            prop_assert_eq!(
                registry.state(ElementKind::FloatingButton).is_present(),
                host.count(ElementKind::FloatingButton) == 1
            );
            if registry.state(ElementKind::Panel) == ElementState::Visible {
                prop_assert_ne!(registry.state(ElementKind::FloatingButton), ElementState::Visible);
            }
        }
    }

    #[test]
    fn second_reconcile_is_silent(
        overlay_on in any::<bool>(),
        button_on in any::<bool>(),
        open_first in any::<bool>(),
    ) {
        let store = MemoryStore::new(StorageArea::Local);
        store.seed([
            ("overlayEnabled", json!(overlay_on)),
            ("floatingButtonEnabled", json!(button_on)),
        ]);
        let mut overlay = overlay(&store, Size::new(1280.0, 800.0));
        if open_first {
            overlay.open_panel();
        }
        overlay.reconcile();
        overlay.host_mut().clear_calls();
        let transitions = overlay.reconcile();
        prop_assert!(transitions.is_empty());
        prop_assert!(overlay.host().calls().is_empty());
    }

    #[test]
    fn dragged_launcher_stays_inside_and_docks(
        moves in prop::collection::vec((-3000.0f64..3000.0, -3000.0f64..3000.0), 1..20),
        width in 400.0f64..2560.0,
        height in 300.0f64..1440.0,
    ) {
        let store = MemoryStore::new(StorageArea::Local);
        store.seed([("overlayEnabled", json!(true)), ("floatingButtonEnabled", json!(true))]);
        let viewport = Size::new(width, height);
        let mut overlay = overlay(&store, viewport);
        let start = overlay.host().rect(ElementKind::FloatingButton).unwrap();
        let grab = Point::new(start.left + 20.0, start.top + 20.0);
        overlay.handle_event(OverlayEvent::PointerDown {
            target: OverlayTarget::Button,
            pointer_id: 1,
            position: grab,
        });
        let mut last = grab;
        for (x, y) in moves {
            last = Point::new(x, y);
            overlay.handle_event(OverlayEvent::PointerMove { pointer_id: 1, position: last });
            let rect = overlay.host().rect(ElementKind::FloatingButton).unwrap();
            let slack = 4.0 - 1e-9;
            prop_assert!(rect.left >= 4.0 && rect.right() <= width - slack, "rect {:?}", rect);
            prop_assert!(rect.top >= 4.0 && rect.bottom() <= height - slack, "rect {:?}", rect);
        }
        overlay.handle_event(OverlayEvent::PointerUp { pointer_id: 1, position: last });
        let rect = overlay.host().rect(ElementKind::FloatingButton).unwrap();
        let left_docked = (rect.left - 8.0).abs() < 1e-9;
        let right_docked = (width - rect.right() - 8.0).abs() < 1e-9;
        prop_assert!(left_docked || right_docked, "rect {:?}", rect);
    }

    #[test]
    fn restored_position_is_inside_margins(
        left in -5000.0f64..5000.0,
        top in -5000.0f64..5000.0,
    ) {
        let store = MemoryStore::new(StorageArea::Local);
        store.seed([
            ("overlayEnabled", json!(true)),
            ("overlayWindowPosition", json!({"left": left, "top": top})),
        ]);
        let mut overlay = overlay(&store, Size::new(1920.0, 1080.0));
        overlay.open_panel();
        let rect = overlay.host().rect(ElementKind::Panel).unwrap();
        prop_assert!(rect.left >= 8.0 && rect.right() <= 1920.0 - 8.0 + 1e-9, "rect {:?}", rect);
        prop_assert!(rect.top >= 8.0 && rect.bottom() <= 1080.0 - 8.0 + 1e-9, "rect {:?}", rect);
    }
}
