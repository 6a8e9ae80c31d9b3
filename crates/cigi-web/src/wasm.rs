#![forbid(unsafe_code)]

//! `wasm-bindgen` entry point and browser event wiring.
//!
//! Only compiled on `wasm32` targets.

use std::cell::RefCell;
use std::rc::Rc;

use cigi_core::Point;
use cigi_i18n::Localizer;
use cigi_overlay::{ChangeQueue, EventOutcome, Overlay, OverlayEvent, SyncStep, ThemeController};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Element, Event, EventTarget, PointerEvent};

use crate::bridge::{
    HEADER_SELECTOR, MINIMIZE_SELECTOR, RESIZE_SELECTOR, button_selector, grab_target,
    parse_storage_change, resolve_config,
};
use crate::chrome::{ChromeMessages, ChromeStore, LocalStorageStore, fetch_messages};
use crate::dom_host::DomHost;
use crate::js::{ConsoleSink, call_method, console_error, from_js, install_panic_hook, js_path};
use crate::logging;
use crate::pointer_capture::{
    PointerButton, PointerCaptureAdapter, PointerCaptureConfig, PointerDispatch,
};

struct App {
    overlay: Overlay<DomHost>,
    pointers: PointerCaptureAdapter,
}

type Shared = Rc<RefCell<App>>;

impl App {
    /// Log the dispatch and hand its event to the runtime. Returns whether
    /// the runtime acted on it.
    fn forward(&mut self, dispatch: PointerDispatch) -> bool {
        dispatch.log.emit();
        let Some(event) = dispatch.event else {
            return false;
        };
        let pointer_down = match event {
            OverlayEvent::PointerDown { pointer_id, .. } => Some(pointer_id),
            _ => None,
        };
        let handled = !matches!(self.overlay.handle_event(event), EventOutcome::Ignored);
        if !handled && let Some(pointer_id) = pointer_down {
            // The runtime had nothing to grab; free the adapter again.
            for reset in self.pointers.pointer_cancel(Some(pointer_id)) {
                reset.log.emit();
            }
        }
        handled
    }
}

/// Run `f` with the app, skipping events that arrive while it is busy.
fn with_app(app: &Shared, f: impl FnOnce(&mut App)) {
    match app.try_borrow_mut() {
        Ok(mut app) => f(&mut app),
        Err(_) => tracing::debug!("event dropped while the overlay is busy"),
    }
}

fn listen(target: &EventTarget, kind: &str, capture: bool, handler: impl FnMut(Event) + 'static) {
    let closure = Closure::wrap(Box::new(handler) as Box<dyn FnMut(Event)>);
    let callback = closure.as_ref().unchecked_ref();
    if let Err(error) = target.add_event_listener_with_callback_and_bool(kind, callback, capture) {
        tracing::warn!(kind, error = ?error, "cannot add event listener");
    }
    closure.forget();
}

fn pointer_id(event: &PointerEvent) -> u32 {
    u32::try_from(event.pointer_id()).unwrap_or(0)
}

fn client_point(event: &PointerEvent) -> Point {
    Point::new(f64::from(event.client_x()), f64::from(event.client_y()))
}

fn closest(element: &Element, selector: &str) -> bool {
    element.closest(selector).ok().flatten().is_some()
}

fn event_element(event: &Event) -> Option<Element> {
    event.target()?.dyn_into::<Element>().ok()
}

/// Continue after a sync step that needs a locale message fetch.
fn follow(app: &Shared, step: SyncStep) {
    let SyncStep::AwaitingMessages(ticket) = step else {
        return;
    };
    let app = Rc::clone(app);
    spawn_local(async move {
        let fetched = fetch_messages(&ticket).await;
        with_app(&app, |app| {
            app.overlay.locale_reloaded(&ticket, fetched);
        });
    });
}

fn install_pointer_listeners(app: &Shared, window: &EventTarget, document: &EventTarget) {
    let fab = button_selector();

    let down = Rc::clone(app);
    let fab_down = fab.clone();
    listen(document, "pointerdown", false, move |event| {
        let Some(pointer) = event.dyn_ref::<PointerEvent>() else {
            return;
        };
        let Some(element) = event_element(&event) else {
            return;
        };
        let Some(target) = grab_target(
            closest(&element, &fab_down),
            closest(&element, RESIZE_SELECTOR),
            closest(&element, HEADER_SELECTOR),
            closest(&element, MINIMIZE_SELECTOR),
        ) else {
            return;
        };
        with_app(&down, |app| {
            let dispatch = app.pointers.pointer_down(
                target,
                pointer_id(pointer),
                PointerButton::from_dom(pointer.button()),
                client_point(pointer),
            );
            if app.forward(dispatch) {
                event.prevent_default();
            }
        });
    });

    let moved = Rc::clone(app);
    listen(window, "pointermove", false, move |event| {
        let Some(pointer) = event.dyn_ref::<PointerEvent>() else {
            return;
        };
        with_app(&moved, |app| {
            let dispatch = app.pointers.pointer_move(pointer_id(pointer), client_point(pointer));
            app.forward(dispatch);
        });
    });

    let up = Rc::clone(app);
    listen(window, "pointerup", false, move |event| {
        let Some(pointer) = event.dyn_ref::<PointerEvent>() else {
            return;
        };
        with_app(&up, |app| {
            let dispatch = app.pointers.pointer_up(
                pointer_id(pointer),
                PointerButton::from_dom(pointer.button()),
                client_point(pointer),
            );
            app.forward(dispatch);
        });
    });

    let cancel = Rc::clone(app);
    listen(window, "pointercancel", false, move |event| {
        let id = event.dyn_ref::<PointerEvent>().map(pointer_id);
        with_app(&cancel, |app| {
            for dispatch in app.pointers.pointer_cancel(id) {
                app.forward(dispatch);
            }
        });
    });

    let leave = Rc::clone(app);
    let fab_leave = fab.clone();
    listen(document, "pointerleave", true, move |event| {
        let Some(pointer) = event.dyn_ref::<PointerEvent>() else {
            return;
        };
        let Some(element) = event_element(&event) else {
            return;
        };
        let matches = |selector: &str| element.matches(selector).unwrap_or(false);
        let target = grab_target(
            matches(&fab_leave),
            matches(RESIZE_SELECTOR),
            matches(HEADER_SELECTOR),
            false,
        );
        if target.is_none() {
            return;
        }
        with_app(&leave, |app| {
            let dispatch = app.pointers.pointer_leave(pointer_id(pointer));
            app.forward(dispatch);
        });
    });

    let got = Rc::clone(app);
    listen(document, "gotpointercapture", true, move |event| {
        let Some(pointer) = event.dyn_ref::<PointerEvent>() else {
            return;
        };
        with_app(&got, |app| {
            app.pointers.capture_acquired(pointer_id(pointer)).log.emit();
        });
    });

    let lost = Rc::clone(app);
    listen(document, "lostpointercapture", true, move |event| {
        let Some(pointer) = event.dyn_ref::<PointerEvent>() else {
            return;
        };
        with_app(&lost, |app| {
            let dispatch = app.pointers.lost_pointer_capture(pointer_id(pointer));
            app.forward(dispatch);
        });
    });

    let blur = Rc::clone(app);
    listen(window, "blur", false, move |_event| {
        with_app(&blur, |app| {
            for dispatch in app.pointers.blur() {
                app.forward(dispatch);
            }
        });
    });

    let hidden = Rc::clone(app);
    listen(document, "visibilitychange", false, move |_event| {
        let is_hidden = web_sys::window()
            .and_then(|window| window.document())
            .is_some_and(|document| document.hidden());
        if !is_hidden {
            return;
        }
        with_app(&hidden, |app| {
            for dispatch in app.pointers.visibility_hidden() {
                app.forward(dispatch);
            }
        });
    });

    let click = Rc::clone(app);
    listen(document, "click", false, move |event| {
        let Some(element) = event_element(&event) else {
            return;
        };
        let overlay_event = if closest(&element, MINIMIZE_SELECTOR) {
            OverlayEvent::MinimizeClick
        } else if closest(&element, &fab) {
            OverlayEvent::ButtonClick
        } else {
            return;
        };
        with_app(&click, |app| {
            app.overlay.handle_event(overlay_event);
        });
    });
}

fn install_storage_listener(app: &Shared, store: ChromeStore, queue: Rc<ChangeQueue>) {
    let Some(on_changed) = js_path(&["chrome", "storage", "onChanged"]) else {
        tracing::warn!("chrome.storage.onChanged unavailable; preferences will not sync");
        return;
    };
    let app = Rc::clone(app);
    let closure = Closure::wrap(Box::new(move |changes: JsValue, area: JsValue| {
        let area = area.as_string().unwrap_or_default();
        let parsed = from_js(&changes).and_then(|changes| parse_storage_change(&area, &changes));
        let Some(change) = parsed else {
            tracing::debug!(area = %area, "unrecognized storage change");
            return;
        };
        store.apply_change(&change);
        let app = Rc::clone(&app);
        let store = store.clone();
        let queue = Rc::clone(&queue);
        spawn_local(async move {
            if let Err(error) = store.refresh().await {
                tracing::warn!(%error, "storage refresh failed; using mirrored values");
            }
            for change in queue.drain() {
                let mut step = SyncStep::Ignored;
                with_app(&app, |app| step = app.overlay.on_storage_change(&change));
                follow(&app, step);
            }
        });
    }) as Box<dyn FnMut(JsValue, JsValue)>);
    if let Err(error) = call_method(&on_changed, "addListener", &[closure.as_ref().clone()]) {
        tracing::warn!(error = ?error, "cannot subscribe to chrome.storage.onChanged");
    }
    closure.forget();
}

/// Start the overlay in the current page.
///
/// `config_json` is an optional partial [`cigi_overlay::OverlayConfig`]
/// document; invalid documents fall back to the defaults.
#[wasm_bindgen]
pub fn start(config_json: Option<String>) {
    install_panic_hook();
    if !logging::init(ConsoleSink, tracing::Level::INFO) {
        console_error("[CIGI Overlay] a tracing subscriber is already installed; keeping it");
    }

    let Some(window) = web_sys::window() else {
        console_error("[CIGI Overlay] no window; overlay not started");
        return;
    };
    let Some(document) = window.document() else {
        console_error("[CIGI Overlay] no document; overlay not started");
        return;
    };

    let config = resolve_config(config_json.as_deref());
    let chrome = ChromeStore::new();
    let page = LocalStorageStore::new();
    let queue = Rc::new(ChangeQueue::attach(&chrome));

    let mut host = DomHost::new(window.clone(), document.clone());
    let theme = ThemeController::new(Rc::new(page.clone()), config.storage.theme.clone());
    let prefers_dark = host.prefers_dark();
    theme.init(&mut host, prefers_dark);

    let overlay = Overlay::new(
        host,
        config,
        Rc::new(chrome.clone()),
        Rc::new(page),
        Localizer::new(Box::new(ChromeMessages)),
    );
    let app: Shared = Rc::new(RefCell::new(App {
        overlay,
        pointers: PointerCaptureAdapter::new(PointerCaptureConfig::default()),
    }));

    let window_target: EventTarget = window.into();
    let document_target: EventTarget = document.into();
    install_pointer_listeners(&app, &window_target, &document_target);

    let resized = Rc::clone(&app);
    listen(&window_target, "resize", false, move |_event| {
        with_app(&resized, |app| app.overlay.on_viewport_resized());
    });

    spawn_local(async move {
        if let Err(error) = chrome.refresh().await {
            tracing::warn!(%error, "initial storage read failed");
        }
        // Startup changes are already in the mirror.
        let _ = queue.drain();
        let mut step = SyncStep::Ignored;
        with_app(&app, |app| step = app.overlay.startup());
        follow(&app, step);
        install_storage_listener(&app, chrome, queue);
    });
}
