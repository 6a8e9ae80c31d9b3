//! Structured-log contract of the overlay runtime.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use cigi_core::{Point, Size};
use cigi_i18n::Localizer;
use cigi_overlay::simulator::HeadlessHost;
use cigi_overlay::{
    ElementKind, MemoryStore, Overlay, OverlayConfig, OverlayEvent, OverlayTarget, StorageArea,
};
use serde_json::json;
use tracing::span::{Attributes, Id};
use tracing_subscriber::layer::{Context, SubscriberExt};

/// One span creation (`span` is its name) or event (`span` is `None`).
#[derive(Debug, Clone)]
struct Record {
    span: Option<&'static str>,
    level: tracing::Level,
    fields: HashMap<&'static str, String>,
}

impl Record {
    fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

struct Fields(HashMap<&'static str, String>);

impl tracing::field::Visit for Fields {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name(), format!("{value:?}"));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name(), value.to_owned());
    }
}

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<Record>>>);

impl<S> tracing_subscriber::Layer<S> for Capture
where
    S: tracing::Subscriber,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
        let mut fields = Fields(HashMap::new());
        attrs.record(&mut fields);
        let meta = attrs.metadata();
        self.0.lock().unwrap().push(Record {
            span: Some(meta.name()),
            level: *meta.level(),
            fields: fields.0,
        });
    }

    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = Fields(HashMap::new());
        event.record(&mut fields);
        self.0.lock().unwrap().push(Record {
            span: None,
            level: *event.metadata().level(),
            fields: fields.0,
        });
    }
}

impl Capture {
    fn run(f: impl FnOnce()) -> Vec<Record> {
        let capture = Self::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());
        tracing::subscriber::with_default(subscriber, f);
        let records = capture.0.lock().unwrap().clone();
        records
    }
}

fn messages_at(records: &[Record], level: tracing::Level) -> Vec<String> {
    records
        .iter()
        .filter(|r| r.span.is_none() && r.level == level)
        .filter_map(|r| r.field("message").map(str::to_owned))
        .collect()
}

fn overlay(shared: MemoryStore) -> Overlay<HeadlessHost> {
    Overlay::new(
        HeadlessHost::new(Size::new(1280.0, 800.0)),
        OverlayConfig::default(),
        Rc::new(shared),
        Rc::new(MemoryStore::new(StorageArea::Session)),
        Localizer::default(),
    )
}

#[test]
fn reconcile_runs_in_named_span_with_flags() {
    let store = MemoryStore::new(StorageArea::Local);
    store.seed([("overlayEnabled", json!(true)), ("floatingButtonEnabled", json!(false))]);
    let mut overlay = overlay(store);

    let records = Capture::run(|| {
        overlay.startup();
    });

    let reconcile: Vec<_> = records
        .iter()
        .filter(|r| r.span == Some("overlay.reconcile"))
        .collect();
    assert_eq!(reconcile.len(), 1);
    assert_eq!(reconcile[0].field("overlay_enabled"), Some("true"));
    assert_eq!(reconcile[0].field("floating_button_enabled"), Some("false"));
    assert_eq!(reconcile[0].field("reconciliation"), Some("1"));
    assert!(messages_at(&records, tracing::Level::INFO).iter().any(|m| m == "reconciled"));
}

#[test]
fn lifecycle_transitions_log_at_info() {
    let store = MemoryStore::new(StorageArea::Local);
    store.seed([("overlayEnabled", json!(true)), ("floatingButtonEnabled", json!(true))]);
    let mut overlay = overlay(store);

    let records = Capture::run(|| {
        overlay.startup();
    });

    let transitions: Vec<_> = records
        .iter()
        .filter(|r| r.field("message") == Some("element transition"))
        .collect();
    assert_eq!(transitions.len(), 1);
    assert_eq!(transitions[0].level, tracing::Level::INFO);
    assert_eq!(transitions[0].field("element"), Some("floating_button"));
    assert_eq!(transitions[0].field("to"), Some("visible"));
}

#[test]
fn unavailable_store_warns_and_stays_inert() {
    let mut overlay = overlay(MemoryStore::unavailable(StorageArea::Local));

    let records = Capture::run(|| {
        overlay.startup();
    });

    assert!(!messages_at(&records, tracing::Level::WARN).is_empty());
    assert_eq!(overlay.host().count(ElementKind::FloatingButton), 0);
    assert_eq!(overlay.host().count(ElementKind::Panel), 0);
}

#[test]
fn pointer_capture_failure_is_a_warning_not_an_error() {
    let store = MemoryStore::new(StorageArea::Local);
    store.seed([("overlayEnabled", json!(true)), ("floatingButtonEnabled", json!(true))]);
    let mut overlay = overlay(store);
    overlay.startup();
    overlay.host_mut().fail_pointer_capture(true);
    let start = overlay
        .host()
        .rect(ElementKind::FloatingButton)
        .expect("button mounted");

    let records = Capture::run(|| {
        overlay.handle_event(OverlayEvent::PointerDown {
            target: OverlayTarget::Button,
            pointer_id: 7,
            position: Point::new(start.left + 5.0, start.top + 5.0),
        });
    });

    let warnings = messages_at(&records, tracing::Level::WARN);
    assert!(warnings.iter().any(|m| m.contains("pointer capture failed")));
    assert!(messages_at(&records, tracing::Level::ERROR).is_empty());
}
