#![no_main]

use cigi_overlay::{StorageKeys, StoredPreferences, WindowPosition};
use libfuzzer_sys::fuzz_target;
use serde_json::{Map, Value};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if text.len() > 4096 {
        return;
    }

    // Raw string as page-local storage would hand it back.
    let raw = Value::String(text.to_owned());
    if let Some(position) = WindowPosition::from_value(&raw) {
        assert!(position.left.is_finite() && position.top.is_finite());
    }

    let Ok(value) = serde_json::from_str::<Value>(text) else {
        return;
    };

    // Decoding never panics and only yields finite coordinates.
    if let Some(position) = WindowPosition::from_value(&value) {
        assert!(position.left.is_finite() && position.top.is_finite());
        assert_eq!(WindowPosition::from_value(&position.to_value()), Some(position));
    }

    // Any object decodes to some preference set; a present override is
    // never empty.
    let keys = StorageKeys::default();
    let values: Map<String, Value> = match value {
        Value::Object(map) => map,
        other => Map::from_iter([(keys.overlay_enabled.clone(), other)]),
    };
    let prefs = StoredPreferences::from_values(&values, &keys);
    if let Some(locale) = &prefs.locale_override {
        assert!(!locale.is_empty());
    }
});
