#![forbid(unsafe_code)]

//! Conversions between browser payloads and overlay types.
//!
//! Everything here is plain data in and out, so it compiles and is tested
//! natively; the `wasm32` modules only move values across the JS boundary.

use cigi_overlay::{ElementKind, OverlayConfig, OverlayTarget, StorageArea, StorageChange};
use serde_json::Value;

/// Selector of the panel's drag handle.
pub const HEADER_SELECTOR: &str = "[data-cigi-role=\"header\"]";
/// Selector of the panel's resize corner.
pub const RESIZE_SELECTOR: &str = "[data-cigi-role=\"resize\"]";
/// Selector of the panel's minimize control.
pub const MINIMIZE_SELECTOR: &str = "[data-cigi-role=\"minimize\"]";

/// Selector matching the launcher element.
#[must_use]
pub fn button_selector() -> String {
    format!("#{}", ElementKind::FloatingButton.dom_id())
}

/// Which grab area a `pointerdown` hit, given the `closest()` lookups the
/// caller performed. The minimize control never starts a drag.
#[must_use]
pub fn grab_target(
    on_button: bool,
    on_resize: bool,
    on_header: bool,
    on_minimize: bool,
) -> Option<OverlayTarget> {
    if on_minimize {
        None
    } else if on_resize {
        Some(OverlayTarget::PanelResizeHandle)
    } else if on_header {
        Some(OverlayTarget::PanelHeader)
    } else if on_button {
        Some(OverlayTarget::Button)
    } else {
        None
    }
}

/// Build a [`StorageChange`] from a `chrome.storage.onChanged` payload
/// (`{ key: { oldValue?, newValue? } }`) and its area name.
///
/// Returns `None` for an unknown area or a payload that is not an object.
#[must_use]
pub fn parse_storage_change(area: &str, changes: &Value) -> Option<StorageChange> {
    let area = StorageArea::parse(area)?;
    let object = changes.as_object()?;
    let mut change = StorageChange::new(area);
    for (key, entry) in object {
        let new_value = entry.get("newValue").cloned();
        let old_value = entry.get("oldValue").cloned();
        change = change.with(key.clone(), new_value);
        if let Some(recorded) = change.changes.get_mut(key) {
            recorded.old_value = old_value;
        }
    }
    Some(change)
}

/// Encode a value for a string-only page store. Strings are stored raw so
/// other scripts reading the key see plain text.
pub fn encode_page_value(value: &Value) -> Result<String, serde_json::Error> {
    match value {
        Value::String(text) => Ok(text.clone()),
        other => serde_json::to_string(other),
    }
}

/// Resolve the runtime configuration handed to the entry point. An absent
/// document yields the defaults; an invalid one is logged and replaced by
/// the defaults.
#[must_use]
pub fn resolve_config(json: Option<&str>) -> OverlayConfig {
    let Some(json) = json.filter(|text| !text.trim().is_empty()) else {
        return OverlayConfig::default();
    };
    match OverlayConfig::load_json(json) {
        Ok(config) => config,
        Err(error) => {
            tracing::warn!(%error, "invalid overlay config, using defaults");
            OverlayConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn resize_corner_wins_over_header() {
        assert_eq!(grab_target(false, true, true, false), Some(OverlayTarget::PanelResizeHandle));
        assert_eq!(grab_target(false, false, true, false), Some(OverlayTarget::PanelHeader));
        assert_eq!(grab_target(true, false, false, false), Some(OverlayTarget::Button));
        assert_eq!(grab_target(false, false, false, false), None);
    }

    #[test]
    fn minimize_control_never_grabs() {
        assert_eq!(grab_target(false, false, true, true), None);
    }

    #[test]
    fn button_selector_uses_stable_id() {
        assert_eq!(button_selector(), "#__cigi_overlay_fab__");
    }

    #[test]
    fn onchanged_payload_becomes_storage_change() {
        let payload = json!({
            "overlayEnabled": { "oldValue": false, "newValue": true },
            "localeOverride": { "oldValue": "fr" }
        });
        let change = parse_storage_change("local", &payload).unwrap();
        assert_eq!(change.area, StorageArea::Local);
        assert_eq!(change.new_value("overlayEnabled"), Some(&json!(true)));
        assert!(change.touches("localeOverride"));
        assert_eq!(change.new_value("localeOverride"), None);
        assert_eq!(change.changes["localeOverride"].old_value, Some(json!("fr")));
    }

    #[test]
    fn unknown_area_or_shape_is_rejected() {
        assert!(parse_storage_change("nowhere", &json!({})).is_none());
        assert!(parse_storage_change("local", &json!([1, 2])).is_none());
    }

    #[test]
    fn page_values_keep_strings_raw() {
        assert_eq!(encode_page_value(&json!("dark")).unwrap(), "dark");
        assert_eq!(
            encode_page_value(&json!({"left": 50, "top": 80})).unwrap(),
            r#"{"left":50,"top":80}"#
        );
    }

    #[test]
    fn config_falls_back_to_defaults() {
        assert_eq!(resolve_config(None), OverlayConfig::default());
        assert_eq!(resolve_config(Some("  ")), OverlayConfig::default());
        assert_eq!(resolve_config(Some("{not json")), OverlayConfig::default());
    }
}
