#![forbid(unsafe_code)]

//! User preferences held in the shared store.
//!
//! Two boolean flags decide what the overlay shows, and an optional locale
//! tag overrides the browser's UI language. Every read returns the full set;
//! reconciliation never works from a delta.
//!
//! The first schema revision also carried a `devModeEnabled` flag. It is
//! ignored on read and removed by [`migrate_legacy_preferences`], which
//! stamps the current schema version so the migration runs once per store.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::StorageKeys;
use crate::store::{KeyValueStore, StoreError, entries};

/// Schema version written by [`migrate_legacy_preferences`].
pub const PREFERENCES_VERSION: u64 = 2;

/// Flags that decide which overlay elements exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceSet {
    /// Master switch. Off collapses the overlay to nothing.
    pub overlay_enabled: bool,
    /// Whether the floating launcher may be shown.
    pub floating_button_enabled: bool,
}

impl PreferenceSet {
    #[must_use]
    pub const fn new(overlay_enabled: bool, floating_button_enabled: bool) -> Self {
        Self {
            overlay_enabled,
            floating_button_enabled,
        }
    }

    /// Whether the launcher should exist at all.
    #[must_use]
    pub const fn button_allowed(&self) -> bool {
        self.overlay_enabled && self.floating_button_enabled
    }
}

/// Everything the overlay reads from the shared store.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoredPreferences {
    pub flags: PreferenceSet,
    /// Locale override; `None` follows the browser.
    pub locale_override: Option<String>,
}

/// A user-toggleable flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreferenceFlag {
    OverlayEnabled,
    FloatingButtonEnabled,
}

impl PreferenceFlag {
    /// Storage key for this flag.
    #[must_use]
    pub fn key(self, keys: &StorageKeys) -> &str {
        match self {
            Self::OverlayEnabled => &keys.overlay_enabled,
            Self::FloatingButtonEnabled => &keys.floating_button_enabled,
        }
    }
}

/// JavaScript-style truthiness for stored flag values.
fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_) | Value::Object(_)) => true,
    }
}

fn locale_from(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

impl StoredPreferences {
    /// Decode from a map of stored values. Missing or mistyped entries fall
    /// back to their defaults.
    #[must_use]
    pub fn from_values(values: &Map<String, Value>, keys: &StorageKeys) -> Self {
        Self {
            flags: PreferenceSet {
                overlay_enabled: truthy(values.get(&keys.overlay_enabled)),
                floating_button_enabled: truthy(values.get(&keys.floating_button_enabled)),
            },
            locale_override: locale_from(values.get(&keys.locale_override)),
        }
    }
}

/// Read the full preference set.
///
/// An unavailable store reads as all flags false with no locale override,
/// which collapses the overlay to its inert state.
#[must_use]
pub fn read_preferences(store: &dyn KeyValueStore, keys: &StorageKeys) -> StoredPreferences {
    let requested = [
        keys.overlay_enabled.as_str(),
        keys.floating_button_enabled.as_str(),
        keys.locale_override.as_str(),
    ];
    match store.get(&requested) {
        Ok(values) => StoredPreferences::from_values(&values, keys),
        Err(error) => {
            tracing::warn!(
                store = store.name(),
                %error,
                "preferences unavailable; overlay stays disabled"
            );
            StoredPreferences::default()
        }
    }
}

/// Write one flag. Used by control surfaces such as the popup toggles.
pub fn set_flag(
    store: &dyn KeyValueStore,
    keys: &StorageKeys,
    flag: PreferenceFlag,
    enabled: bool,
) -> Result<(), StoreError> {
    tracing::info!(key = flag.key(keys), enabled, "preference flag written");
    store.set(entries([(flag.key(keys), Value::Bool(enabled))]))
}

/// Write or clear the locale override.
pub fn set_locale_override(
    store: &dyn KeyValueStore,
    keys: &StorageKeys,
    locale: Option<&str>,
) -> Result<(), StoreError> {
    match locale.filter(|l| !l.is_empty()) {
        Some(locale) => store.set(entries([(
            keys.locale_override.as_str(),
            Value::String(locale.to_owned()),
        )])),
        None => store.remove(&[keys.locale_override.as_str()]),
    }
}

/// Remove first-revision fields and stamp [`PREFERENCES_VERSION`].
///
/// Returns `true` if the store was changed. A store already at the current
/// version is left untouched.
pub fn migrate_legacy_preferences(
    store: &dyn KeyValueStore,
    keys: &StorageKeys,
) -> Result<bool, StoreError> {
    let values = store.get(&[keys.preferences_version.as_str(), keys.legacy_dev_mode.as_str()])?;
    let version = values
        .get(&keys.preferences_version)
        .and_then(Value::as_u64)
        .unwrap_or(1);
    if version >= PREFERENCES_VERSION && !values.contains_key(&keys.legacy_dev_mode) {
        return Ok(false);
    }
    if values.contains_key(&keys.legacy_dev_mode) {
        store.remove(&[keys.legacy_dev_mode.as_str()])?;
    }
    if version < PREFERENCES_VERSION {
        store.set(entries([(
            keys.preferences_version.as_str(),
            Value::from(PREFERENCES_VERSION),
        )]))?;
    }
    tracing::info!(from = version, to = PREFERENCES_VERSION, "migrated stored preferences");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StorageArea};
    use serde_json::json;

    fn keys() -> StorageKeys {
        StorageKeys::default()
    }

    #[test]
    fn missing_values_read_as_disabled() {
        let store = MemoryStore::new(StorageArea::Local);
        assert_eq!(read_preferences(&store, &keys()), StoredPreferences::default());
    }

    #[test]
    fn flags_use_truthiness() {
        let store = MemoryStore::new(StorageArea::Local);
        store.seed([
            ("overlayEnabled", json!(1)),
            ("floatingButtonEnabled", json!("")),
            ("localeOverride", json!("fr")),
        ]);
        let prefs = read_preferences(&store, &keys());
        assert_eq!(prefs.flags, PreferenceSet::new(true, false));
        assert_eq!(prefs.locale_override.as_deref(), Some("fr"));
    }

    #[test]
    fn empty_locale_means_no_override() {
        let store = MemoryStore::new(StorageArea::Local);
        store.seed([("localeOverride", json!(""))]);
        assert_eq!(read_preferences(&store, &keys()).locale_override, None);
    }

    #[test]
    fn unavailable_store_reads_as_inert() {
        let store = MemoryStore::unavailable(StorageArea::Local);
        store.seed([("overlayEnabled", json!(true))]);
        assert_eq!(read_preferences(&store, &keys()).flags, PreferenceSet::default());
    }

    #[test]
    fn legacy_dev_mode_is_ignored_on_read() {
        let store = MemoryStore::new(StorageArea::Local);
        store.seed([("devModeEnabled", json!(true)), ("overlayEnabled", json!(true))]);
        let prefs = read_preferences(&store, &keys());
        assert_eq!(prefs.flags, PreferenceSet::new(true, false));
    }

    #[test]
    fn set_flag_writes_bool() {
        let store = MemoryStore::new(StorageArea::Local);
        set_flag(&store, &keys(), PreferenceFlag::FloatingButtonEnabled, true).expect("available");
        assert_eq!(store.peek("floatingButtonEnabled"), Some(json!(true)));
    }

    #[test]
    fn clearing_locale_removes_key() {
        let store = MemoryStore::new(StorageArea::Local);
        set_locale_override(&store, &keys(), Some("de")).expect("available");
        assert_eq!(store.peek("localeOverride"), Some(json!("de")));
        set_locale_override(&store, &keys(), None).expect("available");
        assert_eq!(store.peek("localeOverride"), None);
    }

    #[test]
    fn migration_removes_dev_mode_and_stamps_version() {
        let store = MemoryStore::new(StorageArea::Local);
        store.seed([("devModeEnabled", json!(true)), ("overlayEnabled", json!(true))]);
        assert!(migrate_legacy_preferences(&store, &keys()).expect("available"));
        assert_eq!(store.peek("devModeEnabled"), None);
        assert_eq!(store.peek("preferencesVersion"), Some(json!(2)));
        assert_eq!(store.peek("overlayEnabled"), Some(json!(true)));
        assert!(!migrate_legacy_preferences(&store, &keys()).expect("available"));
    }

    #[test]
    fn migration_on_unavailable_store_errors() {
        let store = MemoryStore::unavailable(StorageArea::Local);
        assert!(migrate_legacy_preferences(&store, &keys()).is_err());
    }
}
