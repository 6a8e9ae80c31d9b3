#![forbid(unsafe_code)]

//! Light/dark theme selection.
//!
//! The palettes themselves belong to the page; this module only decides
//! which one applies and remembers the user's choice in the page-local
//! store.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::{KeyValueStore, entries};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThemeName {
    Light,
    Dark,
}

impl ThemeName {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }

    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

impl fmt::Display for ThemeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Applies a palette to the page (shared CSS variables, `data-theme`).
pub trait ThemeSink {
    fn apply_palette(&mut self, theme: ThemeName);
}

/// Pick the initial theme: the stored choice, then the system preference,
/// then dark. `prefers_dark` is `None` when the page cannot be queried.
#[must_use]
pub fn resolve_initial_theme(stored: Option<ThemeName>, prefers_dark: Option<bool>) -> ThemeName {
    match (stored, prefers_dark) {
        (Some(theme), _) => theme,
        (None, Some(true)) => ThemeName::Dark,
        (None, Some(false)) => ThemeName::Light,
        (None, None) => ThemeName::Dark,
    }
}

/// Reads and writes the theme choice.
#[derive(Clone)]
pub struct ThemeController {
    store: Rc<dyn KeyValueStore>,
    key: String,
}

impl fmt::Debug for ThemeController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThemeController")
            .field("store", &self.store.name())
            .field("key", &self.key)
            .finish()
    }
}

impl ThemeController {
    #[must_use]
    pub fn new(store: Rc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// The stored choice, if any and valid.
    #[must_use]
    pub fn stored(&self) -> Option<ThemeName> {
        let values = self.store.get(&[self.key.as_str()]).ok()?;
        values.get(&self.key)?.as_str().and_then(ThemeName::parse)
    }

    /// Resolve and apply the initial theme.
    pub fn init(&self, sink: &mut dyn ThemeSink, prefers_dark: Option<bool>) -> ThemeName {
        let theme = resolve_initial_theme(self.stored(), prefers_dark);
        self.apply(sink, theme);
        theme
    }

    /// Apply `theme` and remember it. A failed write is logged and ignored.
    pub fn apply(&self, sink: &mut dyn ThemeSink, theme: ThemeName) {
        sink.apply_palette(theme);
        if let Err(error) = self
            .store
            .set(entries([(self.key.as_str(), Value::String(theme.as_str().to_owned()))]))
        {
            tracing::warn!(%error, theme = theme.as_str(), "theme choice not saved");
        }
    }

    /// Switch to the other theme.
    pub fn toggle(&self, sink: &mut dyn ThemeSink, current: ThemeName) -> ThemeName {
        let next = current.toggled();
        self.apply(sink, next);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StorageArea};
    use serde_json::json;

    #[derive(Default)]
    struct Recorder(Vec<ThemeName>);

    impl ThemeSink for Recorder {
        fn apply_palette(&mut self, theme: ThemeName) {
            self.0.push(theme);
        }
    }

    #[test]
    fn stored_choice_wins() {
        assert_eq!(resolve_initial_theme(Some(ThemeName::Light), Some(true)), ThemeName::Light);
    }

    #[test]
    fn system_preference_then_dark() {
        assert_eq!(resolve_initial_theme(None, Some(false)), ThemeName::Light);
        assert_eq!(resolve_initial_theme(None, Some(true)), ThemeName::Dark);
        assert_eq!(resolve_initial_theme(None, None), ThemeName::Dark);
    }

    #[test]
    fn init_applies_and_persists() {
        let store = MemoryStore::new(StorageArea::Local);
        let controller = ThemeController::new(Rc::new(store.clone()), "cigi_theme");
        let mut sink = Recorder::default();
        assert_eq!(controller.init(&mut sink, Some(false)), ThemeName::Light);
        assert_eq!(sink.0, vec![ThemeName::Light]);
        assert_eq!(store.peek("cigi_theme"), Some(json!("light")));
    }

    #[test]
    fn invalid_stored_value_is_ignored() {
        let store = MemoryStore::new(StorageArea::Local);
        store.seed([("cigi_theme", json!("sepia"))]);
        let controller = ThemeController::new(Rc::new(store), "cigi_theme");
        assert_eq!(controller.stored(), None);
    }

    #[test]
    fn toggle_flips_and_saves() {
        let store = MemoryStore::new(StorageArea::Local);
        let controller = ThemeController::new(Rc::new(store.clone()), "cigi_theme");
        let mut sink = Recorder::default();
        assert_eq!(controller.toggle(&mut sink, ThemeName::Dark), ThemeName::Light);
        assert_eq!(controller.stored(), Some(ThemeName::Light));
    }

    #[test]
    fn unavailable_store_still_applies() {
        let store = Rc::new(MemoryStore::unavailable(StorageArea::Local));
        let controller = ThemeController::new(store, "cigi_theme");
        let mut sink = Recorder::default();
        controller.apply(&mut sink, ThemeName::Dark);
        assert_eq!(sink.0, vec![ThemeName::Dark]);
    }
}
