#![forbid(unsafe_code)]

//! Durable panel position.
//!
//! The panel's last position is written on every drag release and read once
//! when the panel is created. Writes go to the shared store when it is
//! reachable and to a page-local store otherwise; reads prefer the shared
//! store and fall back to the page-local one.
//!
//! Persistence is a convenience. Every failure here is logged and swallowed,
//! and a missing or malformed value leaves the panel at its default anchor.

use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use cigi_core::{Rect, Size, compute_clamped_rect};

use crate::config::StorageKeys;
use crate::store::{KeyValueStore, StoreError, entries};

/// Last-known panel position in viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowPosition {
    pub left: f64,
    pub top: f64,
}

impl WindowPosition {
    #[must_use]
    pub const fn new(left: f64, top: f64) -> Self {
        Self { left, top }
    }

    /// Decode a stored value.
    ///
    /// Accepts an object with finite numeric `left` and `top`, or a string
    /// holding such an object as JSON (page-local stores only hold strings).
    /// Anything else is malformed and yields `None`.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Object(map) => {
                let left = map.get("left")?.as_f64()?;
                let top = map.get("top")?.as_f64()?;
                (left.is_finite() && top.is_finite()).then_some(Self { left, top })
            }
            Value::String(text) => {
                let inner: Value = serde_json::from_str(text).ok()?;
                match inner {
                    Value::Object(_) => Self::from_value(&inner),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn to_value(self) -> Value {
        serde_json::json!({ "left": self.left, "top": self.top })
    }

    /// Clamp this position for a panel of `size` inside `viewport`.
    #[must_use]
    pub fn clamped(self, size: Size, viewport: Size, margin: f64) -> Rect {
        compute_clamped_rect(
            self.left,
            self.top,
            size.width,
            size.height,
            viewport.width,
            viewport.height,
            margin,
        )
    }
}

/// Which store a position was written to or read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionTier {
    Shared,
    PageLocal,
}

/// Reads and writes [`WindowPosition`] across the two store tiers.
#[derive(Clone)]
pub struct PositionStoreAdapter {
    shared: Rc<dyn KeyValueStore>,
    page_local: Rc<dyn KeyValueStore>,
    shared_key: String,
    page_local_key: String,
}

impl std::fmt::Debug for PositionStoreAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionStoreAdapter")
            .field("shared", &self.shared.name())
            .field("page_local", &self.page_local.name())
            .field("shared_key", &self.shared_key)
            .field("page_local_key", &self.page_local_key)
            .finish()
    }
}

impl PositionStoreAdapter {
    #[must_use]
    pub fn new(
        shared: Rc<dyn KeyValueStore>,
        page_local: Rc<dyn KeyValueStore>,
        keys: &StorageKeys,
    ) -> Self {
        Self {
            shared,
            page_local,
            shared_key: keys.window_position.clone(),
            page_local_key: keys.fallback_window_position.clone(),
        }
    }

    /// Key the shared tier stores positions under.
    #[must_use]
    pub fn shared_key(&self) -> &str {
        &self.shared_key
    }

    /// Store `position`, fire-and-forget.
    ///
    /// Returns the tier that accepted the write, or `None` if both failed.
    pub fn persist(&self, position: WindowPosition) -> Option<PositionTier> {
        if self.shared.is_available() {
            match self
                .shared
                .set(entries([(self.shared_key.as_str(), position.to_value())]))
            {
                Ok(()) => {
                    tracing::debug!(
                        left = position.left,
                        top = position.top,
                        tier = "shared",
                        "panel position saved"
                    );
                    return Some(PositionTier::Shared);
                }
                Err(error) => {
                    tracing::warn!(%error, "shared position write failed; using page-local store");
                }
            }
        }
        match self.write_page_local(position) {
            Ok(()) => {
                tracing::debug!(
                    left = position.left,
                    top = position.top,
                    tier = "page_local",
                    "panel position saved"
                );
                Some(PositionTier::PageLocal)
            }
            Err(error) => {
                tracing::warn!(%error, "panel position not saved");
                None
            }
        }
    }

    fn write_page_local(&self, position: WindowPosition) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(&position).map_err(StoreError::Serialization)?;
        self.page_local.set(entries([(
            self.page_local_key.as_str(),
            Value::String(encoded),
        )]))
    }

    /// Fetch the stored position and the tier it came from.
    #[must_use]
    pub fn load_with_tier(&self) -> Option<(WindowPosition, PositionTier)> {
        if self.shared.is_available()
            && let Some(position) = read(&*self.shared, &self.shared_key)
        {
            return Some((position, PositionTier::Shared));
        }
        read(&*self.page_local, &self.page_local_key).map(|p| (p, PositionTier::PageLocal))
    }

    /// Fetch the stored position, preferring the shared store.
    #[must_use]
    pub fn load(&self) -> Option<WindowPosition> {
        self.load_with_tier().map(|(position, _)| position)
    }

    /// Stored position clamped for a panel of `size`, if one is stored.
    #[must_use]
    pub fn restore(&self, size: Size, viewport: Size, margin: f64) -> Option<Rect> {
        let position = self.load()?;
        let rect = position.clamped(size, viewport, margin);
        tracing::debug!(
            stored_left = position.left,
            stored_top = position.top,
            left = rect.left,
            top = rect.top,
            "restored panel position"
        );
        Some(rect)
    }
}

fn read(store: &dyn KeyValueStore, key: &str) -> Option<WindowPosition> {
    let values = match store.get(&[key]) {
        Ok(values) => values,
        Err(error) => {
            tracing::warn!(store = store.name(), %error, "position read failed");
            return None;
        }
    };
    let value = values.get(key)?;
    let position = WindowPosition::from_value(value);
    if position.is_none() {
        tracing::warn!(store = store.name(), key, "discarding malformed panel position");
    }
    position
}
