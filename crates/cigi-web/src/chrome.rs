#![forbid(unsafe_code)]

//! Extension and page storage, platform messages, and locale fetches.
//!
//! `chrome.storage.local` is asynchronous while [`KeyValueStore`] is not, so
//! [`ChromeStore`] serves reads from a mirror. The mirror is filled by
//! [`ChromeStore::refresh`] and kept current by writes and by
//! `storage.onChanged` deltas; writes go to the mirror at once and to the
//! extension store in the background. Only compiled on `wasm32` targets.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use cigi_i18n::{I18nError, MessageSource, MessageTable, ReloadTicket};
use cigi_overlay::{
    ChangeListener, KeyValueStore, StorageArea, StorageChange, StoreError, Subscription,
    ValueChange,
};
use js_sys::{Array, Promise};
use serde_json::{Map, Value};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::{JsFuture, spawn_local};

use crate::bridge::encode_page_value;
use crate::js::{call_method, describe, from_js, js_path, to_js};

const CHROME_STORE: &str = "chrome.storage.local";
const PAGE_STORE: &str = "localStorage";

fn backend(error: JsValue) -> StoreError {
    StoreError::Backend(describe(&error))
}

#[derive(Default)]
struct Listeners(RefCell<Vec<Weak<dyn Fn(&StorageChange)>>>);

impl Listeners {
    fn subscribe(&self, listener: Box<dyn Fn(&StorageChange)>) -> Subscription {
        let strong: ChangeListener = Rc::from(listener);
        self.0.borrow_mut().push(Rc::downgrade(&strong));
        Subscription::from_guard(strong)
    }

    fn notify(&self, store: &'static str, change: &StorageChange) {
        let live: Vec<ChangeListener> = {
            let mut listeners = self.0.borrow_mut();
            listeners.retain(|w| w.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };
        tracing::debug!(
            store,
            area = %change.area,
            keys = ?change.changes.keys().collect::<Vec<_>>(),
            listeners = live.len(),
            "storage change"
        );
        for listener in live {
            listener(change);
        }
    }
}

/// Mirror of `chrome.storage.local`.
#[derive(Clone, Default)]
pub struct ChromeStore {
    values: Rc<RefCell<Map<String, Value>>>,
    listeners: Rc<Listeners>,
}

impl fmt::Debug for ChromeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChromeStore")
            .field("mirrored", &self.values.borrow().len())
            .finish_non_exhaustive()
    }
}

impl ChromeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn area_object() -> Option<JsValue> {
        js_path(&["chrome", "storage", "local"])
    }

    /// Replace the mirror with the extension store's current contents.
    pub async fn refresh(&self) -> Result<(), StoreError> {
        let area = Self::area_object().ok_or(StoreError::Unavailable { store: CHROME_STORE })?;
        let pending = call_method(&area, "get", &[JsValue::NULL]).map_err(backend)?;
        let promise: Promise = pending.dyn_into().map_err(backend)?;
        let result = JsFuture::from(promise).await.map_err(backend)?;
        let values = match from_js(&result) {
            Some(Value::Object(values)) => values,
            _ => Map::new(),
        };
        *self.values.borrow_mut() = values;
        Ok(())
    }

    /// Fold a `storage.onChanged` delta into the mirror and notify
    /// subscribers. Deltas for other areas only notify.
    pub fn apply_change(&self, change: &StorageChange) {
        if change.area == StorageArea::Local {
            let mut values = self.values.borrow_mut();
            for (key, ValueChange { new_value, .. }) in &change.changes {
                match new_value {
                    Some(value) => {
                        values.insert(key.clone(), value.clone());
                    }
                    None => {
                        values.remove(key);
                    }
                }
            }
        }
        self.listeners.notify(CHROME_STORE, change);
    }

    fn check(&self) -> Result<JsValue, StoreError> {
        Self::area_object().ok_or(StoreError::Unavailable { store: CHROME_STORE })
    }

    fn fire(op: &'static str, pending: Result<JsValue, JsValue>) -> Result<(), StoreError> {
        let pending = pending.map_err(backend)?;
        if let Ok(promise) = pending.dyn_into::<Promise>() {
            spawn_local(async move {
                if let Err(error) = JsFuture::from(promise).await {
                    let error = describe(&error);
                    tracing::warn!(store = CHROME_STORE, op, %error, "background write failed");
                }
            });
        }
        Ok(())
    }
}

impl KeyValueStore for ChromeStore {
    fn area(&self) -> StorageArea {
        StorageArea::Local
    }

    fn name(&self) -> &'static str {
        CHROME_STORE
    }

    fn is_available(&self) -> bool {
        Self::area_object().is_some()
    }

    fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StoreError> {
        self.check()?;
        let values = self.values.borrow();
        Ok(keys
            .iter()
            .filter_map(|key| values.get(*key).map(|value| ((*key).to_owned(), value.clone())))
            .collect())
    }

    fn set(&self, values: Map<String, Value>) -> Result<(), StoreError> {
        let area = self.check()?;
        let payload = to_js(&Value::Object(values.clone())).map_err(backend)?;
        self.values.borrow_mut().extend(values);
        Self::fire("set", call_method(&area, "set", &[payload]))
    }

    fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        let area = self.check()?;
        {
            let mut values = self.values.borrow_mut();
            for key in keys {
                values.remove(*key);
            }
        }
        let list: Array = keys.iter().map(|key| JsValue::from_str(key)).collect();
        Self::fire("remove", call_method(&area, "remove", &[list.into()]))
    }

    fn subscribe(&self, listener: Box<dyn Fn(&StorageChange)>) -> Subscription {
        self.listeners.subscribe(listener)
    }
}

/// `window.localStorage` of the host page. Values are strings.
#[derive(Clone, Default)]
pub struct LocalStorageStore {
    listeners: Rc<Listeners>,
}

impl fmt::Debug for LocalStorageStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalStorageStore").finish_non_exhaustive()
    }
}

impl LocalStorageStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn storage() -> Result<web_sys::Storage, StoreError> {
        web_sys::window()
            .and_then(|window| window.local_storage().ok().flatten())
            .ok_or(StoreError::Unavailable { store: PAGE_STORE })
    }
}

impl KeyValueStore for LocalStorageStore {
    fn area(&self) -> StorageArea {
        StorageArea::Session
    }

    fn name(&self) -> &'static str {
        PAGE_STORE
    }

    fn is_available(&self) -> bool {
        Self::storage().is_ok()
    }

    fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StoreError> {
        let storage = Self::storage()?;
        let mut out = Map::new();
        for key in keys {
            if let Some(raw) = storage.get_item(key).map_err(backend)? {
                out.insert((*key).to_owned(), Value::String(raw));
            }
        }
        Ok(out)
    }

    fn set(&self, values: Map<String, Value>) -> Result<(), StoreError> {
        let storage = Self::storage()?;
        let mut change = StorageChange::new(StorageArea::Session);
        for (key, value) in values {
            let raw = encode_page_value(&value).map_err(StoreError::Serialization)?;
            let old = storage.get_item(&key).map_err(backend)?;
            if old.as_deref() == Some(raw.as_str()) {
                continue;
            }
            storage.set_item(&key, &raw).map_err(backend)?;
            change.changes.insert(
                key,
                ValueChange {
                    old_value: old.map(Value::String),
                    new_value: Some(Value::String(raw)),
                },
            );
        }
        if !change.changes.is_empty() {
            self.listeners.notify(PAGE_STORE, &change);
        }
        Ok(())
    }

    fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        let storage = Self::storage()?;
        let mut change = StorageChange::new(StorageArea::Session);
        for key in keys {
            if let Some(old) = storage.get_item(key).map_err(backend)? {
                storage.remove_item(key).map_err(backend)?;
                change.changes.insert(
                    (*key).to_owned(),
                    ValueChange {
                        old_value: Some(Value::String(old)),
                        new_value: None,
                    },
                );
            }
        }
        if !change.changes.is_empty() {
            self.listeners.notify(PAGE_STORE, &change);
        }
        Ok(())
    }

    fn subscribe(&self, listener: Box<dyn Fn(&StorageChange)>) -> Subscription {
        self.listeners.subscribe(listener)
    }
}

/// `chrome.i18n.getMessage`. An empty result means the key is unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeMessages;

impl MessageSource for ChromeMessages {
    fn message(&self, key: &str, substitutions: &[String]) -> Option<String> {
        let i18n = js_path(&["chrome", "i18n"])?;
        let args: Array = substitutions.iter().map(|s| JsValue::from_str(s)).collect();
        let message = call_method(&i18n, "getMessage", &[JsValue::from_str(key), args.into()])
            .ok()?
            .as_string()?;
        (!message.is_empty()).then_some(message)
    }
}

/// Fetch and parse the message file a reload ticket points at.
pub async fn fetch_messages(ticket: &ReloadTicket) -> Result<MessageTable, I18nError> {
    let fetch_error = |reason: String| I18nError::Fetch {
        locale: ticket.locale().to_owned(),
        reason,
    };
    let runtime = js_path(&["chrome", "runtime"])
        .ok_or_else(|| fetch_error("chrome.runtime unavailable".into()))?;
    let url = call_method(&runtime, "getURL", &[JsValue::from_str(ticket.path())])
        .map_err(|e| fetch_error(describe(&e)))?
        .as_string()
        .ok_or_else(|| fetch_error("getURL returned no string".into()))?;
    let window = web_sys::window().ok_or_else(|| fetch_error("no window".into()))?;
    let response = JsFuture::from(window.fetch_with_str(&url))
        .await
        .map_err(|e| fetch_error(describe(&e)))?;
    let response: web_sys::Response = response.dyn_into().map_err(|e| fetch_error(describe(&e)))?;
    if !response.ok() {
        return Err(fetch_error(format!("HTTP {}", response.status())));
    }
    let text = JsFuture::from(response.text().map_err(|e| fetch_error(describe(&e)))?)
        .await
        .map_err(|e| fetch_error(describe(&e)))?
        .as_string()
        .ok_or_else(|| fetch_error("response body is not text".into()))?;
    MessageTable::from_messages_json(&text)
}
