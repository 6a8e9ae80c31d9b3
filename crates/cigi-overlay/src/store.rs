#![forbid(unsafe_code)]

//! Key-value store abstraction shared by every UI context.
//!
//! The overlay, the popup, and any other extension page never share memory;
//! they only share a persistent key-value store with change notification.
//! [`KeyValueStore`] is that seam. The browser binding implements it over
//! `chrome.storage.local` and `window.localStorage`; [`MemoryStore`]
//! implements it in memory for tests and the headless simulator.
//! [`ChangeQueue`] defers notifications so they are handled after the
//! write that caused them has returned.
//!
//! # Invariants
//!
//! 1. `set` notifies subscribers only about keys whose value actually
//!    changed. A write that changes nothing is silent.
//! 2. Subscribers are notified in registration order, after the write is
//!    visible to `get`.
//! 3. Dropping a [`Subscription`] guard stops delivery; dead entries are
//!    pruned lazily during the next notification.
//!
//! # Failure Modes
//!
//! - An unavailable store fails every read and write with
//!   [`StoreError::Unavailable`]. Callers degrade (flags read as false,
//!   position as absent) rather than surfacing the error.

use std::any::Any;
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::{Map, Value};

/// Storage partition a change notification refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageArea {
    Local,
    Sync,
    Session,
    Managed,
}

impl StorageArea {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Sync => "sync",
            Self::Session => "session",
            Self::Managed => "managed",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "local" => Some(Self::Local),
            "sync" => Some(Self::Sync),
            "session" => Some(Self::Session),
            "managed" => Some(Self::Managed),
            _ => None,
        }
    }
}

impl fmt::Display for StorageArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Old and new value of one changed key. `None` means absent.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValueChange {
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

/// One change notification: which partition, which keys, and their values.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageChange {
    pub area: StorageArea,
    pub changes: BTreeMap<String, ValueChange>,
}

impl StorageChange {
    #[must_use]
    pub fn new(area: StorageArea) -> Self {
        Self {
            area,
            changes: BTreeMap::new(),
        }
    }

    /// Builder-style helper recording a key's new value.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, new_value: Option<Value>) -> Self {
        self.changes.insert(
            key.into(),
            ValueChange {
                old_value: None,
                new_value,
            },
        );
        self
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.changes.keys().map(String::as_str)
    }

    #[must_use]
    pub fn touches(&self, key: &str) -> bool {
        self.changes.contains_key(key)
    }

    /// New value of `key`, if the change touched it and it still exists.
    #[must_use]
    pub fn new_value(&self, key: &str) -> Option<&Value> {
        self.changes.get(key)?.new_value.as_ref()
    }
}

/// Errors raised by a [`KeyValueStore`].
#[derive(Debug)]
pub enum StoreError {
    /// The store cannot be reached from this execution context.
    Unavailable { store: &'static str },
    /// A value could not be encoded for the backend.
    Serialization(serde_json::Error),
    /// The backend rejected the operation (quota, security policy, ...).
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { store } => write!(f, "{store} store is unavailable"),
            Self::Serialization(e) => write!(f, "could not encode value: {e}"),
            Self::Backend(reason) => write!(f, "store backend error: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

/// Change listener stored as a strong `Rc` by the [`Subscription`] and as a
/// `Weak` by the store.
pub type ChangeListener = Rc<dyn Fn(&StorageChange)>;
type ListenerWeak = Weak<dyn Fn(&StorageChange)>;

/// RAII guard for a store subscription. Dropping it unsubscribes.
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct Subscription {
    _guard: Box<dyn Any>,
}

impl Subscription {
    /// Wrap any value whose drop ends the subscription.
    pub fn from_guard(guard: impl Any) -> Self {
        Self {
            _guard: Box::new(guard),
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// Persistent key-value store with change notification.
pub trait KeyValueStore {
    /// Partition this store writes to and reports in notifications.
    fn area(&self) -> StorageArea;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether the store can be used from this execution context.
    fn is_available(&self) -> bool {
        true
    }

    /// Read `keys`. Absent keys are missing from the returned map.
    fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StoreError>;

    /// Write a partial map of values.
    fn set(&self, values: Map<String, Value>) -> Result<(), StoreError>;

    /// Delete `keys`.
    fn remove(&self, keys: &[&str]) -> Result<(), StoreError>;

    /// Register a change listener.
    fn subscribe(&self, listener: Box<dyn Fn(&StorageChange)>) -> Subscription;

    /// Read `defaults.keys()`, substituting the default for absent keys.
    fn get_with_defaults(
        &self,
        defaults: &Map<String, Value>,
    ) -> Result<Map<String, Value>, StoreError> {
        let keys: Vec<&str> = defaults.keys().map(String::as_str).collect();
        let mut values = self.get(&keys)?;
        for (key, default) in defaults {
            values
                .entry(key.clone())
                .or_insert_with(|| default.clone());
        }
        Ok(values)
    }
}

struct MemoryInner {
    values: BTreeMap<String, Value>,
    listeners: Vec<ListenerWeak>,
    writes: u64,
}

/// In-memory [`KeyValueStore`].
///
/// Cloning yields another handle to the same storage, the way every extension
/// context sees the same `chrome.storage.local`.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Rc<RefCell<MemoryInner>>,
    area: StorageArea,
    name: &'static str,
    available: bool,
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("MemoryStore")
            .field("name", &self.name)
            .field("area", &self.area)
            .field("available", &self.available)
            .field("values", &inner.values)
            .field("listener_count", &inner.listeners.len())
            .finish()
    }
}

impl MemoryStore {
    /// An empty, available store for `area`.
    #[must_use]
    pub fn new(area: StorageArea) -> Self {
        Self {
            inner: Rc::new(RefCell::new(MemoryInner {
                values: BTreeMap::new(),
                listeners: Vec::new(),
                writes: 0,
            })),
            area,
            name: "memory",
            available: true,
        }
    }

    /// A store standing in for one that cannot be reached.
    #[must_use]
    pub fn unavailable(area: StorageArea) -> Self {
        Self {
            available: false,
            ..Self::new(area)
        }
    }

    /// Rename the store for log output.
    #[must_use]
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Seed values without notifying subscribers.
    pub fn seed<K: Into<String>>(&self, values: impl IntoIterator<Item = (K, Value)>) {
        let mut inner = self.inner.borrow_mut();
        for (key, value) in values {
            inner.values.insert(key.into(), value);
        }
    }

    /// Raw value of `key`, bypassing availability.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<Value> {
        self.inner.borrow().values.get(key).cloned()
    }

    /// Number of `set`/`remove` calls that changed at least one key.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.inner.borrow().writes
    }

    /// Number of registered listeners (including dead ones not yet pruned).
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.available {
            Ok(())
        } else {
            Err(StoreError::Unavailable { store: self.name })
        }
    }

    fn notify(&self, change: &StorageChange) {
        // Collect live listeners first so they may read or write the store.
        let listeners: Vec<ChangeListener> = {
            let mut inner = self.inner.borrow_mut();
            inner.listeners.retain(|w| w.strong_count() > 0);
            inner.listeners.iter().filter_map(Weak::upgrade).collect()
        };
        tracing::debug!(
            store = self.name,
            area = %change.area,
            keys = ?change.changes.keys().collect::<Vec<_>>(),
            listeners = listeners.len(),
            "storage change"
        );
        for listener in listeners {
            listener(change);
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn area(&self) -> StorageArea {
        self.area
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StoreError> {
        self.check()?;
        let inner = self.inner.borrow();
        Ok(keys
            .iter()
            .filter_map(|key| {
                inner
                    .values
                    .get(*key)
                    .map(|value| ((*key).to_owned(), value.clone()))
            })
            .collect())
    }

    fn set(&self, values: Map<String, Value>) -> Result<(), StoreError> {
        self.check()?;
        let mut change = StorageChange::new(self.area);
        {
            let mut inner = self.inner.borrow_mut();
            for (key, value) in values {
                let old_value = inner.values.insert(key.clone(), value.clone());
                if old_value.as_ref() != Some(&value) {
                    change.changes.insert(
                        key,
                        ValueChange {
                            old_value,
                            new_value: Some(value),
                        },
                    );
                }
            }
            if !change.changes.is_empty() {
                inner.writes += 1;
            }
        }
        if !change.changes.is_empty() {
            self.notify(&change);
        }
        Ok(())
    }

    fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        self.check()?;
        let mut change = StorageChange::new(self.area);
        {
            let mut inner = self.inner.borrow_mut();
            for key in keys {
                if let Some(old_value) = inner.values.remove(*key) {
                    change.changes.insert(
                        (*key).to_owned(),
                        ValueChange {
                            old_value: Some(old_value),
                            new_value: None,
                        },
                    );
                }
            }
            if !change.changes.is_empty() {
                inner.writes += 1;
            }
        }
        if !change.changes.is_empty() {
            self.notify(&change);
        }
        Ok(())
    }

    fn subscribe(&self, listener: Box<dyn Fn(&StorageChange)>) -> Subscription {
        let strong: ChangeListener = Rc::from(listener);
        self.inner
            .borrow_mut()
            .listeners
            .push(Rc::downgrade(&strong));
        Subscription::from_guard(strong)
    }
}

/// Build a partial map from `(key, value)` pairs.
pub fn entries<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Map<String, Value> {
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

/// Buffers store notifications until the caller drains them, so changes
/// are handled outside the store's notification loop.
pub struct ChangeQueue {
    pending: Rc<RefCell<VecDeque<StorageChange>>>,
    _subscription: Subscription,
}

impl fmt::Debug for ChangeQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeQueue")
            .field("pending", &self.pending.borrow().len())
            .finish_non_exhaustive()
    }
}

impl ChangeQueue {
    /// Subscribe to `store` and start buffering.
    #[must_use]
    pub fn attach(store: &dyn KeyValueStore) -> Self {
        let pending = Rc::new(RefCell::new(VecDeque::new()));
        let sink = Rc::clone(&pending);
        let subscription = store.subscribe(Box::new(move |change: &StorageChange| {
            sink.borrow_mut().push_back(change.clone());
        }));
        Self {
            pending,
            _subscription: subscription,
        }
    }

    /// Take every buffered notification, oldest first.
    pub fn drain(&self) -> Vec<StorageChange> {
        self.pending.borrow_mut().drain(..).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    #[test]
    fn set_then_get_round_trips() {
        let store = MemoryStore::new(StorageArea::Local);
        store
            .set(entries([("overlayEnabled", json!(true))]))
            .expect("available");
        let values = store.get(&["overlayEnabled", "missing"]).expect("available");
        assert_eq!(values.get("overlayEnabled"), Some(&json!(true)));
        assert!(!values.contains_key("missing"));
    }

    #[test]
    fn defaults_fill_missing_keys() {
        let store = MemoryStore::new(StorageArea::Local);
        store.seed([("a", json!(1))]);
        let values = store
            .get_with_defaults(&entries([("a", json!(0)), ("b", json!(false))]))
            .expect("available");
        assert_eq!(values.get("a"), Some(&json!(1)));
        assert_eq!(values.get("b"), Some(&json!(false)));
    }

    #[test]
    fn subscribers_see_only_changed_keys() {
        let store = MemoryStore::new(StorageArea::Local);
        store.seed([("a", json!(1))]);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _sub = store.subscribe(Box::new(move |change: &StorageChange| {
            sink.borrow_mut()
                .push(change.keys().map(str::to_owned).collect::<Vec<_>>());
        }));
        store
            .set(entries([("a", json!(1)), ("b", json!(2))]))
            .expect("available");
        store.set(entries([("a", json!(1))])).expect("available");
        assert_eq!(*seen.borrow(), vec![vec!["b".to_owned()]]);
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn dropped_subscription_stops_delivery() {
        let store = MemoryStore::new(StorageArea::Local);
        let count = Rc::new(Cell::new(0));
        let counter = Rc::clone(&count);
        let sub = store.subscribe(Box::new(move |_: &StorageChange| {
            counter.set(counter.get() + 1);
        }));
        store.set(entries([("k", json!(1))])).expect("available");
        drop(sub);
        store.set(entries([("k", json!(2))])).expect("available");
        assert_eq!(count.get(), 1);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn listener_may_read_store_during_notification() {
        let store = MemoryStore::new(StorageArea::Local);
        let reader = store.clone();
        let observed = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&observed);
        let _sub = store.subscribe(Box::new(move |_: &StorageChange| {
            *sink.borrow_mut() = reader.get(&["k"]).ok();
        }));
        store.set(entries([("k", json!("v"))])).expect("available");
        let values = observed.borrow().clone().expect("listener ran");
        assert_eq!(values.get("k"), Some(&json!("v")));
    }

    #[test]
    fn remove_reports_old_value() {
        let store = MemoryStore::new(StorageArea::Local);
        store.seed([("gone", json!(true))]);
        let seen = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&seen);
        let _sub = store.subscribe(Box::new(move |change: &StorageChange| {
            *sink.borrow_mut() = change.changes.get("gone").cloned();
        }));
        store.remove(&["gone", "never"]).expect("available");
        assert_eq!(
            seen.borrow().clone(),
            Some(ValueChange {
                old_value: Some(json!(true)),
                new_value: None
            })
        );
    }

    #[test]
    fn unavailable_store_fails_every_operation() {
        let store = MemoryStore::unavailable(StorageArea::Local).named("chrome.storage");
        assert!(!store.is_available());
        assert!(matches!(
            store.get(&["k"]),
            Err(StoreError::Unavailable { store: "chrome.storage" })
        ));
        assert!(store.set(entries([("k", json!(1))])).is_err());
        assert!(store.remove(&["k"]).is_err());
    }

    #[test]
    fn area_parses_chrome_names() {
        for area in [
            StorageArea::Local,
            StorageArea::Sync,
            StorageArea::Session,
            StorageArea::Managed,
        ] {
            assert_eq!(StorageArea::parse(area.as_str()), Some(area));
        }
        assert_eq!(StorageArea::parse("cloud"), None);
    }

    #[test]
    fn change_queue_buffers_until_drained() {
        let store = MemoryStore::new(StorageArea::Local);
        let queue = ChangeQueue::attach(&store);
        store.set(entries([("a", json!(1))])).expect("available");
        store.set(entries([("b", json!(2))])).expect("available");
        assert_eq!(queue.len(), 2);
        let drained = queue.drain();
        assert!(drained[0].touches("a"));
        assert!(drained[1].touches("b"));
        assert!(queue.is_empty());
    }
}
