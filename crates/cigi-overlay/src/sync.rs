#![forbid(unsafe_code)]

//! Classification of store change notifications.
//!
//! Every context that shows the overlay (one per page) and every control
//! surface (popup, options page) shares one key-value store and nothing
//! else. A change notification is only a hint: the coordinator decides
//! whether it warrants a full reconciliation, a locale reload first, or
//! nothing at all. It never patches UI state from the delta itself.
//!
//! # Invariants
//!
//! 1. Changes outside [`StorageArea::Local`] are ignored.
//! 2. A change made up only of panel-position writes is ignored; those are
//!    this overlay's own writes and reconciling on them would be wasted work.
//! 3. A change that touches the locale override yields
//!    [`ChangeDisposition::ReloadLocale`] even if other keys changed too; the
//!    reload is followed by a full reconciliation.
//! 4. Any other change yields [`ChangeDisposition::Reconcile`].

use serde_json::Value;

use crate::config::StorageKeys;
use crate::store::{StorageArea, StorageChange};

/// What to do about one change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeDisposition {
    Ignore,
    Reconcile,
    /// Refresh localized strings for the new override (`None` = cleared),
    /// then reconcile.
    ReloadLocale(Option<String>),
}

/// Counters kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncStats {
    pub received: u64,
    pub ignored: u64,
    pub reconciles: u64,
    pub locale_reloads: u64,
}

/// Decides how each store change is handled.
#[derive(Debug, Clone)]
pub struct SyncCoordinator {
    keys: StorageKeys,
    stats: SyncStats,
}

impl SyncCoordinator {
    #[must_use]
    pub fn new(keys: &StorageKeys) -> Self {
        Self {
            keys: keys.clone(),
            stats: SyncStats::default(),
        }
    }

    #[must_use]
    pub const fn stats(&self) -> SyncStats {
        self.stats
    }

    fn is_own_write(&self, key: &str) -> bool {
        key == self.keys.window_position || key == self.keys.fallback_window_position
    }

    pub fn classify(&mut self, change: &StorageChange) -> ChangeDisposition {
        self.stats.received += 1;
        let disposition = self.disposition(change);
        match &disposition {
            ChangeDisposition::Ignore => self.stats.ignored += 1,
            ChangeDisposition::Reconcile => self.stats.reconciles += 1,
            ChangeDisposition::ReloadLocale(_) => self.stats.locale_reloads += 1,
        }
        tracing::debug!(
            area = change.area.as_str(),
            keys = ?change.keys().collect::<Vec<_>>(),
            disposition = ?disposition,
            "store change classified"
        );
        disposition
    }

    fn disposition(&self, change: &StorageChange) -> ChangeDisposition {
        if change.area != StorageArea::Local || change.changes.is_empty() {
            return ChangeDisposition::Ignore;
        }
        if change.keys().all(|key| self.is_own_write(key)) {
            return ChangeDisposition::Ignore;
        }
        if change.touches(&self.keys.locale_override) {
            let locale = change
                .new_value(&self.keys.locale_override)
                .and_then(Value::as_str)
                .filter(|locale| !locale.is_empty())
                .map(str::to_owned);
            return ChangeDisposition::ReloadLocale(locale);
        }
        ChangeDisposition::Reconcile
    }
}
