#![forbid(unsafe_code)]

//! Overlay runtime for the CIGI page overlay.
//!
//! # Role in CIGI Overlay
//! `cigi-overlay` decides what the page shows: which of the two overlay
//! elements exist and are visible, where they sit, how pointer gestures move
//! and resize them, and how every page context converges on the preferences
//! held in the shared store.
//!
//! # How it fits in the system
//! The page is reached only through [`OverlayHost`] and the stores only
//! through [`KeyValueStore`]. `cigi-web` implements both over the browser;
//! [`simulator::HeadlessHost`] and [`MemoryStore`] implement them in memory
//! so the whole runtime runs in native tests. Pure geometry and the gesture
//! state machine come from `cigi-core`, localized text from `cigi-i18n`.

pub mod config;
pub mod controller;
pub mod host;
pub mod lifecycle;
pub mod position;
pub mod prefs;
pub mod runtime;
pub mod simulator;
pub mod store;
pub mod sync;
pub mod theme;

pub use config::{
    ButtonConfig, DragConfig, OverlayConfig, OverlayConfigError, PanelConfig, StorageKeys,
};
pub use controller::{ControllerOutcome, DragController, ResizeController};
pub use host::{
    Cursor, ElementContent, ElementHandle, ElementKind, HostError, OverlayHost, PanelContent,
};
pub use lifecycle::{
    ElementLifecycleManager, ElementRegistry, ElementState, LifecycleTransition, PanelServices,
    TransitionCause,
};
pub use position::{PositionStoreAdapter, PositionTier, WindowPosition};
pub use prefs::{
    PREFERENCES_VERSION, PreferenceFlag, PreferenceSet, StoredPreferences,
    migrate_legacy_preferences, read_preferences, set_flag, set_locale_override,
};
pub use runtime::{EventOutcome, Overlay, OverlayEvent, OverlayTarget, SyncStep};
pub use store::{
    ChangeListener, ChangeQueue, KeyValueStore, MemoryStore, StorageArea, StorageChange, StoreError,
    Subscription, ValueChange, entries,
};
pub use sync::{ChangeDisposition, SyncCoordinator, SyncStats};
pub use theme::{ThemeController, ThemeName, ThemeSink, resolve_initial_theme};
