#![forbid(unsafe_code)]

//! Internationalization for CIGI Overlay.
//!
//! Provides an explicit [`Localizer`] context holding the user's locale
//! override and its message table, with key-based lookup that falls back to
//! the browser's own message source and finally to the raw key.
//!
//! # Role in CIGI Overlay
//! The overlay panel renders its static text through a `Localizer`. When the
//! locale override changes in storage, the host fetches the new
//! `messages.json`, installs it here, and the panel is rebuilt.
//!
//! # How it fits in the system
//! This crate does no I/O. Fetching message files is the host's job; this
//! crate parses and serves them, keeping lookups synchronous and testable.

pub mod catalog;
pub mod localizer;

pub use catalog::{I18nError, MessageTable, messages_path};
pub use localizer::{
    DEFAULT_LOCALE, Localizer, MessageSource, NoMessageSource, ReloadTicket, Substitutions,
};
