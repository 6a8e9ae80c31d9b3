#![forbid(unsafe_code)]

//! Locale override context.
//!
//! A [`Localizer`] owns the override locale chosen by the user and the
//! message table fetched for it. There is no process-wide state: each UI
//! context constructs its own localizer, and `reset()` returns it to the
//! platform default.
//!
//! # Lookup order
//!
//! 1. The override table, if one is installed and has the key.
//! 2. The platform [`MessageSource`] (the browser's `i18n.getMessage`).
//! 3. The key itself, or `key: a b` when positional substitutions were
//!    supplied.
//!
//! # Reload
//!
//! Fetching a message file is asynchronous and owned by the host. The host
//! calls [`Localizer::begin_reload`], fetches [`ReloadTicket::path`], then
//! hands the result to [`Localizer::install`]. A ticket issued before a newer
//! `begin_reload` is stale and its result is dropped, so overlapping reloads
//! settle on the most recent locale.

use std::fmt;

use crate::catalog::{I18nError, MessageTable, messages_path};

/// Locale reported when no override is set.
pub const DEFAULT_LOCALE: &str = "en";

/// Substitution arguments for a message lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Substitutions {
    #[default]
    None,
    One(String),
    Many(Vec<String>),
}

impl Substitutions {
    /// Arguments as a slice-like vector for platform lookups.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::None => Vec::new(),
            Self::One(value) => vec![value.clone()],
            Self::Many(values) => values.clone(),
        }
    }
}

/// Platform message lookup (e.g. `chrome.i18n.getMessage`).
pub trait MessageSource {
    /// Return the localized message, or `None` if the platform has none.
    fn message(&self, key: &str, substitutions: &[String]) -> Option<String>;
}

/// A [`MessageSource`] that never resolves anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMessageSource;

impl MessageSource for NoMessageSource {
    fn message(&self, _key: &str, _substitutions: &[String]) -> Option<String> {
        None
    }
}

/// Handle for one in-flight message-table fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadTicket {
    locale: String,
    path: String,
    generation: u64,
}

impl ReloadTicket {
    #[must_use]
    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Extension-relative path to fetch.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Explicit localization context.
pub struct Localizer {
    source: Box<dyn MessageSource>,
    override_locale: Option<String>,
    messages: Option<MessageTable>,
    generation: u64,
}

impl fmt::Debug for Localizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Localizer")
            .field("override_locale", &self.override_locale)
            .field("messages", &self.messages.as_ref().map(MessageTable::len))
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl Default for Localizer {
    fn default() -> Self {
        Self::new(Box::new(NoMessageSource))
    }
}

impl Localizer {
    /// Create a localizer with no override, backed by `source`.
    #[must_use]
    pub fn new(source: Box<dyn MessageSource>) -> Self {
        Self {
            source,
            override_locale: None,
            messages: None,
            generation: 0,
        }
    }

    /// Active locale: the override if set, otherwise [`DEFAULT_LOCALE`].
    #[must_use]
    pub fn locale(&self) -> &str {
        self.override_locale.as_deref().unwrap_or(DEFAULT_LOCALE)
    }

    /// The override locale, if any.
    #[must_use]
    pub fn override_locale(&self) -> Option<&str> {
        self.override_locale.as_deref()
    }

    /// Whether an override message table is installed.
    #[must_use]
    pub fn has_override_table(&self) -> bool {
        self.messages.is_some()
    }

    /// Drop the override and its table, invalidating in-flight reloads.
    pub fn reset(&mut self) {
        self.override_locale = None;
        self.messages = None;
        self.generation = self.generation.wrapping_add(1);
    }

    /// Start switching to `locale`. The override takes effect immediately for
    /// [`Localizer::locale`]; lookups keep using the previous table until
    /// [`Localizer::install`] is called with the returned ticket.
    pub fn begin_reload(&mut self, locale: &str) -> Result<ReloadTicket, I18nError> {
        let path = messages_path(locale)?;
        self.generation = self.generation.wrapping_add(1);
        self.override_locale = Some(locale.to_owned());
        Ok(ReloadTicket {
            locale: locale.to_owned(),
            path,
            generation: self.generation,
        })
    }

    /// Install the fetched table for `ticket`.
    ///
    /// Returns `false` if the ticket is stale. A failed fetch clears the
    /// override table so lookups fall back to the platform source and then to
    /// the raw key; it never surfaces as an error.
    pub fn install(
        &mut self,
        ticket: &ReloadTicket,
        fetched: Result<MessageTable, I18nError>,
    ) -> bool {
        if ticket.generation != self.generation {
            tracing::debug!(locale = %ticket.locale, "dropping stale message table");
            return false;
        }
        match fetched {
            Ok(table) => {
                let messages = table.len();
                tracing::info!(locale = %ticket.locale, messages, "installed locale override");
                self.messages = Some(table);
            }
            Err(error) => {
                tracing::warn!(
                    locale = %ticket.locale,
                    %error,
                    "locale fetch failed; using fallback text"
                );
                self.messages = None;
            }
        }
        true
    }

    /// Resolve `key` to display text. Never fails.
    #[must_use]
    pub fn lookup(&self, key: &str, substitutions: &Substitutions) -> String {
        if key.is_empty() {
            return String::new();
        }
        if let Some(message) = self.messages.as_ref().and_then(|table| table.get(key)) {
            return message.to_owned();
        }
        let args = substitutions.to_vec();
        if let Some(message) = self.source.message(key, &args)
            && !message.is_empty()
        {
            return message;
        }
        match substitutions {
            Substitutions::Many(values) if !values.is_empty() => {
                format!("{key}: {}", values.join(" "))
            }
            _ => key.to_owned(),
        }
    }

    /// Shorthand for a lookup without substitutions.
    #[must_use]
    pub fn text(&self, key: &str) -> String {
        self.lookup(key, &Substitutions::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSource;

    impl MessageSource for FixedSource {
        fn message(&self, key: &str, substitutions: &[String]) -> Option<String> {
            match key {
                "overlay_title" => Some("Platform Title".to_owned()),
                "greeting" => Some(format!("Hello {}", substitutions.join(","))),
                "blank" => Some(String::new()),
                _ => None,
            }
        }
    }

    fn localizer() -> Localizer {
        Localizer::new(Box::new(FixedSource))
    }

    #[test]
    fn default_locale_without_override() {
        assert_eq!(localizer().locale(), "en");
    }

    #[test]
    fn platform_source_used_without_override() {
        let l = localizer();
        assert_eq!(l.text("overlay_title"), "Platform Title");
        assert_eq!(
            l.lookup("greeting", &Substitutions::Many(vec!["a".into(), "b".into()])),
            "Hello a,b"
        );
    }

    #[test]
    fn override_table_wins_over_platform() {
        let mut l = localizer();
        let ticket = l.begin_reload("fr").expect("valid locale");
        assert!(l.install(
            &ticket,
            Ok(MessageTable::from_pairs([("overlay_title", "Superposition")]))
        ));
        assert_eq!(l.locale(), "fr");
        assert_eq!(l.text("overlay_title"), "Superposition");
    }

    #[test]
    fn unknown_key_falls_back_to_key_text() {
        let l = localizer();
        assert_eq!(l.text("missing_key"), "missing_key");
        assert_eq!(l.text("blank"), "blank");
        assert_eq!(
            l.lookup("missing_key", &Substitutions::Many(vec!["x".into(), "y".into()])),
            "missing_key: x y"
        );
        assert_eq!(l.lookup("missing_key", &Substitutions::One("x".into())), "missing_key");
        assert_eq!(l.text(""), "");
    }

    #[test]
    fn failed_fetch_clears_table_and_keeps_locale() {
        let mut l = localizer();
        let first = l.begin_reload("fr").expect("valid locale");
        l.install(&first, Ok(MessageTable::from_pairs([("k", "v")])));
        let second = l.begin_reload("de").expect("valid locale");
        l.install(
            &second,
            Err(I18nError::Fetch {
                locale: "de".into(),
                reason: "404".into(),
            }),
        );
        assert_eq!(l.locale(), "de");
        assert!(!l.has_override_table());
        assert_eq!(l.text("k"), "k");
    }

    #[test]
    fn stale_ticket_is_dropped() {
        let mut l = localizer();
        let stale = l.begin_reload("fr").expect("valid locale");
        let fresh = l.begin_reload("de").expect("valid locale");
        assert!(!l.install(&stale, Ok(MessageTable::from_pairs([("k", "fr")]))));
        assert!(l.install(&fresh, Ok(MessageTable::from_pairs([("k", "de")]))));
        assert_eq!(l.text("k"), "de");
    }

    #[test]
    fn reset_restores_default() {
        let mut l = localizer();
        let ticket = l.begin_reload("ja").expect("valid locale");
        l.install(&ticket, Ok(MessageTable::from_pairs([("k", "v")])));
        l.reset();
        assert_eq!(l.locale(), DEFAULT_LOCALE);
        assert_eq!(l.override_locale(), None);
        assert_eq!(l.text("k"), "k");
        // A fetch that lands after reset is ignored.
        assert!(!l.install(&ticket, Ok(MessageTable::default())));
    }

    #[test]
    fn invalid_locale_is_rejected_without_side_effects() {
        let mut l = localizer();
        assert!(l.begin_reload("../x").is_err());
        assert_eq!(l.locale(), DEFAULT_LOCALE);
    }
}
