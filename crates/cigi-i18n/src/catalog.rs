#![forbid(unsafe_code)]

//! Message tables loaded from extension `_locales/<locale>/messages.json`
//! files.
//!
//! The file format is an object keyed by message name whose values carry a
//! `message` string (plus optional `description`/`placeholders`, which are
//! ignored):
//!
//! ```json
//! { "overlay_title": { "message": "CIGI Overlay", "description": "..." } }
//! ```

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

/// Errors raised while loading a message table.
#[derive(Debug)]
pub enum I18nError {
    /// The locale string cannot be used as a path segment.
    InvalidLocale(String),
    /// The host could not fetch the message file.
    Fetch { locale: String, reason: String },
    /// The message file is not valid JSON.
    Json(serde_json::Error),
    /// The message file is JSON but not an object of messages.
    NotAnObject,
}

impl fmt::Display for I18nError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLocale(locale) => write!(f, "invalid locale tag {locale:?}"),
            Self::Fetch { locale, reason } => {
                write!(f, "failed to fetch messages for {locale}: {reason}")
            }
            Self::Json(e) => write!(f, "JSON parse error: {e}"),
            Self::NotAnObject => write!(f, "messages file must be a JSON object"),
        }
    }
}

impl std::error::Error for I18nError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

/// Flat key → display-string table for one locale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageTable {
    messages: HashMap<String, String>,
}

impl MessageTable {
    /// Parse the contents of a `messages.json` file.
    ///
    /// Entries without a string `message` field are skipped.
    pub fn from_messages_json(text: &str) -> Result<Self, I18nError> {
        let value: Value = serde_json::from_str(text).map_err(I18nError::Json)?;
        let Value::Object(entries) = value else {
            return Err(I18nError::NotAnObject);
        };
        let messages = entries
            .into_iter()
            .filter_map(|(key, entry)| {
                let message = entry.get("message")?.as_str()?.to_owned();
                Some((key, message))
            })
            .collect();
        Ok(Self { messages })
    }

    /// Build a table from in-memory pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            messages: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.messages.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Extension-relative path of the message file for `locale`.
///
/// Rejects tags that could escape the `_locales` directory.
pub fn messages_path(locale: &str) -> Result<String, I18nError> {
    let valid = !locale.is_empty()
        && locale
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(I18nError::InvalidLocale(locale.to_owned()));
    }
    Ok(format!("_locales/{locale}/messages.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_message_entries() {
        let table = MessageTable::from_messages_json(
            r#"{
                "overlay_title": { "message": "CIGI Overlay", "description": "Panel title" },
                "overlay_minimize": { "message": "Réduire" }
            }"#,
        )
        .expect("valid messages file");
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("overlay_title"), Some("CIGI Overlay"));
        assert_eq!(table.get("overlay_minimize"), Some("Réduire"));
    }

    #[test]
    fn skips_entries_without_message_string() {
        let table = MessageTable::from_messages_json(
            r#"{ "a": { "message": 3 }, "b": "plain", "c": { "message": "ok" } }"#,
        )
        .expect("valid messages file");
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("c"), Some("ok"));
    }

    #[test]
    fn rejects_non_object_documents() {
        assert!(matches!(
            MessageTable::from_messages_json("[1, 2]"),
            Err(I18nError::NotAnObject)
        ));
        assert!(matches!(
            MessageTable::from_messages_json("{"),
            Err(I18nError::Json(_))
        ));
    }

    #[test]
    fn messages_path_for_locale() {
        assert_eq!(
            messages_path("pt_BR").expect("valid tag"),
            "_locales/pt_BR/messages.json"
        );
        assert!(messages_path("../secrets").is_err());
        assert!(messages_path("").is_err());
    }
}
