//! Multi-language text value held by instances for translated fields.

use std::collections::BTreeMap;

/// Slot of a [`TranslatableText`] that a write targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LanguageSlot {
    /// Value assigned before any language context existed.
    Origin,
    /// Value for one language code.
    Language(String),
}

impl LanguageSlot {
    pub fn language(code: impl Into<String>) -> Self {
        Self::Language(code.into())
    }
}

/// In-memory multi-language string.
///
/// Holds at most one value per language plus the origin value. Display
/// resolution: current language, then origin, then the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslatableText {
    origin: Option<String>,
    values: BTreeMap<String, String>,
}

impl TranslatableText {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text holding only an origin value.
    pub fn with_origin(value: impl Into<String>) -> Self {
        Self {
            origin: Some(value.into()),
            values: BTreeMap::new(),
        }
    }

    /// Write a value. Language writes never touch the origin slot.
    pub fn set(&mut self, slot: LanguageSlot, value: impl Into<String>) {
        match slot {
            LanguageSlot::Origin => self.origin = Some(value.into()),
            LanguageSlot::Language(code) => {
                self.values.insert(code, value.into());
            }
        }
    }

    /// Builder form of [`set`](Self::set) for one language.
    pub fn with(mut self, lang: &str, value: impl Into<String>) -> Self {
        self.set(LanguageSlot::language(lang), value);
        self
    }

    pub fn get(&self, lang: &str) -> Option<&str> {
        self.values.get(lang).map(String::as_str)
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// Language codes with a stored value, in code order.
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Per-language values; the origin is not included.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn remove(&mut self, lang: &str) -> Option<String> {
        self.values.remove(lang)
    }

    /// True when neither an origin nor any language value is set.
    pub fn is_empty(&self) -> bool {
        self.origin.is_none() && self.values.is_empty()
    }

    /// Resolve the value shown under `current`.
    pub fn resolve(&self, current: &str) -> &str {
        self.get(current).or(self.origin()).unwrap_or("")
    }

    pub fn to_display_string(&self, current: &str) -> String {
        self.resolve(current).to_string()
    }
}
