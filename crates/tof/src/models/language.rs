//! Language model.
//!
//! Languages are administrative records. Translations reference them by
//! code; deleting a language deletes every translation written in it.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TofError};

/// Language record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Language {
    /// Language code (e.g., "en", "fr", "pt-br").
    pub iso: String,

    /// Whether the language is offered for new translations.
    pub is_active: bool,
}

impl Language {
    /// Build an active language after validating and normalizing its code.
    pub fn new(iso: &str) -> Result<Self> {
        let iso = iso.trim().to_string();
        validate_language_id(&iso)?;
        Ok(Self {
            iso,
            is_active: true,
        })
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.iso)
    }
}

/// Validate that a language code follows BCP 47 primary subtag format.
///
/// Accepts: lowercase alpha 2-3 chars, optionally followed by hyphen-separated
/// alphanumeric subtags (e.g., "en", "fr", "pt-br", "zh-hans").
pub fn validate_language_id(id: &str) -> Result<()> {
    if id.is_empty() || id.len() > 12 {
        return Err(TofError::InvalidLanguage(format!(
            "language code must be 1-12 characters, got '{id}'"
        )));
    }

    let mut parts = id.split('-');

    match parts.next() {
        Some(primary) if (2..=3).contains(&primary.len()) => {
            if !primary.bytes().all(|b| b.is_ascii_lowercase()) {
                return Err(TofError::InvalidLanguage(format!(
                    "primary subtag must be lowercase letters, got '{id}'"
                )));
            }
        }
        _ => {
            return Err(TofError::InvalidLanguage(format!(
                "language code must start with a 2-3 letter primary subtag, got '{id}'"
            )));
        }
    }

    for subtag in parts {
        if subtag.is_empty()
            || subtag.len() > 8
            || !subtag.bytes().all(|b| b.is_ascii_alphanumeric())
        {
            return Err(TofError::InvalidLanguage(format!(
                "subtag must be 1-8 alphanumeric characters, got '{subtag}' in '{id}'"
            )));
        }
    }

    Ok(())
}
