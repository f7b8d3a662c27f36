//! Generic addressing of model types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TofError;

/// App label reserved for tof's own tables.
pub const TOF_APP_LABEL: &str = "tof";

/// Identity of a model type, rendered as `app_label.model`.
///
/// Together with a numeric id it addresses any stored record without a
/// dedicated foreign key per type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentType {
    pub app_label: String,
    pub model: String,
}

impl ContentType {
    pub fn new(app_label: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            app_label: app_label.into(),
            model: model.into(),
        }
    }

    /// Whether fields of this type may be marked translatable.
    pub fn accepts_translations(&self) -> bool {
        self.app_label != TOF_APP_LABEL
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.app_label, self.model)
    }
}

impl FromStr for ContentType {
    type Err = TofError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((app_label, model)) = s.split_once('.') else {
            return Err(TofError::InvalidContentType(s.to_string()));
        };
        let valid = |part: &str| {
            !part.is_empty()
                && part
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
        };
        if !valid(app_label) || !valid(model) {
            return Err(TofError::InvalidContentType(s.to_string()));
        }
        Ok(Self::new(app_label, model))
    }
}

impl TryFrom<String> for ContentType {
    type Error = TofError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ContentType> for String {
    fn from(value: ContentType) -> Self {
        value.to_string()
    }
}
