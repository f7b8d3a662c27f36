//! Translation model: one stored value per (record, field, language).

use serde::{Deserialize, Serialize};

use super::{ContentType, TranslatableField};

/// Translation record.
///
/// Unique per (content_type, object_id, field_id, lang). Written only by the
/// save path of the owning record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    /// Type of the owning record.
    pub content_type: ContentType,

    /// Id of the owning record.
    pub object_id: i64,

    /// Translatable field id (`app_label.model.field`).
    pub field_id: String,

    /// Language code.
    pub lang: String,

    /// Translated value.
    pub value: String,
}

impl Translation {
    pub fn field_name(&self) -> &str {
        TranslatableField::name_from_id(&self.field_id)
    }

    /// Whether `other` addresses the same unique slot.
    pub fn same_key(&self, other: &Translation) -> bool {
        self.content_type == other.content_type
            && self.object_id == other.object_id
            && self.field_id == other.field_id
            && self.lang == other.lang
    }
}

impl std::fmt::Display for Translation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}.{}.{} = \"{}\"",
            self.content_type,
            self.object_id,
            self.field_name(),
            self.lang,
            self.value
        )
    }
}
