//! TranslatableField model.
//!
//! A record saying "this field of this model type is translatable". Persisting
//! one through [`Tof`](crate::Tof) activates it on the live class; removing it
//! deactivates it.

use serde::{Deserialize, Serialize};

use super::ContentType;
use crate::error::{Result, TofError};

/// Translatable field record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatableField {
    /// Derived key: `app_label.model.field`.
    pub id: String,

    /// Owning model type.
    pub content_type: ContentType,

    /// Field name on the owning model type.
    pub name: String,

    /// Human-readable field name.
    pub title: String,
}

impl TranslatableField {
    /// Build a record for `name` on `content_type`. The id is derived.
    pub fn new(content_type: ContentType, name: &str, title: &str) -> Result<Self> {
        if !content_type.accepts_translations() {
            return Err(TofError::NotTranslatable(content_type.to_string()));
        }
        let name = name.trim();
        if name.is_empty() || name.contains('.') {
            return Err(TofError::unknown_field(content_type.to_string(), name));
        }
        let title = match title.trim() {
            "" => name,
            t => t,
        };

        Ok(Self {
            id: Self::derive_id(&content_type, name),
            content_type,
            name: name.to_string(),
            title: title.to_string(),
        })
    }

    pub fn derive_id(content_type: &ContentType, name: &str) -> String {
        format!("{content_type}.{name}")
    }

    /// Field name encoded in a field id (its last dotted segment).
    pub fn name_from_id(id: &str) -> &str {
        id.rsplit_once('.').map_or(id, |(_, name)| name)
    }
}

impl std::fmt::Display for TranslatableField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}|{}", self.content_type.model, self.title)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn product() -> ContentType {
        ContentType::new("shop", "product")
    }

    #[test]
    fn id_is_derived_from_owner() {
        let field = TranslatableField::new(product(), "title", "Title").unwrap();
        assert_eq!(field.id, "shop.product.title");
        assert_eq!(field.to_string(), "product|Title");
    }

    #[test]
    fn empty_title_falls_back_to_name() {
        let field = TranslatableField::new(product(), "title", "  ").unwrap();
        assert_eq!(field.title, "title");
    }

    #[test]
    fn own_tables_rejected() {
        let err = TranslatableField::new(ContentType::new("tof", "language"), "iso", "Code");
        assert!(matches!(err, Err(TofError::NotTranslatable(_))));
    }

    #[test]
    fn name_from_id_takes_last_segment() {
        assert_eq!(TranslatableField::name_from_id("shop.product.title"), "title");
        assert_eq!(TranslatableField::name_from_id("title"), "title");
    }
}
