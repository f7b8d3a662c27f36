//! Database models.

pub mod content_type;
pub mod language;
pub mod translatable_field;
pub mod translation;

pub use content_type::ContentType;
pub use language::Language;
pub use translatable_field::TranslatableField;
pub use translation::Translation;
