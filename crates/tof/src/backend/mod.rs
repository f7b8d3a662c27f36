//! Storage backends.
//!
//! tof has no storage engine of its own. A [`Backend`] runs logical queries
//! for model tables and stores the language, translatable field and
//! translation tables.

mod memory;
mod postgres;

pub use memory::MemoryBackend;
pub use postgres::PgBackend;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::class::ModelDefinition;
use crate::error::Result;
use crate::models::{ContentType, Language, TranslatableField, Translation};
use crate::query::QuerySpec;

/// A stored record: column name to JSON value.
pub type Row = Map<String, Value>;

/// Storage used by tof.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Whether tof's own tables exist.
    async fn schema_ready(&self) -> Result<bool>;

    /// Rows of `model` matching `spec`, with annotation values included.
    async fn select(&self, model: &ModelDefinition, spec: &QuerySpec) -> Result<Vec<Row>>;

    /// Number of rows matching `spec`, ignoring its slice.
    async fn count(&self, model: &ModelDefinition, spec: &QuerySpec) -> Result<usize>;

    /// Insert a row and return its new id.
    async fn insert(&self, model: &ModelDefinition, values: &Row) -> Result<i64>;

    /// Overwrite the given columns of row `id`.
    async fn update(&self, model: &ModelDefinition, id: i64, values: &Row) -> Result<()>;

    /// Delete row `id` and every translation row it owns.
    async fn delete(&self, model: &ModelDefinition, id: i64) -> Result<bool>;

    /// All languages ordered by code.
    async fn languages(&self) -> Result<Vec<Language>>;

    /// Insert or update a language.
    async fn save_language(&self, language: &Language) -> Result<()>;

    /// Delete a language.
    ///
    /// Every translation in that language is deleted with it. This cannot be
    /// undone.
    async fn delete_language(&self, iso: &str) -> Result<bool>;

    /// All translatable fields ordered by content type and name.
    async fn translatable_fields(&self) -> Result<Vec<TranslatableField>>;

    /// Insert or update a translatable field. Returns true when inserted.
    async fn save_translatable_field(&self, field: &TranslatableField) -> Result<bool>;

    /// Delete a translatable field and all of its translations.
    async fn delete_translatable_field(&self, id: &str) -> Result<bool>;

    /// Translation rows owned by the given records.
    async fn translations_for(
        &self,
        content_type: &ContentType,
        object_ids: &[i64],
    ) -> Result<Vec<Translation>>;

    /// Insert or update a translation by its unique key.
    ///
    /// Fails with `UnknownLanguage` when its language does not exist.
    async fn upsert_translation(&self, translation: &Translation) -> Result<()>;
}

/// Id column of a stored row.
pub fn row_id(row: &Row) -> Option<i64> {
    row.get(crate::class::ID_FIELD).and_then(Value::as_i64)
}
