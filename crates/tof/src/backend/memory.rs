//! In-memory backend.
//!
//! Evaluates logical queries in process. Used by tests and by hosts that
//! embed tof without a database.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tracing::debug;

use super::{Backend, Row};
use crate::class::{ID_FIELD, ModelDefinition};
use crate::error::{Result, TofError};
use crate::models::{ContentType, Language, TranslatableField, Translation};
use crate::query::eval::{Matcher, resolve_subqueries};
use crate::query::{AnnotationExpr, QuerySpec, Subquery};

/// Backend holding every table in memory.
#[derive(Debug)]
pub struct MemoryBackend {
    store: Mutex<Store>,
}

#[derive(Debug, Default)]
struct Store {
    schema_installed: bool,
    tables: HashMap<String, Table>,
    languages: BTreeMap<String, Language>,
    fields: BTreeMap<String, TranslatableField>,
    translations: Vec<Translation>,
}

#[derive(Debug, Default)]
struct Table {
    next_id: i64,
    rows: BTreeMap<i64, Row>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Backend with tof's tables installed.
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store {
                schema_installed: true,
                ..Store::default()
            }),
        }
    }

    /// Backend of a fresh database where tof's tables do not exist yet.
    pub fn uninitialized() -> Self {
        Self {
            store: Mutex::new(Store::default()),
        }
    }

    /// Create tof's tables.
    pub fn install_schema(&self) {
        self.store.lock().schema_installed = true;
    }

    /// Number of stored translation rows.
    pub fn translation_count(&self) -> usize {
        self.store.lock().translations.len()
    }
}

impl Store {
    fn require_schema(&self) -> Result<()> {
        if self.schema_installed {
            Ok(())
        } else {
            Err(TofError::SchemaMissing)
        }
    }

    fn subquery_ids(&self, sub: &Subquery) -> Result<Vec<i64>> {
        self.require_schema()?;
        let is_column = |c: &str| matches!(c, "value" | "lang" | "object_id" | "field_id");
        let matcher = Matcher::new("tof.translation", &is_column);
        let filter = resolve_subqueries(&sub.filter, &mut |inner| self.subquery_ids(inner))?;

        let mut ids = Vec::new();
        let mut seen = HashSet::new();
        for translation in self.translations.iter().filter(|t| t.field_id == sub.field_id) {
            let row = translation_row(translation);
            if matcher.matches(&filter, &row)? && seen.insert(translation.object_id) {
                ids.push(translation.object_id);
            }
        }
        Ok(ids)
    }

    fn annotation_value(&self, model: &ModelDefinition, id: i64, expr: &AnnotationExpr) -> Value {
        match expr {
            AnnotationExpr::TranslatedValue { field_id, lang } => self
                .translations
                .iter()
                .find(|t| {
                    t.content_type == model.content_type
                        && t.object_id == id
                        && t.field_id == *field_id
                        && t.lang == *lang
                })
                .map_or(Value::Null, |t| Value::String(t.value.clone())),
        }
    }

    fn matching_rows(&self, model: &ModelDefinition, spec: &QuerySpec) -> Result<Vec<Row>> {
        let Some(table) = self.tables.get(&model.table) else {
            return Ok(Vec::new());
        };

        let filters = spec
            .filters
            .iter()
            .map(|f| resolve_subqueries(f, &mut |sub| self.subquery_ids(sub)))
            .collect::<Result<Vec<_>>>()?;
        let has_column =
            |c: &str| model.has_field(c) || spec.annotation(c).is_some();
        let model_name = model.content_type.to_string();
        let matcher = Matcher::new(&model_name, &has_column);

        let mut rows = Vec::new();
        for (id, stored) in &table.rows {
            let mut row = stored.clone();
            for annotation in &spec.annotations {
                row.insert(
                    annotation.name.clone(),
                    self.annotation_value(model, *id, &annotation.expr),
                );
            }
            let mut keep = true;
            for filter in &filters {
                if !matcher.matches(filter, &row)? {
                    keep = false;
                    break;
                }
            }
            if keep {
                rows.push(row);
            }
        }
        matcher.sort(&mut rows, &spec.ordering)?;
        Ok(rows)
    }
}

fn translation_row(translation: &Translation) -> Row {
    let value = json!({
        "object_id": translation.object_id,
        "field_id": translation.field_id,
        "lang": translation.lang,
        "value": translation.value,
    });
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}

fn check_columns(model: &ModelDefinition, values: &Row) -> Result<()> {
    for column in values.keys() {
        if column == ID_FIELD || !model.has_field(column) {
            return Err(TofError::unknown_field(model.content_type.to_string(), column));
        }
    }
    Ok(())
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn schema_ready(&self) -> Result<bool> {
        Ok(self.store.lock().schema_installed)
    }

    async fn select(&self, model: &ModelDefinition, spec: &QuerySpec) -> Result<Vec<Row>> {
        let store = self.store.lock();
        let rows = store.matching_rows(model, spec)?;
        let offset = spec.offset.unwrap_or(0);
        let limit = spec.limit.unwrap_or(usize::MAX);
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(&self, model: &ModelDefinition, spec: &QuerySpec) -> Result<usize> {
        let store = self.store.lock();
        Ok(store.matching_rows(model, &spec.unsliced())?.len())
    }

    async fn insert(&self, model: &ModelDefinition, values: &Row) -> Result<i64> {
        check_columns(model, values)?;
        let mut store = self.store.lock();
        let table = store.tables.entry(model.table.clone()).or_default();
        table.next_id += 1;
        let id = table.next_id;

        let mut row = Row::new();
        row.insert(ID_FIELD.to_string(), Value::from(id));
        for field in &model.fields {
            row.insert(
                field.name.clone(),
                values.get(&field.name).cloned().unwrap_or(Value::Null),
            );
        }
        table.rows.insert(id, row);
        debug!(model = %model.content_type, id, "inserted row");
        Ok(id)
    }

    async fn update(&self, model: &ModelDefinition, id: i64, values: &Row) -> Result<()> {
        check_columns(model, values)?;
        let mut store = self.store.lock();
        let row = store
            .tables
            .get_mut(&model.table)
            .and_then(|t| t.rows.get_mut(&id))
            .ok_or_else(|| TofError::NotFound(format!("{} {id}", model.content_type)))?;
        for (column, value) in values {
            row.insert(column.clone(), value.clone());
        }
        Ok(())
    }

    async fn delete(&self, model: &ModelDefinition, id: i64) -> Result<bool> {
        let mut store = self.store.lock();
        let removed = store
            .tables
            .get_mut(&model.table)
            .and_then(|t| t.rows.remove(&id))
            .is_some();
        if removed {
            store
                .translations
                .retain(|t| !(t.content_type == model.content_type && t.object_id == id));
        }
        Ok(removed)
    }

    async fn languages(&self) -> Result<Vec<Language>> {
        let store = self.store.lock();
        store.require_schema()?;
        Ok(store.languages.values().cloned().collect())
    }

    async fn save_language(&self, language: &Language) -> Result<()> {
        let mut store = self.store.lock();
        store.require_schema()?;
        store
            .languages
            .insert(language.iso.clone(), language.clone());
        Ok(())
    }

    async fn delete_language(&self, iso: &str) -> Result<bool> {
        let mut store = self.store.lock();
        store.require_schema()?;
        let removed = store.languages.remove(iso).is_some();
        if removed {
            store.translations.retain(|t| t.lang != iso);
        }
        Ok(removed)
    }

    async fn translatable_fields(&self) -> Result<Vec<TranslatableField>> {
        let store = self.store.lock();
        store.require_schema()?;
        let mut fields: Vec<_> = store.fields.values().cloned().collect();
        fields.sort_by(|a, b| {
            (&a.content_type, &a.name).cmp(&(&b.content_type, &b.name))
        });
        Ok(fields)
    }

    async fn save_translatable_field(&self, field: &TranslatableField) -> Result<bool> {
        let mut store = self.store.lock();
        store.require_schema()?;
        Ok(store
            .fields
            .insert(field.id.clone(), field.clone())
            .is_none())
    }

    async fn delete_translatable_field(&self, id: &str) -> Result<bool> {
        let mut store = self.store.lock();
        store.require_schema()?;
        let removed = store.fields.remove(id).is_some();
        if removed {
            store.translations.retain(|t| t.field_id != id);
        }
        Ok(removed)
    }

    async fn translations_for(
        &self,
        content_type: &ContentType,
        object_ids: &[i64],
    ) -> Result<Vec<Translation>> {
        let store = self.store.lock();
        store.require_schema()?;
        let ids: HashSet<i64> = object_ids.iter().copied().collect();
        Ok(store
            .translations
            .iter()
            .filter(|t| t.content_type == *content_type && ids.contains(&t.object_id))
            .cloned()
            .collect())
    }

    async fn upsert_translation(&self, translation: &Translation) -> Result<()> {
        let mut store = self.store.lock();
        store.require_schema()?;
        if !store.languages.contains_key(&translation.lang) {
            return Err(TofError::UnknownLanguage(translation.lang.clone()));
        }
        if !store.fields.contains_key(&translation.field_id) {
            return Err(TofError::Internal(anyhow::anyhow!(
                "translatable field {} does not exist",
                translation.field_id
            )));
        }
        match store
            .translations
            .iter_mut()
            .find(|t| t.same_key(translation))
        {
            Some(existing) => existing.value = translation.value.clone(),
            None => store.translations.push(translation.clone()),
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::backend::row_id;
    use crate::class::FieldKind;
    use crate::query::Filter;

    fn product() -> ModelDefinition {
        ModelDefinition::new(ContentType::new("shop", "product"))
            .field("title", FieldKind::Text)
            .field("price", FieldKind::Integer)
    }

    fn values(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    fn translation(id: i64, lang: &str, value: &str) -> Translation {
        Translation {
            content_type: ContentType::new("shop", "product"),
            object_id: id,
            field_id: "shop.product.title".to_string(),
            lang: lang.to_string(),
            value: value.to_string(),
        }
    }

    async fn seeded() -> MemoryBackend {
        let backend = MemoryBackend::new();
        backend.save_language(&Language::new("en").unwrap()).await.unwrap();
        backend.save_language(&Language::new("fr").unwrap()).await.unwrap();
        let field =
            TranslatableField::new(ContentType::new("shop", "product"), "title", "Title").unwrap();
        backend.save_translatable_field(&field).await.unwrap();
        backend
    }

    #[tokio::test]
    async fn insert_fills_missing_columns_with_null() {
        let backend = MemoryBackend::new();
        let model = product();
        let id = backend
            .insert(&model, &values(json!({ "title": "Hat" })))
            .await
            .unwrap();

        let rows = backend.select(&model, &QuerySpec::default()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(row_id(&rows[0]), Some(id));
        assert_eq!(rows[0]["price"], Value::Null);
    }

    #[tokio::test]
    async fn unknown_column_rejected() {
        let backend = MemoryBackend::new();
        let err = backend
            .insert(&product(), &values(json!({ "colour": "red" })))
            .await;
        assert!(matches!(err, Err(TofError::UnknownField { .. })));
    }

    #[tokio::test]
    async fn upsert_replaces_by_key() {
        let backend = seeded().await;
        backend.upsert_translation(&translation(1, "fr", "Chapeau")).await.unwrap();
        backend.upsert_translation(&translation(1, "fr", "Bonnet")).await.unwrap();

        let rows = backend
            .translations_for(&ContentType::new("shop", "product"), &[1])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, "Bonnet");
    }

    #[tokio::test]
    async fn upsert_requires_language() {
        let backend = seeded().await;
        let err = backend.upsert_translation(&translation(1, "de", "Hut")).await;
        assert!(matches!(err, Err(TofError::UnknownLanguage(l)) if l == "de"));
    }

    #[tokio::test]
    async fn deleting_language_cascades() {
        let backend = seeded().await;
        backend.upsert_translation(&translation(1, "fr", "Chapeau")).await.unwrap();
        backend.upsert_translation(&translation(1, "en", "Hat")).await.unwrap();

        assert!(backend.delete_language("fr").await.unwrap());
        assert_eq!(backend.translation_count(), 1);
    }

    #[tokio::test]
    async fn subquery_selects_owner_ids() {
        let backend = seeded().await;
        let model = product();
        let a = backend.insert(&model, &values(json!({ "title": "Hat" }))).await.unwrap();
        let b = backend.insert(&model, &values(json!({ "title": "Cap" }))).await.unwrap();
        backend.upsert_translation(&translation(a, "fr", "Chapeau")).await.unwrap();
        backend.upsert_translation(&translation(b, "fr", "Casquette")).await.unwrap();

        let spec = QuerySpec {
            filters: vec![Filter::leaf(
                "id__in",
                Subquery {
                    field_id: "shop.product.title".to_string(),
                    filter: Filter::leaf("value__startswith", "Chap"),
                },
            )],
            ..QuerySpec::default()
        };
        let rows = backend.select(&model, &spec).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(row_id(&rows[0]), Some(a));
    }

    #[tokio::test]
    async fn missing_schema_reported() {
        let backend = MemoryBackend::uninitialized();
        assert!(!backend.schema_ready().await.unwrap());
        assert!(matches!(backend.languages().await, Err(TofError::SchemaMissing)));

        backend.install_schema();
        assert!(backend.schema_ready().await.unwrap());
    }
}
