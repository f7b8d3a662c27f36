//! Model instances and the field access protocol.
//!
//! Every access dispatches on the live descriptor of the field in the
//! instance's class. A plain field reads and writes its column value. A
//! translated field reads and writes a [`TranslatableText`] held in the
//! instance's transient attribute map.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::backend::{Backend, Row, row_id};
use crate::class::{Capability, FieldDescriptor, ID_FIELD, ModelClass};
use crate::error::{Result, TofError};
use crate::locale::LocaleOracle;
use crate::models::{ContentType, Translation};
use crate::text::{LanguageSlot, TranslatableText};

/// Value read from a field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Column value of a plain field.
    Value(Value),
    /// Multi-language value of a translated field.
    Text(TranslatableText),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&TranslatableText> {
        match self {
            Self::Text(text) => Some(text),
            Self::Value(_) => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Text(_) => None,
        }
    }

    /// String shown for this value under `current`.
    pub fn display(&self, current: &str) -> String {
        match self {
            Self::Text(text) => text.to_display_string(current),
            Self::Value(Value::String(s)) => s.clone(),
            Self::Value(Value::Null) => String::new(),
            Self::Value(other) => other.to_string(),
        }
    }
}

/// Value assigned to a field.
#[derive(Debug, Clone, PartialEq)]
pub enum Assign {
    /// Replaces a translated field's whole text.
    Text(TranslatableText),
    Value(Value),
}

impl From<TranslatableText> for Assign {
    fn from(text: TranslatableText) -> Self {
        Self::Text(text)
    }
}

impl From<Value> for Assign {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<&str> for Assign {
    fn from(value: &str) -> Self {
        Self::Value(Value::String(value.to_string()))
    }
}

impl From<String> for Assign {
    fn from(value: String) -> Self {
        Self::Value(Value::String(value))
    }
}

impl From<i64> for Assign {
    fn from(value: i64) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<i32> for Assign {
    fn from(value: i32) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<f64> for Assign {
    fn from(value: f64) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<bool> for Assign {
    fn from(value: bool) -> Self {
        Self::Value(Value::Bool(value))
    }
}

/// String form of a value written into a text slot.
fn coerce_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// One record of a model class.
pub struct Instance {
    class: Arc<ModelClass>,
    locale: Arc<dyn LocaleOracle>,
    id: Option<i64>,
    values: Row,
    texts: HashMap<String, TranslatableText>,
    constructing: bool,
    prefetched: Vec<Translation>,
    translations_loaded: bool,
    annotations: Row,
}

impl Instance {
    /// Empty instance still under construction. Writes to translated fields
    /// go to the origin slot until [`finish_construction`](Self::finish_construction).
    pub fn constructing(class: Arc<ModelClass>, locale: Arc<dyn LocaleOracle>) -> Self {
        Self {
            class,
            locale,
            id: None,
            values: Row::new(),
            texts: HashMap::new(),
            constructing: true,
            prefetched: Vec::new(),
            translations_loaded: false,
            annotations: Row::new(),
        }
    }

    pub fn finish_construction(&mut self) {
        self.constructing = false;
    }

    /// New unsaved instance with the given initial values.
    pub fn new<K, V, I>(class: Arc<ModelClass>, locale: Arc<dyn LocaleOracle>, values: I) -> Result<Self>
    where
        K: AsRef<str>,
        V: Into<Assign>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut instance = Self::constructing(class, locale);
        for (field, value) in values {
            instance.set(field.as_ref(), value)?;
        }
        instance.finish_construction();
        Ok(instance)
    }

    /// Instance built from a stored row.
    ///
    /// Null columns are skipped. Keys that are not declared fields are kept
    /// as annotations. `prefetched` holds the translation rows of the record
    /// when the loading manager fetched them.
    pub fn from_row(
        class: Arc<ModelClass>,
        locale: Arc<dyn LocaleOracle>,
        row: Row,
        prefetched: Vec<Translation>,
    ) -> Result<Self> {
        let mut instance = Self::constructing(class, locale);
        instance.id = row_id(&row);
        for (column, value) in row {
            if column == ID_FIELD || value.is_null() {
                continue;
            }
            if instance.class.definition().get_field(&column).is_some() {
                instance.set(&column, Assign::Value(value))?;
            } else {
                instance.annotations.insert(column, value);
            }
        }
        instance.prefetched = prefetched;
        instance.finish_construction();
        Ok(instance)
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn class(&self) -> &Arc<ModelClass> {
        &self.class
    }

    pub fn content_type(&self) -> &ContentType {
        self.class.content_type()
    }

    pub fn is_constructing(&self) -> bool {
        self.constructing
    }

    /// Computed value selected with the row, such as an ordering annotation.
    pub fn annotation(&self, name: &str) -> Option<&Value> {
        self.annotations.get(name)
    }

    fn descriptor(&self, field: &str) -> Result<FieldDescriptor> {
        self.class
            .descriptor(field)
            .ok_or_else(|| TofError::unknown_field(self.content_type().to_string(), field))
    }

    /// Read a field.
    pub fn get(&mut self, field: &str) -> Result<FieldValue> {
        if field == ID_FIELD {
            return Ok(FieldValue::Value(self.id.map_or(Value::Null, Value::from)));
        }
        match self.descriptor(field)? {
            FieldDescriptor::Value => Ok(FieldValue::Value(self.plain_value(field))),
            FieldDescriptor::Translated { .. } => {
                if !self.constructing {
                    self.build_translations();
                    self.seed_origin(field);
                }
                Ok(FieldValue::Text(
                    self.texts.get(field).cloned().unwrap_or_default(),
                ))
            }
        }
    }

    /// Read a translated field's text. Fails for plain fields.
    pub fn text(&mut self, field: &str) -> Result<TranslatableText> {
        match self.get(field)? {
            FieldValue::Text(text) => Ok(text),
            FieldValue::Value(_) => Err(TofError::NotTranslatable(format!(
                "{}.{field}",
                self.content_type()
            ))),
        }
    }

    /// Write a field.
    ///
    /// For a translated field, a whole [`TranslatableText`] replaces the
    /// current one. Any other value is written as a string into the current
    /// language, or into the origin slot while constructing.
    pub fn set(&mut self, field: &str, value: impl Into<Assign>) -> Result<()> {
        let value = value.into();
        if field == ID_FIELD {
            return self.set_id(value);
        }
        match self.descriptor(field)? {
            FieldDescriptor::Value => {
                let value = match value {
                    Assign::Value(v) => v,
                    Assign::Text(text) => text
                        .origin()
                        .map_or(Value::Null, |origin| Value::String(origin.to_string())),
                };
                self.texts.remove(field);
                self.values.insert(field.to_string(), value);
            }
            FieldDescriptor::Translated { .. } => match value {
                Assign::Text(text) => {
                    self.texts.insert(field.to_string(), text);
                }
                Assign::Value(v) => {
                    let slot = if self.constructing {
                        LanguageSlot::Origin
                    } else {
                        self.build_translations();
                        self.seed_origin(field);
                        LanguageSlot::Language(self.locale.current_language())
                    };
                    self.texts
                        .entry(field.to_string())
                        .or_default()
                        .set(slot, coerce_text(&v));
                }
            },
        }
        Ok(())
    }

    fn set_id(&mut self, value: Assign) -> Result<()> {
        match value {
            Assign::Value(Value::Null) => self.id = None,
            Assign::Value(v) if v.as_i64().is_some() => self.id = v.as_i64(),
            _ => {
                return Err(TofError::Internal(anyhow::anyhow!(
                    "id of {} must be an integer",
                    self.content_type()
                )));
            }
        }
        Ok(())
    }

    /// Drop a field's in-memory value. Nothing is persisted until the next
    /// save.
    pub fn delete(&mut self, field: &str) -> Result<()> {
        match self.descriptor(field)? {
            FieldDescriptor::Value => {
                self.values.remove(field);
                self.texts.remove(field);
            }
            FieldDescriptor::Translated { .. } => {
                self.texts.remove(field);
            }
        }
        Ok(())
    }

    /// Field value as shown under the current language.
    pub fn display(&mut self, field: &str) -> Result<String> {
        let current = self.locale.current_language();
        Ok(self.get(field)?.display(&current))
    }

    /// Replay prefetched translation rows into the attribute map, once.
    fn build_translations(&mut self) {
        if self.translations_loaded {
            return;
        }
        self.translations_loaded = true;
        let rows = std::mem::take(&mut self.prefetched);
        for row in &rows {
            let field = row.field_name().to_string();
            self.seed_origin(&field);
            self.texts
                .entry(field)
                .or_default()
                .set(LanguageSlot::language(row.lang.as_str()), row.value.as_str());
        }
        self.prefetched = rows;
    }

    /// Give a translated field without an entry its column value as origin.
    fn seed_origin(&mut self, field: &str) {
        if self.texts.contains_key(field) {
            return;
        }
        if let Some(raw) = self.values.get(field).filter(|v| !v.is_null()) {
            let text = TranslatableText::with_origin(coerce_text(raw));
            self.texts.insert(field.to_string(), text);
        }
    }

    /// Fetch this record's translation rows unless the mapping is already
    /// built.
    pub async fn load_translations(&mut self, backend: &dyn Backend) -> Result<()> {
        let Some(id) = self.id else {
            return Ok(());
        };
        if self.translations_loaded {
            return Ok(());
        }
        self.prefetched = backend
            .translations_for(self.class.content_type(), &[id])
            .await?;
        Ok(())
    }

    /// Column value of a field: the origin of its text when one is held,
    /// the raw column value otherwise.
    ///
    /// A text survives the field's deactivation, so plain reads still see
    /// the origin written while the field was translated.
    fn plain_value(&self, field: &str) -> Value {
        self.texts
            .get(field)
            .and_then(TranslatableText::origin)
            .map(|origin| Value::String(origin.to_string()))
            .or_else(|| self.values.get(field).cloned())
            .unwrap_or(Value::Null)
    }

    /// Column values written by `save`.
    fn column_values(&self) -> Row {
        self.class
            .definition()
            .fields
            .iter()
            .map(|field| (field.name.clone(), self.plain_value(&field.name)))
            .collect()
    }

    /// Write the record, then its translations.
    ///
    /// Inserts when the instance has no id yet, updates otherwise. When the
    /// class carries translations, one row per language held in memory is
    /// upserted for each translated field. Origin values never reach the
    /// translation table.
    pub async fn save(&mut self, backend: &dyn Backend) -> Result<i64> {
        let state = self.class.snapshot();
        let definition = self.class.definition();
        let row = self.column_values();

        let id = match self.id {
            Some(id) => {
                backend.update(definition, id, &row).await?;
                id
            }
            None => {
                let id = backend.insert(definition, &row).await?;
                self.id = Some(id);
                id
            }
        };

        if state.has_capability(Capability::Translations) {
            let mut pending = Vec::new();
            for field in state.translated_fields() {
                let Some(text) = self.texts.get(&field.name) else {
                    continue;
                };
                for (lang, value) in text.iter() {
                    pending.push(Translation {
                        content_type: field.content_type.clone(),
                        object_id: id,
                        field_id: field.id.clone(),
                        lang: lang.to_string(),
                        value: value.to_string(),
                    });
                }
            }
            for translation in &pending {
                backend.upsert_translation(translation).await?;
            }
            debug!(
                model = %self.content_type(),
                id,
                translations = pending.len(),
                "saved record"
            );
        }
        Ok(id)
    }

    /// Delete the record and its translation rows.
    pub async fn remove(&mut self, backend: &dyn Backend) -> Result<bool> {
        let Some(id) = self.id.take() else {
            return Ok(false);
        };
        backend.delete(self.class.definition(), id).await
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("model", self.content_type())
            .field("id", &self.id)
            .field("values", &self.values)
            .field("texts", &self.texts)
            .field("constructing", &self.constructing)
            .finish()
    }
}
