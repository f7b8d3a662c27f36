//! Model class registry.
//!
//! Process-wide table of live classes keyed by content type. Every holder of
//! a class shares the same `Arc`, so surgery on a class is seen everywhere.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use dashmap::DashMap;
use tracing::{debug, info};

use super::definition::{DefinitionFile, ModelDefinition};
use super::model_class::ModelClass;
use crate::error::{Result, TofError};
use crate::models::ContentType;

/// Registry of model classes.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    inner: Arc<ModelRegistryInner>,
}

#[derive(Default)]
struct ModelRegistryInner {
    classes: DashMap<ContentType, Arc<ModelClass>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `[[model]]` tables and register every definition.
    pub fn from_toml(source: &str) -> Result<Self> {
        let registry = Self::new();
        registry.register_toml(source)?;
        Ok(registry)
    }

    /// Read a definition file and register every model in it.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read model definitions from {}", path.display()))?;
        let count = self.register_toml(&source)?;
        info!(path = %path.display(), count, "loaded model definitions");
        Ok(count)
    }

    fn register_toml(&self, source: &str) -> Result<usize> {
        let file: DefinitionFile =
            toml::from_str(source).context("failed to parse model definitions")?;
        let count = file.models.len();
        for definition in file.models {
            self.register(definition);
        }
        Ok(count)
    }

    /// Register a model type and return its live class.
    ///
    /// A content type registered twice keeps its existing class, including
    /// any activations already applied to it.
    pub fn register(&self, definition: ModelDefinition) -> Arc<ModelClass> {
        let content_type = definition.content_type.clone();
        let class = self
            .inner
            .classes
            .entry(content_type.clone())
            .or_insert_with(|| {
                debug!(model = %content_type, table = %definition.table, "registered model");
                Arc::new(ModelClass::new(definition))
            });
        Arc::clone(class.value())
    }

    pub fn get(&self, content_type: &ContentType) -> Option<Arc<ModelClass>> {
        self.inner
            .classes
            .get(content_type)
            .map(|c| Arc::clone(c.value()))
    }

    /// Like [`get`](Self::get) but fails with `UnknownModel`.
    pub fn require(&self, content_type: &ContentType) -> Result<Arc<ModelClass>> {
        self.get(content_type)
            .ok_or_else(|| TofError::UnknownModel(content_type.to_string()))
    }

    /// All registered classes, ordered by content type.
    pub fn classes(&self) -> Vec<Arc<ModelClass>> {
        let mut classes: Vec<_> = self
            .inner
            .classes
            .iter()
            .map(|c| Arc::clone(c.value()))
            .collect();
        classes.sort_by(|a, b| a.content_type().cmp(b.content_type()));
        classes
    }

    pub fn len(&self) -> usize {
        self.inner.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.classes.is_empty()
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("classes", &self.inner.classes.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::class::FieldKind;

    #[test]
    fn register_twice_keeps_live_class() {
        let registry = ModelRegistry::new();
        let ct = ContentType::new("shop", "product");
        let first = registry.register(ModelDefinition::new(ct.clone()).field("title", FieldKind::Text));
        let second = registry.register(ModelDefinition::new(ct.clone()));

        assert!(Arc::ptr_eq(&first, &second));
        assert!(second.definition().has_field("title"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn require_unknown_model_fails() {
        let registry = ModelRegistry::new();
        let err = registry.require(&ContentType::new("shop", "missing"));
        assert!(matches!(err, Err(TofError::UnknownModel(_))));
    }

    #[test]
    fn from_toml_registers_in_order() {
        let registry = ModelRegistry::from_toml(
            r#"
            [[model]]
            app_label = "shop"
            model = "product"
            fields = [{ name = "title" }]

            [[model]]
            app_label = "blog"
            model = "post"
            fields = [{ name = "body" }]
            "#,
        )
        .unwrap();

        let names: Vec<String> = registry
            .classes()
            .iter()
            .map(|c| c.content_type().to_string())
            .collect();
        assert_eq!(names, vec!["blog.post", "shop.product"]);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(ModelRegistry::from_toml("[[model]]\napp_label = 3").is_err());
    }
}
