//! tof test utilities.
//!
//! Fixtures for integration testing: model definitions, a tof handle backed
//! by [`MemoryBackend`], and seeded languages.

use std::sync::Arc;

use serde_json::Value;
use tof::class::FieldKind;
use tof::{ContentType, Instance, MemoryBackend, ModelDefinition, ModelRegistry, Settings, Tof};

/// Languages created by [`TestTof::seeded`].
pub const LANGUAGES: &[&str] = &["en", "fr", "de"];

/// `shop.product`: title, description, price.
pub fn product_type() -> ContentType {
    ContentType::new("shop", "product")
}

/// `blog.post`: title, body.
pub fn post_type() -> ContentType {
    ContentType::new("blog", "post")
}

pub fn product_definition() -> ModelDefinition {
    ModelDefinition::new(product_type())
        .field("title", FieldKind::Text)
        .field("description", FieldKind::Text)
        .field("price", FieldKind::Integer)
}

pub fn post_definition() -> ModelDefinition {
    ModelDefinition::new(post_type())
        .field("title", FieldKind::Text)
        .field("body", FieldKind::Text)
}

/// Registry holding the product and post model types.
pub fn registry() -> ModelRegistry {
    let registry = ModelRegistry::new();
    registry.register(product_definition());
    registry.register(post_definition());
    registry
}

/// A tof handle together with its in-memory backend.
#[derive(Debug, Clone)]
pub struct TestTof {
    pub tof: Tof,
    pub backend: Arc<MemoryBackend>,
}

impl TestTof {
    /// Fresh handle with default settings and no languages.
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self::with_backend(Arc::new(MemoryBackend::new()), settings)
    }

    pub fn with_backend(backend: Arc<MemoryBackend>, settings: Settings) -> Self {
        let tof = Tof::new(backend.clone(), registry(), settings);
        Self { tof, backend }
    }

    /// Handle with [`LANGUAGES`] created.
    pub async fn seeded() -> Self {
        Self::seeded_with(Settings::default()).await
    }

    pub async fn seeded_with(settings: Settings) -> Self {
        let app = Self::with_settings(settings);
        for iso in LANGUAGES {
            app.tof
                .add_language(iso)
                .await
                .unwrap_or_else(|e| panic!("failed to add language {iso}: {e}"));
        }
        app
    }

    /// Mark `field` of `shop.product` translatable.
    pub async fn translate_product(&self, field: &str) {
        self.tof
            .add_translatable_field(&product_type(), field, "")
            .await
            .unwrap_or_else(|e| panic!("failed to translate shop.product.{field}: {e}"));
    }

    /// Save a product through the default manager.
    pub async fn create_product(&self, title: &str, price: i64) -> Instance {
        let manager = self
            .tof
            .objects(&product_type())
            .unwrap_or_else(|e| panic!("shop.product not registered: {e}"));
        manager
            .create([
                ("title", Value::from(title)),
                ("price", Value::from(price)),
            ])
            .await
            .unwrap_or_else(|e| panic!("failed to create product {title}: {e}"))
    }
}

impl Default for TestTof {
    fn default() -> Self {
        Self::new()
    }
}

/// Ids of instances, in order.
pub fn ids(instances: &[Instance]) -> Vec<i64> {
    instances.iter().filter_map(Instance::id).collect()
}
