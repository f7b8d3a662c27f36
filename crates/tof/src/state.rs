//! Shared tof handle.

use std::sync::Arc;

use tracing::info;

use crate::backend::Backend;
use crate::bootstrap::{self, BootstrapReport};
use crate::class::{ModelClass, ModelDefinition, ModelRegistry, activate, deactivate};
use crate::config::Settings;
use crate::error::{Result, TofError};
use crate::instance::{Assign, Instance};
use crate::locale::{LocaleOracle, ThreadLocale};
use crate::manager::Manager;
use crate::models::{ContentType, Language, TranslatableField};

/// Shared tof state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct Tof {
    inner: Arc<TofInner>,
}

struct TofInner {
    backend: Arc<dyn Backend>,
    registry: ModelRegistry,
    settings: Settings,
    locale: Arc<dyn LocaleOracle>,
}

impl Tof {
    /// Handle reading the current language from [`ThreadLocale`].
    pub fn new(backend: Arc<dyn Backend>, registry: ModelRegistry, settings: Settings) -> Self {
        let locale = Arc::new(ThreadLocale::new(settings.default_language.clone()));
        Self::with_locale(backend, registry, settings, locale)
    }

    pub fn with_locale(
        backend: Arc<dyn Backend>,
        registry: ModelRegistry,
        settings: Settings,
        locale: Arc<dyn LocaleOracle>,
    ) -> Self {
        Self {
            inner: Arc::new(TofInner {
                backend,
                registry,
                settings,
                locale,
            }),
        }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.inner.backend
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.inner.registry
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub fn locale(&self) -> Arc<dyn LocaleOracle> {
        Arc::clone(&self.inner.locale)
    }

    pub fn current_language(&self) -> String {
        self.inner.locale.current_language()
    }

    /// Register a model type. See [`ModelRegistry::register`].
    pub fn register(&self, definition: ModelDefinition) -> Arc<ModelClass> {
        self.inner.registry.register(definition)
    }

    pub fn class(&self, content_type: &ContentType) -> Result<Arc<ModelClass>> {
        self.inner.registry.require(content_type)
    }

    /// The class's current default manager.
    pub fn objects(&self, content_type: &ContentType) -> Result<Manager> {
        let class = self.class(content_type)?;
        let state = class.snapshot();
        let kind = state.default_manager_kind();
        Ok(Manager::new(self.clone(), class, state.default_manager, kind))
    }

    /// A manager bound under `name`, such as `objects_origin`.
    pub fn manager(&self, content_type: &ContentType, name: &str) -> Result<Manager> {
        let class = self.class(content_type)?;
        let kind = class
            .snapshot()
            .manager(name)
            .cloned()
            .ok_or_else(|| TofError::NotFound(format!("manager '{name}' on {content_type}")))?;
        Ok(Manager::new(self.clone(), class, name.to_string(), kind))
    }

    /// Unsaved instance of `content_type`.
    pub fn instance<K, V, I>(&self, content_type: &ContentType, values: I) -> Result<Instance>
    where
        K: AsRef<str>,
        V: Into<Assign>,
        I: IntoIterator<Item = (K, V)>,
    {
        Instance::new(self.class(content_type)?, self.locale(), values)
    }

    /// Mark `name` on `content_type` translatable: persist the record, then
    /// activate it on the live class. Repeating the call changes nothing.
    pub async fn add_translatable_field(
        &self,
        content_type: &ContentType,
        name: &str,
        title: &str,
    ) -> Result<TranslatableField> {
        let field = TranslatableField::new(content_type.clone(), name, title)?;
        let class = self.class(content_type)?;
        class.definition().check_field(&field.name)?;

        let created = self.inner.backend.save_translatable_field(&field).await?;
        activate(&class, &field, self.inner.settings.change_default_manager)?;
        if created {
            info!(field = %field.id, title = %field.title, "translatable field created");
        }
        Ok(field)
    }

    /// Unmark `name` on `content_type`: deactivate it on the live class,
    /// then delete the record and every translation stored for it.
    pub async fn remove_translatable_field(
        &self,
        content_type: &ContentType,
        name: &str,
    ) -> Result<bool> {
        if let Some(class) = self.inner.registry.get(content_type) {
            deactivate(&class, name)?;
        }
        let id = TranslatableField::derive_id(content_type, name);
        let removed = self.inner.backend.delete_translatable_field(&id).await?;
        if removed {
            info!(field = %id, "translatable field removed");
        }
        Ok(removed)
    }

    pub async fn translatable_fields(&self) -> Result<Vec<TranslatableField>> {
        self.inner.backend.translatable_fields().await
    }

    /// Create or reactivate a language.
    pub async fn add_language(&self, iso: &str) -> Result<Language> {
        let language = Language::new(iso)?;
        self.inner.backend.save_language(&language).await?;
        info!(language = %language.iso, "language saved");
        Ok(language)
    }

    /// Delete a language.
    ///
    /// Every translation stored in that language is deleted with it, for
    /// every model type. This cannot be undone.
    pub async fn remove_language(&self, iso: &str) -> Result<bool> {
        let removed = self.inner.backend.delete_language(iso).await?;
        if removed {
            info!(language = %iso, "language removed with its translations");
        }
        Ok(removed)
    }

    pub async fn languages(&self) -> Result<Vec<Language>> {
        self.inner.backend.languages().await
    }

    /// Startup hook. See [`bootstrap::ready`].
    pub async fn ready<S: AsRef<str>>(&self, args: &[S]) -> Result<BootstrapReport> {
        bootstrap::ready(self, args).await
    }
}

impl std::fmt::Debug for Tof {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tof")
            .field("registry", &self.inner.registry)
            .field("settings", &self.inner.settings)
            .finish()
    }
}
