//! Live model classes.
//!
//! A [`ModelClass`] is the process-wide object behind one model type. Its
//! declared schema never changes, but its [`ClassState`] does: activation of
//! a translatable field injects a capability, swaps managers and replaces
//! the field's descriptor. Instances and managers read the state at the
//! moment they act, so a change is visible to every holder of the class.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use super::definition::ModelDefinition;
use crate::error::Result;
use crate::models::{ContentType, TranslatableField};

/// Manager bound as the default before any activation.
pub const DEFAULT_MANAGER: &str = "objects";
/// Name under which the translation-aware manager is bound.
pub const TRANSLATION_MANAGER: &str = "trans_objects";
/// Name keeping the untranslated manager reachable while it is replaced.
pub const ORIGIN_MANAGER: &str = "objects_origin";

/// Behaviour set injected into a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Reverse relation to translation rows, the on-save hook that persists
    /// per-language values, and the lazily built translation mapping.
    Translations,
}

/// How instance access to one field is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldDescriptor {
    /// Plain column value.
    Value,
    /// Value resolved through a [`TranslatableText`](crate::TranslatableText).
    Translated {
        field: TranslatableField,
        /// Descriptor to restore on deactivation.
        original: Box<FieldDescriptor>,
    },
}

impl FieldDescriptor {
    pub fn is_translated(&self) -> bool {
        matches!(self, Self::Translated { .. })
    }

    pub fn translatable_field(&self) -> Option<&TranslatableField> {
        match self {
            Self::Translated { field, .. } => Some(field),
            Self::Value => None,
        }
    }
}

/// Concrete manager type bound to a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerKind {
    /// Untranslated query semantics.
    Plain,
    /// Query rewriting layered over `base`.
    Translation { base: Box<ManagerKind> },
}

impl ManagerKind {
    pub fn is_translation_aware(&self) -> bool {
        matches!(self, Self::Translation { .. })
    }

    pub fn translation_over(base: ManagerKind) -> Self {
        Self::Translation {
            base: Box::new(base),
        }
    }
}

/// Mutable part of a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassState {
    /// Injected capabilities, most recent first.
    pub bases: Vec<Capability>,
    pub descriptors: BTreeMap<String, FieldDescriptor>,
    pub managers: BTreeMap<String, ManagerKind>,
    pub default_manager: String,
}

impl ClassState {
    fn initial(definition: &ModelDefinition) -> Self {
        Self {
            bases: Vec::new(),
            descriptors: definition
                .fields
                .iter()
                .map(|f| (f.name.clone(), FieldDescriptor::Value))
                .collect(),
            managers: BTreeMap::from([(DEFAULT_MANAGER.to_string(), ManagerKind::Plain)]),
            default_manager: DEFAULT_MANAGER.to_string(),
        }
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.bases.contains(&capability)
    }

    pub fn descriptor(&self, field: &str) -> Option<&FieldDescriptor> {
        self.descriptors.get(field)
    }

    pub fn is_translated(&self, field: &str) -> bool {
        self.descriptor(field)
            .is_some_and(FieldDescriptor::is_translated)
    }

    /// Translatable fields active on the class, in field-name order.
    pub fn translated_fields(&self) -> impl Iterator<Item = &TranslatableField> {
        self.descriptors
            .values()
            .filter_map(FieldDescriptor::translatable_field)
    }

    pub fn manager(&self, name: &str) -> Option<&ManagerKind> {
        self.managers.get(name)
    }

    /// Kind of the default manager. Falls back to plain if the binding is
    /// missing, which no transition produces.
    pub fn default_manager_kind(&self) -> ManagerKind {
        self.managers
            .get(&self.default_manager)
            .cloned()
            .unwrap_or(ManagerKind::Plain)
    }
}

/// Process-wide class object of one model type.
#[derive(Debug)]
pub struct ModelClass {
    definition: ModelDefinition,
    state: RwLock<ClassState>,
}

impl ModelClass {
    pub fn new(definition: ModelDefinition) -> Self {
        let state = ClassState::initial(&definition);
        Self {
            definition,
            state: RwLock::new(state),
        }
    }

    pub fn definition(&self) -> &ModelDefinition {
        &self.definition
    }

    pub fn content_type(&self) -> &ContentType {
        &self.definition.content_type
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> ClassState {
        self.state.read().clone()
    }

    pub fn descriptor(&self, field: &str) -> Option<FieldDescriptor> {
        self.state.read().descriptor(field).cloned()
    }

    /// The active translatable field named `field`, if any.
    pub fn translated_field(&self, field: &str) -> Option<TranslatableField> {
        self.state
            .read()
            .descriptor(field)
            .and_then(FieldDescriptor::translatable_field)
            .cloned()
    }

    pub fn translated_fields(&self) -> Vec<TranslatableField> {
        self.state.read().translated_fields().cloned().collect()
    }

    pub fn has_translations(&self) -> bool {
        self.state.read().has_capability(Capability::Translations)
    }

    /// Apply `change` to a copy of the state and commit it in one swap.
    ///
    /// If `change` fails the class keeps its previous state. The write lock
    /// is held for the whole step, so readers never see a partial state.
    pub(crate) fn transition<F>(&self, change: F) -> Result<bool>
    where
        F: FnOnce(&mut ClassState) -> Result<bool>,
    {
        let mut guard = self.state.write();
        let mut next = guard.clone();
        let changed = change(&mut next)?;
        if changed {
            *guard = next;
        }
        Ok(changed)
    }
}
