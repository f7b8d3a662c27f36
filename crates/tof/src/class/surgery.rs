//! Activation and deactivation of translatable fields on live classes.
//!
//! Each step inspects the actual class state before changing it, so both
//! directions are idempotent and a full activate/deactivate cycle restores
//! the class exactly.

use tracing::{debug, info};

use super::model_class::{
    Capability, ClassState, DEFAULT_MANAGER, FieldDescriptor, ManagerKind, ModelClass,
    ORIGIN_MANAGER, TRANSLATION_MANAGER,
};
use crate::error::{Result, TofError};
use crate::models::TranslatableField;

/// Make `field` translatable on `class`.
///
/// With `change_default_manager` the translation-aware manager replaces the
/// default manager and the original stays reachable as `objects_origin`.
/// Without it the translation-aware manager is only bound as
/// `trans_objects`. Returns `false` when the field was already active.
pub fn activate(
    class: &ModelClass,
    field: &TranslatableField,
    change_default_manager: bool,
) -> Result<bool> {
    if field.content_type != *class.content_type() {
        return Err(TofError::Internal(anyhow::anyhow!(
            "translatable field {} does not belong to {}",
            field.id,
            class.content_type()
        )));
    }
    if !class.content_type().accepts_translations() {
        return Err(TofError::NotTranslatable(class.content_type().to_string()));
    }
    if class.definition().get_field(&field.name).is_none() {
        return Err(TofError::unknown_field(
            class.content_type().to_string(),
            &field.name,
        ));
    }

    let changed = class.transition(|state| {
        let mut changed = inject_capability(state);
        changed |= install_managers(state, change_default_manager);
        changed |= replace_descriptor(state, field);
        Ok(changed)
    })?;

    if changed {
        info!(model = %class.content_type(), field = %field.name, "activated translatable field");
    } else {
        debug!(model = %class.content_type(), field = %field.name, "field already translatable");
    }
    Ok(changed)
}

/// Undo the activation of `field_name` on `class`.
///
/// When the last translated field goes, the capability and the managers
/// installed by activation are removed as well. Returns `false` when the
/// field was not active.
pub fn deactivate(class: &ModelClass, field_name: &str) -> Result<bool> {
    let changed = class.transition(|state| {
        if !restore_descriptor(state, field_name) {
            return Ok(false);
        }
        if state.translated_fields().next().is_none() {
            state.bases.retain(|c| *c != Capability::Translations);
            restore_managers(state);
        }
        Ok(true)
    })?;

    if changed {
        info!(model = %class.content_type(), field = %field_name, "deactivated translatable field");
    } else {
        debug!(model = %class.content_type(), field = %field_name, "field was not translatable");
    }
    Ok(changed)
}

fn inject_capability(state: &mut ClassState) -> bool {
    if state.has_capability(Capability::Translations) {
        return false;
    }
    state.bases.insert(0, Capability::Translations);
    true
}

fn install_managers(state: &mut ClassState, change_default_manager: bool) -> bool {
    let current = state.default_manager_kind();
    if change_default_manager {
        if current.is_translation_aware() {
            return false;
        }
        let translation = ManagerKind::translation_over(current.clone());
        state
            .managers
            .insert(ORIGIN_MANAGER.to_string(), current);
        state
            .managers
            .insert(TRANSLATION_MANAGER.to_string(), translation.clone());
        state
            .managers
            .insert(DEFAULT_MANAGER.to_string(), translation);
        state.default_manager = TRANSLATION_MANAGER.to_string();
        true
    } else {
        let bound = state.managers.values().any(ManagerKind::is_translation_aware);
        if bound {
            return false;
        }
        state.managers.insert(
            TRANSLATION_MANAGER.to_string(),
            ManagerKind::translation_over(current),
        );
        true
    }
}

fn replace_descriptor(state: &mut ClassState, field: &TranslatableField) -> bool {
    let Some(descriptor) = state.descriptors.get_mut(&field.name) else {
        return false;
    };
    if descriptor.is_translated() {
        return false;
    }
    let original = std::mem::replace(descriptor, FieldDescriptor::Value);
    *descriptor = FieldDescriptor::Translated {
        field: field.clone(),
        original: Box::new(original),
    };
    true
}

fn restore_descriptor(state: &mut ClassState, field_name: &str) -> bool {
    let Some(descriptor) = state.descriptors.get_mut(field_name) else {
        return false;
    };
    match std::mem::replace(descriptor, FieldDescriptor::Value) {
        FieldDescriptor::Translated { original, .. } => {
            *descriptor = *original;
            true
        }
        plain => {
            *descriptor = plain;
            false
        }
    }
}

fn restore_managers(state: &mut ClassState) {
    if let Some(origin) = state.managers.remove(ORIGIN_MANAGER) {
        state.managers.insert(DEFAULT_MANAGER.to_string(), origin);
        state.default_manager = DEFAULT_MANAGER.to_string();
    }
    if state
        .managers
        .get(TRANSLATION_MANAGER)
        .is_some_and(ManagerKind::is_translation_aware)
    {
        state.managers.remove(TRANSLATION_MANAGER);
    }
}
