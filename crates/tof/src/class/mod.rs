//! Live model classes and the surgery that makes their fields translatable.

pub mod definition;
pub mod model_class;
pub mod registry;
pub mod surgery;

pub use definition::{FieldDefinition, FieldKind, ID_FIELD, ModelDefinition};
pub use model_class::{
    Capability, ClassState, DEFAULT_MANAGER, FieldDescriptor, ManagerKind, ModelClass,
    ORIGIN_MANAGER, TRANSLATION_MANAGER,
};
pub use registry::ModelRegistry;
pub use surgery::{activate, deactivate};
