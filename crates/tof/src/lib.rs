//! Translatable object fields.
//!
//! Marks fields of existing model types translatable at runtime. Instances
//! then read and write those fields through a per-language
//! [`TranslatableText`], stored in a side table, and translation-aware
//! managers rewrite queries on them into subqueries against that table.
//!
//! The `tof` binary is the administration entry point.

pub mod backend;
pub mod bootstrap;
pub mod class;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod instance;
pub mod locale;
pub mod manager;
pub mod models;
pub mod query;
pub mod state;
pub mod text;

pub use backend::{Backend, MemoryBackend, PgBackend, Row};
pub use bootstrap::{BootstrapReport, SkipReason};
pub use class::{ModelClass, ModelDefinition, ModelRegistry};
pub use config::{FilterLanguage, Settings};
pub use error::{Result, TofError};
pub use instance::{Assign, FieldValue, Instance};
pub use locale::{FixedLocale, LocaleOracle, ThreadLocale};
pub use manager::{Manager, QuerySet};
pub use models::{ContentType, Language, TranslatableField, Translation};
pub use query::{Filter, OrderTerm};
pub use state::Tof;
pub use text::{LanguageSlot, TranslatableText};
