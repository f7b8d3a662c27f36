//! Error types.

use thiserror::Error;

/// Errors raised by tof.
#[derive(Debug, Error)]
pub enum TofError {
    #[error("unknown model type '{0}'")]
    UnknownModel(String),

    /// A field name that the model type does not declare.
    #[error("unknown field '{field}' on '{model}'")]
    UnknownField { model: String, field: String },

    #[error("unsupported lookup '{0}'")]
    UnsupportedLookup(String),

    #[error("unknown language '{0}'")]
    UnknownLanguage(String),

    #[error("invalid language code: {0}")]
    InvalidLanguage(String),

    #[error("invalid content type '{0}': expected 'app_label.model'")]
    InvalidContentType(String),

    #[error("'{0}' cannot hold translatable fields")]
    NotTranslatable(String),

    #[error("{0} matching query does not exist")]
    NotFound(String),

    #[error("get() returned more than one {model} ({count} rows)")]
    MultipleObjectsReturned { model: String, count: usize },

    /// Translation tables are not installed yet (fresh database).
    #[error("translation tables are missing; run migrations first")]
    SchemaMissing,

    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl TofError {
    pub(crate) fn unknown_field(model: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownField {
            model: model.into(),
            field: field.into(),
        }
    }
}

/// Result type alias using TofError.
pub type Result<T> = std::result::Result<T, TofError>;
