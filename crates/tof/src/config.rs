//! Configuration loaded from environment variables.

use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};

/// Language scope applied when a filter targets a translated field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FilterLanguage {
    /// Match a translation in any language (`"__all__"`).
    All,
    /// Match the current language only (`"current"`).
    #[default]
    Current,
    /// Match one fixed language.
    Fixed(String),
    /// Match any language of a fixed set.
    AnyOf(Vec<String>),
    /// Languages to match keyed by the current language. Current languages
    /// missing from the table match the default language.
    PerLanguage(BTreeMap<String, Vec<String>>),
}

impl FromStr for FilterLanguage {
    type Err = anyhow::Error;

    /// Parse `__all__`, `current`, a bare code, a JSON array of codes, or a
    /// JSON object mapping a language to a code or an array of codes.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s {
            "" => bail!("filter language must not be empty"),
            "__all__" => return Ok(Self::All),
            "current" => return Ok(Self::Current),
            _ => {}
        }

        if !(s.starts_with('[') || s.starts_with('{')) {
            return Ok(Self::Fixed(s.to_string()));
        }

        let value: serde_json::Value =
            serde_json::from_str(s).context("filter language is not valid JSON")?;
        match value {
            serde_json::Value::Array(items) => Ok(Self::AnyOf(string_list(&items)?)),
            serde_json::Value::Object(map) => {
                let mut table = BTreeMap::new();
                for (lang, codes) in map {
                    let codes = match codes {
                        serde_json::Value::String(code) => vec![code],
                        serde_json::Value::Array(items) => string_list(&items)?,
                        other => bail!("filter language for '{lang}' must be a code or a list, got {other}"),
                    };
                    table.insert(lang, codes);
                }
                Ok(Self::PerLanguage(table))
            }
            other => bail!("unsupported filter language {other}"),
        }
    }
}

fn string_list(items: &[serde_json::Value]) -> Result<Vec<String>> {
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .with_context(|| format!("expected a language code, got {item}"))
        })
        .collect()
}

/// Translation behaviour settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Fallback language code (default: en).
    pub default_language: String,

    /// Language scope for filters on translated fields (default: current).
    pub default_filter_language: FilterLanguage,

    /// Whether activation replaces the default manager (default: true).
    /// When false, the translation-aware manager is only added as
    /// `trans_objects`.
    pub change_default_manager: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_language: "en".to_string(),
            default_filter_language: FilterLanguage::Current,
            change_default_manager: true,
        }
    }
}

impl Settings {
    /// Load settings from `TOF_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let default_language =
            env::var("TOF_DEFAULT_LANGUAGE").unwrap_or_else(|_| "en".to_string());

        let default_filter_language = match env::var("TOF_DEFAULT_FILTER_LANGUAGE") {
            Ok(v) => v
                .parse()
                .context("TOF_DEFAULT_FILTER_LANGUAGE is not a valid filter language")?,
            Err(_) => FilterLanguage::Current,
        };

        let change_default_manager = match env::var("TOF_CHANGE_DEFAULT_MANAGER") {
            Ok(v) => parse_bool(&v).context("TOF_CHANGE_DEFAULT_MANAGER must be a boolean")?,
            Err(_) => true,
        };

        Ok(Self {
            default_language,
            default_filter_language,
            change_default_manager,
        })
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("'{other}' is not a boolean"),
    }
}

/// CLI configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// Model definition file (default: ./models.toml).
    pub models_path: PathBuf,

    /// Translation settings.
    pub settings: Settings,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let database_url =
            env::var("DATABASE_URL").context("DATABASE_URL environment variable is required")?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let models_path = env::var("TOF_MODELS")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./models.toml"));

        Ok(Self {
            database_url,
            database_max_connections,
            models_path,
            settings: Settings::from_env()?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_keywords() {
        assert_eq!("__all__".parse::<FilterLanguage>().unwrap(), FilterLanguage::All);
        assert_eq!(
            "current".parse::<FilterLanguage>().unwrap(),
            FilterLanguage::Current
        );
        assert_eq!(
            "fr".parse::<FilterLanguage>().unwrap(),
            FilterLanguage::Fixed("fr".to_string())
        );
    }

    #[test]
    fn parses_json_list() {
        let parsed: FilterLanguage = r#"["en", "fr"]"#.parse().unwrap();
        assert_eq!(
            parsed,
            FilterLanguage::AnyOf(vec!["en".to_string(), "fr".to_string()])
        );
    }

    #[test]
    fn parses_json_table() {
        let parsed: FilterLanguage = r#"{"fr": ["fr", "en"], "de": "de"}"#.parse().unwrap();
        let FilterLanguage::PerLanguage(table) = parsed else {
            panic!("expected a per-language table");
        };
        assert_eq!(table["fr"], vec!["fr", "en"]);
        assert_eq!(table["de"], vec!["de"]);
    }

    #[test]
    fn rejects_bad_json() {
        assert!("[1, 2]".parse::<FilterLanguage>().is_err());
        assert!("{broken".parse::<FilterLanguage>().is_err());
        assert!("".parse::<FilterLanguage>().is_err());
    }

    #[test]
    fn bool_values() {
        assert!(parse_bool("TRUE").unwrap());
        assert!(!parse_bool("off").unwrap());
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.default_language, "en");
        assert_eq!(settings.default_filter_language, FilterLanguage::Current);
        assert!(settings.change_default_manager);
    }
}
