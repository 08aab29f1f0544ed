//! Run configuration.
//!
//! Values come from environment variables (a `.env` file is loaded by the
//! binary beforehand) and can be overridden from the command line:
//!
//! | Variable | Meaning |
//! |---|---|
//! | `RECORDS_FILE` | ISO 2709 input, `.gz` accepted |
//! | `KOHA_MARC_FRAMEWORK_FILE` | Koha MARC framework CSV export |
//! | `OUTPUT_FILE` | Item CSV to write |
//! | `ERRORS_FILE` | Error CSV to write |
//! | `ITEM_FIELD_TAG` | Item tag, e.g. `952` or `995` |
//! | `INCLUDE_UNMAPPED_FIELDS` | `1` to add `<tag>$$<code>` columns |
//! | `RECOVERY_MODE` | `strict` (default) or `lenient` |

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

use crate::error::{ExportError, Result};
use crate::recovery::RecoveryMode;

/// Validated settings for one export run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    /// MARC records to read
    pub records_file: PathBuf,
    /// Framework export to build the mapping from
    pub framework_file: PathBuf,
    /// Item CSV to write
    pub output_file: PathBuf,
    /// Error CSV to write
    pub errors_file: PathBuf,
    /// Tag of the item field
    pub item_field_tag: String,
    /// Whether unmapped subfields get their own columns
    pub include_unmapped_fields: bool,
    /// How malformed records are decoded
    pub recovery_mode: RecoveryMode,
}

/// Command-line values that take precedence over the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Overrides `RECORDS_FILE`
    pub records_file: Option<PathBuf>,
    /// Overrides `KOHA_MARC_FRAMEWORK_FILE`
    pub framework_file: Option<PathBuf>,
    /// Overrides `OUTPUT_FILE`
    pub output_file: Option<PathBuf>,
    /// Overrides `ERRORS_FILE`
    pub errors_file: Option<PathBuf>,
    /// Overrides `ITEM_FIELD_TAG`
    pub item_field_tag: Option<String>,
    /// Overrides `INCLUDE_UNMAPPED_FIELDS`
    pub include_unmapped_fields: Option<bool>,
    /// Overrides `RECOVERY_MODE`
    pub recovery_mode: Option<RecoveryMode>,
}

/// Shape of the merged sources before validation.
#[derive(Debug, Deserialize)]
struct RawConfig {
    records_file: Option<String>,
    koha_marc_framework_file: Option<String>,
    output_file: Option<String>,
    errors_file: Option<String>,
    item_field_tag: Option<String>,
    include_unmapped_fields: Option<String>,
    recovery_mode: Option<String>,
}

impl ExportConfig {
    /// Load from the process environment, then apply `overrides`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Config`] if a required value is missing or invalid.
    pub fn load(overrides: &ConfigOverrides) -> Result<Self> {
        Self::from_environment(Environment::default(), overrides)
    }

    /// Load from an explicit variable map instead of the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Config`] if a required value is missing or invalid.
    pub fn from_vars<I, K, V>(vars: I, overrides: &ConfigOverrides) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: config::Map<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::from_environment(Environment::default().source(Some(vars)), overrides)
    }

    fn from_environment(environment: Environment, overrides: &ConfigOverrides) -> Result<Self> {
        merge_sources(environment, overrides)
            .map_err(config_error)?
            .validate()
    }
}

/// Layer the CLI overrides on top of the environment.
fn merge_sources(
    environment: Environment,
    overrides: &ConfigOverrides,
) -> std::result::Result<RawConfig, ConfigError> {
    let include_unmapped = overrides
        .include_unmapped_fields
        .map(|include| if include { "1" } else { "0" }.to_string());

    let config = Config::builder()
        .add_source(environment)
        .set_override_option("records_file", path_value(overrides.records_file.as_deref()))?
        .set_override_option(
            "koha_marc_framework_file",
            path_value(overrides.framework_file.as_deref()),
        )?
        .set_override_option("output_file", path_value(overrides.output_file.as_deref()))?
        .set_override_option("errors_file", path_value(overrides.errors_file.as_deref()))?
        .set_override_option("item_field_tag", overrides.item_field_tag.clone())?
        .set_override_option("include_unmapped_fields", include_unmapped)?
        .set_override_option(
            "recovery_mode",
            overrides.recovery_mode.map(|mode| mode.as_str().to_string()),
        )?
        .build()?;

    config.try_deserialize()
}

impl RawConfig {
    fn validate(self) -> Result<ExportConfig> {
        let item_field_tag = required(self.item_field_tag, "ITEM_FIELD_TAG")?;
        if item_field_tag.chars().count() != 3 {
            return Err(ExportError::Config(format!(
                "ITEM_FIELD_TAG must be a 3-character tag, got '{item_field_tag}'"
            )));
        }

        let recovery_mode = match self.recovery_mode.as_deref() {
            None | Some("") => RecoveryMode::default(),
            Some(mode) => mode.parse()?,
        };

        Ok(ExportConfig {
            records_file: absolute(&required(self.records_file, "RECORDS_FILE")?)?,
            framework_file: absolute(&required(
                self.koha_marc_framework_file,
                "KOHA_MARC_FRAMEWORK_FILE",
            )?)?,
            output_file: absolute(&required(self.output_file, "OUTPUT_FILE")?)?,
            errors_file: absolute(&required(self.errors_file, "ERRORS_FILE")?)?,
            item_field_tag,
            include_unmapped_fields: self.include_unmapped_fields.as_deref() == Some("1"),
            recovery_mode,
        })
    }
}

fn required(value: Option<String>, name: &str) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ExportError::Config(format!("{name} is not set")))
}

fn absolute(path: &str) -> Result<PathBuf> {
    std::path::absolute(Path::new(path)).map_err(|e| {
        ExportError::Config(format!("cannot resolve path '{path}': {e}"))
    })
}

fn path_value(path: Option<&Path>) -> Option<String> {
    path.map(|p| p.to_string_lossy().into_owned())
}

#[allow(clippy::needless_pass_by_value)]
fn config_error(e: ConfigError) -> ExportError {
    ExportError::Config(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> Vec<(&'static str, &'static str)> {
        vec![
            ("RECORDS_FILE", "/data/records.mrc"),
            ("KOHA_MARC_FRAMEWORK_FILE", "/data/framework.csv"),
            ("OUTPUT_FILE", "/data/items.csv"),
            ("ERRORS_FILE", "/data/errors.csv"),
            ("ITEM_FIELD_TAG", "952"),
            ("INCLUDE_UNMAPPED_FIELDS", "1"),
        ]
    }

    #[test]
    fn test_load_from_vars() {
        let config = ExportConfig::from_vars(vars(), &ConfigOverrides::default()).unwrap();
        assert_eq!(config.records_file, PathBuf::from("/data/records.mrc"));
        assert_eq!(config.framework_file, PathBuf::from("/data/framework.csv"));
        assert_eq!(config.item_field_tag, "952");
        assert!(config.include_unmapped_fields);
        assert_eq!(config.recovery_mode, RecoveryMode::Strict);
    }

    #[test]
    fn test_include_flag_requires_exactly_one() {
        let mut vars = vars();
        vars.retain(|(k, _)| *k != "INCLUDE_UNMAPPED_FIELDS");
        vars.push(("INCLUDE_UNMAPPED_FIELDS", "true"));
        let config = ExportConfig::from_vars(vars, &ConfigOverrides::default()).unwrap();
        assert!(!config.include_unmapped_fields);
    }

    #[test]
    fn test_overrides_win() {
        let overrides = ConfigOverrides {
            output_file: Some(PathBuf::from("/tmp/out.csv")),
            item_field_tag: Some("995".to_string()),
            include_unmapped_fields: Some(false),
            recovery_mode: Some(RecoveryMode::Lenient),
            ..ConfigOverrides::default()
        };
        let config = ExportConfig::from_vars(vars(), &overrides).unwrap();
        assert_eq!(config.output_file, PathBuf::from("/tmp/out.csv"));
        assert_eq!(config.item_field_tag, "995");
        assert!(!config.include_unmapped_fields);
        assert_eq!(config.recovery_mode, RecoveryMode::Lenient);
    }

    #[test]
    fn test_missing_value() {
        let mut vars = vars();
        vars.retain(|(k, _)| *k != "ERRORS_FILE");
        let err = ExportConfig::from_vars(vars, &ConfigOverrides::default()).unwrap_err();
        assert!(err.to_string().contains("ERRORS_FILE is not set"));
    }

    #[test]
    fn test_bad_tag_and_mode() {
        let overrides = ConfigOverrides {
            item_field_tag: Some("95".to_string()),
            ..ConfigOverrides::default()
        };
        assert!(ExportConfig::from_vars(vars(), &overrides).is_err());

        let mut vars = vars();
        vars.push(("RECOVERY_MODE", "permissive"));
        assert!(ExportConfig::from_vars(vars, &ConfigOverrides::default()).is_err());
    }

    #[test]
    fn test_relative_paths_become_absolute() {
        let mut vars = vars();
        vars.retain(|(k, _)| *k != "OUTPUT_FILE");
        vars.push(("OUTPUT_FILE", "items.csv"));
        let config = ExportConfig::from_vars(vars, &ConfigOverrides::default()).unwrap();
        assert!(config.output_file.is_absolute());
        assert!(config.output_file.ends_with("items.csv"));
    }
}
