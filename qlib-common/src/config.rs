//! Configuration loading
//!
//! Configuration file resolution follows a fixed priority order:
//! 1. Command-line argument (highest priority)
//! 2. `QLIB_CONFIG` environment variable
//! 3. `<config dir>/qlib/config.toml` (OS dependent, via `dirs`)
//! 4. Compiled defaults (fallback)
//!
//! A file named explicitly (CLI or environment) must exist and parse. The
//! default-location file is optional: when absent, compiled defaults are used.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Environment variable naming a configuration file
pub const CONFIG_ENV_VAR: &str = "QLIB_CONFIG";

/// Complete qlib configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QlibConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub worksheet: WorksheetConfig,

    #[serde(default)]
    pub extraction: ExtractionConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Field delimiter of a worksheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum Delimiter {
    /// Detect from the header line
    #[default]
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = ";")]
    Semicolon,
    #[serde(rename = ",")]
    Comma,
}

impl Delimiter {
    /// Delimiter byte, `None` for [`Delimiter::Auto`]
    pub fn as_byte(self) -> Option<u8> {
        match self {
            Delimiter::Auto => None,
            Delimiter::Semicolon => Some(b';'),
            Delimiter::Comma => Some(b','),
        }
    }
}

impl FromStr for Delimiter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "auto" => Ok(Delimiter::Auto),
            ";" | "semicolon" => Ok(Delimiter::Semicolon),
            "," | "comma" => Ok(Delimiter::Comma),
            other => Err(Error::Config(format!(
                "Unknown delimiter '{}' (expected auto, ';' or ',')",
                other
            ))),
        }
    }
}

/// Worksheet file handling
#[derive(Debug, Clone, Deserialize)]
pub struct WorksheetConfig {
    #[serde(default)]
    pub delimiter: Delimiter,

    /// Write a UTF-8 byte-order mark on output (spreadsheet compatibility)
    #[serde(default = "default_true")]
    pub write_bom: bool,

    #[serde(default)]
    pub columns: ColumnNames,
}

impl Default for WorksheetConfig {
    fn default() -> Self {
        Self {
            delimiter: Delimiter::Auto,
            write_bom: true,
            columns: ColumnNames::default(),
        }
    }
}

/// Worksheet header names
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub id: String,
    pub text: String,
    pub parent: String,
    pub item: String,
    pub alternatives: String,
    pub years: String,
    pub year_count: String,
    pub overrides: String,
    pub variable: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            id: "question_id".to_string(),
            text: "question_text".to_string(),
            parent: "parent_question".to_string(),
            item: "item".to_string(),
            alternatives: "response_alternatives".to_string(),
            years: "years".to_string(),
            year_count: "num_years".to_string(),
            overrides: "should_group_with".to_string(),
            variable: "variable".to_string(),
        }
    }
}

/// Raw extract interpretation
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Lowest value-label code treated as a missing-data code
    pub missing_code_min: i64,

    /// Highest value-label code treated as a missing-data code
    pub missing_code_max: i64,

    /// Alternative count at which a scale is collapsed to the open-question label
    pub open_question_threshold: usize,

    pub open_question_label: String,

    /// Technical variables (case-insensitive prefixes) never cataloged
    pub skip_variable_prefixes: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            missing_code_min: 94,
            missing_code_max: 99,
            open_question_threshold: 20,
            open_question_label: "öppen fråga".to_string(),
            skip_variable_prefixes: ["löpnr", "formid", "indatum", "mode"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ExtractionConfig {
    pub fn is_missing_code(&self, code: i64) -> bool {
        (self.missing_code_min..=self.missing_code_max).contains(&code)
    }

    pub fn is_skipped_variable(&self, variable: &str) -> bool {
        let lowered = variable.to_lowercase();
        self.skip_variable_prefixes
            .iter()
            .any(|prefix| lowered.starts_with(&prefix.to_lowercase()))
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

/// Where a configuration file was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLocation {
    /// Named on the command line or in `QLIB_CONFIG`; must exist
    Explicit(PathBuf),
    /// OS default location; optional
    Default(PathBuf),
    /// No location could be determined
    None,
}

/// Resolve the configuration file location following the priority order.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> ConfigLocation {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return ConfigLocation::Explicit(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return ConfigLocation::Explicit(PathBuf::from(path));
        }
    }

    // Priority 3: OS config directory
    match default_config_path() {
        Some(path) => ConfigLocation::Default(path),
        None => ConfigLocation::None,
    }
}

/// `<config dir>/qlib/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("qlib").join("config.toml"))
}

/// Load configuration following the priority order.
///
/// Falls back to compiled defaults when no explicit file is named and the
/// default-location file does not exist.
pub fn load_config(cli_arg: Option<&Path>) -> Result<QlibConfig> {
    match resolve_config_path(cli_arg) {
        ConfigLocation::Explicit(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            load_config_file(&path)
        }
        ConfigLocation::Default(path) if path.exists() => load_config_file(&path),
        ConfigLocation::Default(path) => {
            debug!(path = %path.display(), "No config file at default location, using defaults");
            Ok(QlibConfig::default())
        }
        ConfigLocation::None => {
            debug!("Could not determine config directory, using defaults");
            Ok(QlibConfig::default())
        }
    }
}

/// Parse one configuration file.
pub fn load_config_file(path: &Path) -> Result<QlibConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;

    let config = parse_config(&content)
        .map_err(|e| Error::Config(format!("Invalid config {}: {}", path.display(), e)))?;

    info!(path = %path.display(), "Loaded configuration");
    Ok(config)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<QlibConfig> {
    let config: QlibConfig =
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;

    let extraction = &config.extraction;
    if extraction.missing_code_min > extraction.missing_code_max {
        return Err(Error::Config(format!(
            "missing_code_min ({}) exceeds missing_code_max ({})",
            extraction.missing_code_min, extraction.missing_code_max
        )));
    }
    if extraction.open_question_threshold == 0 {
        return Err(Error::Config(
            "open_question_threshold must be at least 1".to_string(),
        ));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = QlibConfig::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.worksheet.delimiter, Delimiter::Auto);
        assert!(config.worksheet.write_bom);
        assert_eq!(config.worksheet.columns.overrides, "should_group_with");
        assert_eq!(config.extraction.open_question_threshold, 20);
        assert!(config.extraction.is_missing_code(94));
        assert!(config.extraction.is_missing_code(99));
        assert!(!config.extraction.is_missing_code(93));
        assert!(config.extraction.is_skipped_variable("Löpnr"));
        assert!(config.extraction.is_skipped_variable("mode2"));
        assert!(!config.extraction.is_skipped_variable("f1"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = parse_config(
            r#"
            [worksheet]
            delimiter = ";"

            [worksheet.columns]
            overrides = "grupp"
            "#,
        )
        .unwrap();

        assert_eq!(config.worksheet.delimiter, Delimiter::Semicolon);
        assert!(config.worksheet.write_bom);
        assert_eq!(config.worksheet.columns.overrides, "grupp");
        assert_eq!(config.worksheet.columns.id, "question_id");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.extraction.missing_code_max, 99);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(parse_config("[worksheet]\ndelimiter = \"|\"").is_err());
        assert!(parse_config("[extraction]\nmissing_code_min = 100\nmissing_code_max = 90").is_err());
        assert!(parse_config("[extraction]\nopen_question_threshold = 0").is_err());
        assert!(parse_config("unknown_section = 1").is_err());
    }

    #[test]
    fn test_delimiter_from_str() {
        assert_eq!("auto".parse::<Delimiter>().unwrap(), Delimiter::Auto);
        assert_eq!(";".parse::<Delimiter>().unwrap(), Delimiter::Semicolon);
        assert_eq!("comma".parse::<Delimiter>().unwrap(), Delimiter::Comma);
        assert!("tab".parse::<Delimiter>().is_err());
        assert_eq!(Delimiter::Comma.as_byte(), Some(b','));
        assert_eq!(Delimiter::Auto.as_byte(), None);
    }
}
