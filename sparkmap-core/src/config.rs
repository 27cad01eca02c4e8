//! Configuration types and layered loading.
//!
//! Uses `figment` for layered configuration: defaults -> user config ->
//! workspace config -> explicit file -> environment.
//! Configuration is read from `<config dir>/sparkmap/config.toml` and/or
//! `.sparkmap/config.toml` in the workspace directory.

use crate::error::ConfigError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SparkmapConfig {
    /// Vocabulary used by the extraction engine.
    pub extractor: ExtractorConfig,
    /// Report rendering and output.
    pub report: ReportConfig,
}

/// Names the extractor treats as special in the analysed pipeline code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Identifiers subscripted by table name (`dm_df["provider"]`).
    pub registry_names: Vec<String>,
    /// Functions whose result is a table registry
    /// (`dm_df = create_dataframe_from_table(spark, schema, table_list)`).
    pub registry_builders: Vec<String>,
    /// Functions/methods loading one table by literal name (`spark.table("x")`).
    pub table_loaders: Vec<String>,
    /// Variable holding the data-quality rule block.
    pub dq_variable: String,
    /// Variable holding the target table name.
    pub target_variable: String,
    /// Placeholder table used when no binding can be found.
    pub unknown_table: String,
    /// Target name used when sanitising leaves nothing.
    pub default_sheet_name: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            registry_names: vec!["dm_df".into()],
            registry_builders: vec!["create_dataframe_from_table".into()],
            table_loaders: vec!["table".into()],
            dq_variable: "dq_rule_string".into(),
            target_variable: "target_table".into(),
            unknown_table: "unknown".into(),
            default_sheet_name: "Sheet1".into(),
        }
    }
}

impl ExtractorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.unknown_table.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "extractor.unknown_table must not be empty".into(),
            ));
        }
        if self.default_sheet_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "extractor.default_sheet_name must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Report output format.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Markdown,
    Json,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Markdown => "md",
            ReportFormat::Json => "json",
        }
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(ReportFormat::Markdown),
            "json" => Ok(ReportFormat::Json),
            other => Err(ConfigError::Invalid(format!(
                "unknown report format '{other}' (expected markdown or json)"
            ))),
        }
    }
}

/// Report rendering configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReportConfig {
    pub format: ReportFormat,
    /// Directory reports are written to.
    pub output_dir: PathBuf,
    /// File name prefix: `<prefix>_<target>_<timestamp>.<ext>`.
    pub file_prefix: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: ReportFormat::Markdown,
            output_dir: PathBuf::from("mapping_outputs"),
            file_prefix: "mapping_output".into(),
        }
    }
}

fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "sparkmap", "sparkmap")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Path of the workspace-level config file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".sparkmap").join("config.toml")
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `SPARKMAP_`, `__` between levels)
/// 2. Explicit config file
/// 3. Workspace-local config (`.sparkmap/config.toml`)
/// 4. User config
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    explicit: Option<&Path>,
) -> Result<SparkmapConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(SparkmapConfig::default()));

    if let Some(user_config) = user_config_path()
        && user_config.exists()
    {
        figment = figment.merge(Toml::file(&user_config));
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ConfigError::Invalid(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        figment = figment.merge(Toml::file(path));
    }

    // SPARKMAP_REPORT__FORMAT, SPARKMAP_EXTRACTOR__UNKNOWN_TABLE, ...
    figment = figment.merge(Env::prefixed("SPARKMAP_").split("__"));

    let config: SparkmapConfig = figment.extract().map_err(Box::new)?;
    config.extractor.validate()?;
    Ok(config)
}

/// Write the default configuration to `.sparkmap/config.toml` under the
/// workspace. Returns the path written.
pub fn write_default_config(workspace: &Path) -> Result<PathBuf, ConfigError> {
    let path = workspace_config_path(workspace);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(&SparkmapConfig::default())?;
    std::fs::write(&path, content)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SparkmapConfig::default();
        assert_eq!(config.extractor.registry_names, vec!["dm_df".to_string()]);
        assert_eq!(config.extractor.unknown_table, "unknown");
        assert_eq!(config.report.format, ReportFormat::Markdown);
        assert!(config.extractor.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: SparkmapConfig = toml::from_str(
            r#"
[extractor]
registry_names = ["dfs", "dm_df"]

[report]
format = "json"
"#,
        )
        .unwrap();
        assert_eq!(config.extractor.registry_names.len(), 2);
        assert_eq!(config.extractor.dq_variable, "dq_rule_string");
        assert_eq!(config.report.format, ReportFormat::Json);
        assert_eq!(config.report.file_prefix, "mapping_output");
    }

    #[test]
    fn test_workspace_config_is_layered() {
        let dir = tempfile::tempdir().unwrap();
        let path = workspace_config_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[extractor]\nunknown_table = \"n/a\"\n").unwrap();

        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.extractor.unknown_table, "n/a");
        assert_eq!(config.extractor.target_variable, "target_table");
    }

    #[test]
    fn test_empty_placeholder_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("custom.toml");
        std::fs::write(&explicit, "[extractor]\nunknown_table = \"\"\n").unwrap();

        let err = load_config(None, Some(&explicit)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_write_default_config_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_default_config(dir.path()).unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        let parsed: SparkmapConfig = toml::from_str(&content).unwrap();
        assert_eq!(parsed, SparkmapConfig::default());
    }

    #[test]
    fn test_report_format_from_str() {
        assert_eq!("md".parse::<ReportFormat>().unwrap(), ReportFormat::Markdown);
        assert_eq!("JSON".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert!("xlsx".parse::<ReportFormat>().is_err());
    }
}
