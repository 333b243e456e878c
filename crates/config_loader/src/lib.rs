//! # Config Loader
//!
//! 流水线蓝图加载模块。
//!
//! 负责：
//! - 从 TOML/JSON 文件读取 `PipelineBlueprint`
//! - 未给出配置文件时使用默认蓝图 (live + batch 均可运行)
//! - 字段范围与跨字段约束校验 (CLI 覆盖参数后也会重新校验)
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("framepipe.toml")).unwrap();
//! println!("Workers: {}", blueprint.batch.workers);
//! ```

mod parser;
mod validator;

pub use contracts::PipelineBlueprint;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;
use tracing::debug;

/// Loads and validates pipeline blueprints.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Read a blueprint file; `.toml` and `.json` are accepted.
    ///
    /// # Errors
    /// - the extension names no known format
    /// - the file cannot be read
    /// - parse or validation failure
    pub fn load_from_path(path: &Path) -> Result<PipelineBlueprint, ContractError> {
        let format = ConfigFormat::from_path(path).ok_or_else(|| {
            ContractError::config_parse(format!(
                "unsupported config format for pipeline blueprint '{}' (expected .toml or .json)",
                path.display()
            ))
        })?;
        let content = std::fs::read_to_string(path)?;
        let blueprint = Self::load_from_str(&content, format)?;
        debug!(
            path = %path.display(),
            sensors = blueprint.live.sensors.len(),
            workers = blueprint.batch.workers,
            "pipeline blueprint loaded"
        );
        Ok(blueprint)
    }

    /// Parse a blueprint from text, then validate it.
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<PipelineBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// 给出路径则读取文件，否则返回 (已校验的) 默认蓝图
    pub fn load_or_default(path: Option<&Path>) -> Result<PipelineBlueprint, ContractError> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => {
                let blueprint = PipelineBlueprint::default();
                validator::validate(&blueprint)?;
                Ok(blueprint)
            }
        }
    }

    /// Re-check a blueprint after CLI overrides were applied to it.
    pub fn validate(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
        validator::validate(blueprint)
    }

    pub fn to_toml(blueprint: &PipelineBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint).map_err(|e| {
            ContractError::config_parse(format!("cannot serialize pipeline blueprint as TOML: {e}"))
        })
    }

    pub fn to_json(blueprint: &PipelineBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint).map_err(|e| {
            ContractError::config_parse(format!("cannot serialize pipeline blueprint as JSON: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL_TOML: &str = r#"
[camera]
width = 64
height = 48
fps = 15

[live]
target_fps = 30

[[live.sensors]]
id = "sensor_1"
delay_ms = 10

[[live.sensors]]
id = "sensor_2"
delay_ms = 100

[batch]
input_path = "in.rgb"
output_path = "out.rgb"
workers = 3
"#;

    #[test]
    fn test_load_from_str_toml() {
        let result = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.camera.width, 64);
        assert_eq!(bp.live.sensors.len(), 2);
        assert_eq!(bp.batch.workers, 3);
    }

    #[test]
    fn test_round_trip_toml() {
        let bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&bp).unwrap();
        let bp2 = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(bp, bp2);
    }

    #[test]
    fn test_round_trip_json() {
        let bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&bp).unwrap();
        let bp2 = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(bp, bp2);
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let content = r#"
[[live.sensors]]
id = "dup"
delay_ms = 10

[[live.sensors]]
id = "dup"
delay_ms = 20
"#;
        let result = ConfigLoader::load_from_str(content, ConfigFormat::Toml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("duplicate"));
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(MINIMAL_TOML.as_bytes()).unwrap();

        let bp = ConfigLoader::load_from_path(file.path()).unwrap();
        assert_eq!(bp.camera.fps, 15);
    }

    #[test]
    fn test_unknown_extension() {
        let err = ConfigLoader::load_from_path(Path::new("pipeline.yaml")).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("unsupported config format"));
        assert!(msg.contains("pipeline.yaml"));
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let err = ConfigLoader::load_from_str("version = \"V2\"\n", ConfigFormat::Toml).unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_load_or_default() {
        let bp = ConfigLoader::load_or_default(None).unwrap();
        assert_eq!(bp, PipelineBlueprint::default());
    }
}
