//! 蓝图解析
//!
//! TOML 为主，JSON 用于机器生成的配置 (如 `framepipe info --json` 的输出)。
//! 未知字段值 (如不存在的 transform 名) 在这里就报错，不进入校验阶段。

use std::path::Path;

use contracts::{ContractError, PipelineBlueprint};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    fn label(self) -> &'static str {
        match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
        }
    }
}

/// Deserialize a blueprint; missing sections fall back to their defaults.
pub fn parse(content: &str, format: ConfigFormat) -> Result<PipelineBlueprint, ContractError> {
    let parsed: Result<PipelineBlueprint, Box<dyn std::error::Error + Send + Sync>> = match format {
        ConfigFormat::Toml => toml::from_str(content)
            .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> { Box::new(e) }),
        ConfigFormat::Json => serde_json::from_str(content)
            .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> { Box::new(e) }),
    };
    parsed.map_err(|e| ContractError::ConfigParse {
        message: format!("invalid {} pipeline blueprint: {e}", format.label()),
        source: Some(e),
    })
}
