//! 配置校验模块
//!
//! 校验规则：
//! - 字段范围 (`validator` derive 声明在 contracts 中)
//! - sensor id 唯一
//! - 批处理输入/输出路径不同
//! - retry 策略 max_attempts >= 1

use std::collections::HashSet;

use contracts::{ContractError, FailurePolicy, PipelineBlueprint};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// 校验 PipelineBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    validate_fields(blueprint)?;
    validate_sensor_ids(blueprint)?;
    validate_batch_paths(blueprint)?;
    validate_failure_policy(blueprint)?;
    Ok(())
}

/// 字段级约束
fn validate_fields(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    blueprint.validate().map_err(|errors| {
        let field = first_field(&errors, "").unwrap_or_else(|| "<root>".to_string());
        ContractError::config_validation(field, errors.to_string())
    })
}

/// 按字典序找到第一个出错字段的完整路径，如 `live.sensors[1].id`
fn first_field(errors: &ValidationErrors, prefix: &str) -> Option<String> {
    let mut keys: Vec<_> = errors.errors().keys().collect();
    keys.sort();

    keys.into_iter().find_map(|key| {
        let path = if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}.{key}")
        };
        match errors.errors().get(key)? {
            ValidationErrorsKind::Field(_) => Some(path),
            ValidationErrorsKind::Struct(inner) => first_field(inner, &path),
            ValidationErrorsKind::List(items) => items
                .iter()
                .next()
                .and_then(|(i, inner)| first_field(inner, &format!("{path}[{i}]"))),
        }
    })
}

/// 校验 sensor id 唯一性
fn validate_sensor_ids(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for sensor in &blueprint.live.sensors {
        if !seen.insert(sensor.id.as_str()) {
            return Err(ContractError::config_validation(
                format!("live.sensors[id={}]", sensor.id),
                "duplicate sensor id",
            ));
        }
    }
    Ok(())
}

/// 输出不能覆盖输入
fn validate_batch_paths(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let batch = &blueprint.batch;
    if batch.input_path == batch.output_path {
        return Err(ContractError::config_validation(
            "batch.output_path",
            format!(
                "output_path must differ from input_path ({})",
                batch.input_path.display()
            ),
        ));
    }
    Ok(())
}

/// 校验失败策略
fn validate_failure_policy(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    if let FailurePolicy::Retry { max_attempts: 0 } = blueprint.batch.failure_policy {
        return Err(ContractError::config_validation(
            "batch.failure_policy.max_attempts",
            "max_attempts must be >= 1",
        ));
    }
    Ok(())
}
