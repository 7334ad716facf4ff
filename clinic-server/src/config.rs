//! 配置管理
//!
//! 按默认值、配置文件、环境变量的顺序叠加加载，后者覆盖前者。
//! 环境变量以 `CLINIC_` 开头，嵌套字段用 `__` 分隔，例如 `CLINIC_DATABASE__URL`。

use anyhow::{Context, Result};
use clinic_database::DatabaseConfig;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// 服务完整配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClinicConfig {
    /// 数据库配置
    pub database: DatabaseConfig,
    /// 时钟配置
    pub clock: ClockConfig,
    /// 日志配置
    pub logging: LoggingConfig,
}

/// 时钟配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockConfig {
    /// 相对UTC的偏移（分钟），所有本地时间都按这一个时区计算
    pub utc_offset_minutes: i32,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别，支持 `EnvFilter` 语法
    pub level: String,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 8 * 60,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// 加载配置，未指定文件时只使用默认值和环境变量
pub fn load_config(config_path: Option<&str>) -> Result<ClinicConfig> {
    let defaults = Config::try_from(&ClinicConfig::default())
        .context("Failed to build default configuration")?;

    let mut builder = Config::builder().add_source(defaults);
    if let Some(path) = config_path {
        builder = builder.add_source(File::with_name(path));
    }
    let settings = builder
        .add_source(
            Environment::with_prefix("CLINIC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to load configuration")?;

    let config: ClinicConfig = settings
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    ConfigValidator::new().validate(&config)?;

    match config_path {
        Some(path) => info!("Configuration loaded successfully from: {}", path),
        None => info!("Configuration loaded from defaults and environment"),
    }
    Ok(config)
}

/// 配置验证器
#[derive(Debug)]
pub struct ConfigValidator {
    /// 验证规则
    validation_rules: Vec<ValidationRule>,
}

/// 验证规则
#[derive(Debug)]
struct ValidationRule {
    /// 字段路径
    field_path: &'static str,
    /// 验证函数
    validator: fn(&ClinicConfig) -> Result<()>,
    /// 错误消息
    error_message: &'static str,
}

impl ConfigValidator {
    pub fn new() -> Self {
        let validation_rules = vec![
            ValidationRule {
                field_path: "database.url",
                validator: |config| {
                    if config.database.url.trim().is_empty() {
                        Err(anyhow::anyhow!("Database url cannot be empty"))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid database url",
            },
            ValidationRule {
                field_path: "database.max_connections",
                validator: |config| {
                    if config.database.max_connections == 0 {
                        Err(anyhow::anyhow!("Database max connections cannot be 0"))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid database max connections",
            },
            ValidationRule {
                field_path: "database.min_connections",
                validator: |config| {
                    if config.database.min_connections > config.database.max_connections {
                        Err(anyhow::anyhow!(
                            "Database min connections {} exceeds max connections {}",
                            config.database.min_connections,
                            config.database.max_connections
                        ))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid database min connections",
            },
            ValidationRule {
                field_path: "clock.utc_offset_minutes",
                validator: |config| {
                    let minutes = config.clock.utc_offset_minutes;
                    if minutes.abs() >= 18 * 60 {
                        Err(anyhow::anyhow!("UTC offset {} minutes is out of range", minutes))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid clock offset",
            },
            ValidationRule {
                field_path: "logging.level",
                validator: |config| {
                    if config.logging.level.trim().is_empty() {
                        Err(anyhow::anyhow!("Log level cannot be empty"))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid log level",
            },
        ];

        Self { validation_rules }
    }

    /// 验证配置
    pub fn validate(&self, config: &ClinicConfig) -> Result<()> {
        for rule in &self.validation_rules {
            if let Err(e) = (rule.validator)(config) {
                error!("Configuration validation failed for {}: {}", rule.field_path, e);
                return Err(anyhow::anyhow!("{}: {}", rule.error_message, e));
            }
        }
        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults_pass_validation() {
        let config = ClinicConfig::default();
        assert!(ConfigValidator::new().validate(&config).is_ok());
        assert_eq!(config.clock.utc_offset_minutes, 480);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_validator_rejects_bad_values() {
        let validator = ConfigValidator::new();

        let mut config = ClinicConfig::default();
        config.database.max_connections = 0;
        config.database.min_connections = 0;
        let err = validator.validate(&config).unwrap_err();
        assert!(err.to_string().contains("max connections"));

        let mut config = ClinicConfig::default();
        config.database.min_connections = config.database.max_connections + 1;
        assert!(validator.validate(&config).is_err());

        let mut config = ClinicConfig::default();
        config.clock.utc_offset_minutes = -18 * 60;
        assert!(validator.validate(&config).is_err());

        let mut config = ClinicConfig::default();
        config.database.url = "  ".into();
        assert!(validator.validate(&config).is_err());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!("clinic-config-{}.toml", uuid::Uuid::new_v4()));
        fs::write(
            &path,
            "[database]\nurl = \"postgresql://clinic@db/clinic\"\nmax_connections = 4\n\n[clock]\nutc_offset_minutes = -300\n",
        )
        .unwrap();

        let loaded = load_config(path.to_str());
        fs::remove_file(&path).unwrap();
        let config = loaded.unwrap();

        assert_eq!(config.database.url, "postgresql://clinic@db/clinic");
        assert_eq!(config.database.max_connections, 4);
        assert_eq!(config.database.min_connections, DatabaseConfig::default().min_connections);
        assert_eq!(config.clock.utc_offset_minutes, -300);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(load_config(Some("/nonexistent/clinic-config.toml")).is_err());
    }
}
