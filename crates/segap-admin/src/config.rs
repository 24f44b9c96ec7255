//! 配置管理
//!
//! 默认值 → 可选的TOML配置文件 → `SEGAP_` 前缀的环境变量，依次覆盖

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use segap_database::DatabaseOptions;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{error, info};

/// 环境变量前缀
pub const ENV_PREFIX: &str = "SEGAP";

/// SEGAp系统完整配置
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SegapConfig {
    /// 存储配置
    pub storage: StorageConfig,
    /// 分割模型配置
    pub segmentation: SegmentationConfig,
    /// 安全配置
    pub security: SecurityConfig,
    /// 日志配置
    pub logging: LoggingConfig,
}

/// 存储配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// 数据根目录
    pub data_dir: String,
    /// 用户文档文件名
    pub users_file: String,
    /// 患者文档文件名
    pub patients_file: String,
    /// 掩膜目录名
    pub masks_dir: String,
}

/// 分割模型配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SegmentationConfig {
    /// 模型文件路径
    pub model_path: Option<String>,
    /// 模型输入宽度
    pub input_width: u32,
    /// 模型输入高度
    pub input_height: u32,
}

/// 安全配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecurityConfig {
    /// 重置数据库所需的共享密码
    pub reset_password: String,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// 日志级别或过滤指令
    pub level: String,
    /// 日志格式: full / compact / pretty
    pub format: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: ".".to_string(),
            users_file: "users.json".to_string(),
            patients_file: "patients.json".to_string(),
            masks_dir: "segmentations".to_string(),
        }
    }
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            input_width: 224,
            input_height: 224,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            reset_password: "admin".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "full".to_string(),
        }
    }
}

impl SegapConfig {
    /// 数据库打开参数
    pub fn database_options(&self) -> DatabaseOptions {
        DatabaseOptions {
            data_dir: PathBuf::from(&self.storage.data_dir),
            users_file: self.storage.users_file.clone(),
            patients_file: self.storage.patients_file.clone(),
            masks_dir: self.storage.masks_dir.clone(),
            reset_password: self.security.reset_password.clone(),
        }
    }

    /// 模型输入尺寸（宽, 高）
    pub fn input_size(&self) -> (u32, u32) {
        (self.segmentation.input_width, self.segmentation.input_height)
    }
}

/// 配置管理器
#[derive(Debug)]
pub struct ConfigManager {
    /// 配置数据
    config: SegapConfig,
    /// 配置文件路径
    config_path: Option<String>,
    /// 配置验证器
    validator: ConfigValidator,
}

impl ConfigManager {
    /// 加载并验证配置
    pub fn new(config_path: Option<&str>) -> Result<Self> {
        let config = Self::load_config(config_path)?;
        let validator = ConfigValidator::new();
        validator.validate(&config)?;

        Ok(Self {
            config,
            config_path: config_path.map(str::to_string),
            validator,
        })
    }

    /// 合并默认值、配置文件与环境变量
    fn load_config(config_path: Option<&str>) -> Result<SegapConfig> {
        let defaults = Config::try_from(&SegapConfig::default())
            .context("Failed to build default configuration")?;

        let mut builder = Config::builder().add_source(defaults);
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path));
        }
        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: SegapConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        match config_path {
            Some(path) => info!("Configuration loaded successfully from: {}", path),
            None => info!("Configuration loaded from defaults and environment"),
        }
        Ok(config)
    }

    /// 获取配置
    pub fn config(&self) -> &SegapConfig {
        &self.config
    }

    /// 更新配置
    pub fn update_config(&mut self, new_config: SegapConfig) -> Result<()> {
        self.validator.validate(&new_config)?;
        self.config = new_config;
        info!("Configuration updated successfully");
        Ok(())
    }

    /// 保存配置到文件
    pub async fn save_config(&self, path: Option<&str>) -> Result<()> {
        let target = path
            .or(self.config_path.as_deref())
            .context("No configuration path to save to")?;
        let config_str = toml::to_string_pretty(&self.config)
            .context("Failed to serialize configuration")?;

        tokio::fs::write(target, config_str)
            .await
            .context("Failed to write configuration file")?;

        info!("Configuration saved to: {}", target);
        Ok(())
    }

    /// 获取配置值
    pub fn get_value<T>(&self, path: &str) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let value = self
            .extract_nested_value(path)
            .context(format!("Configuration path not found: {}", path))?;

        serde_json::from_value(value).context("Failed to deserialize configuration value")
    }

    /// 提取嵌套值
    fn extract_nested_value(&self, path: &str) -> Result<serde_json::Value> {
        let config_json =
            serde_json::to_value(&self.config).context("Failed to serialize config to JSON")?;

        let mut current = &config_json;
        for part in path.split('.') {
            match current {
                serde_json::Value::Object(map) => {
                    current = map
                        .get(part)
                        .ok_or_else(|| anyhow::anyhow!("Path segment not found: {}", part))?;
                }
                _ => return Err(anyhow::anyhow!("Invalid path at segment: {}", part)),
            }
        }

        Ok(current.clone())
    }
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
    validator: fn(&SegapConfig) -> Result<()>,
}

impl ConfigValidator {
    /// 创建新的配置验证器
    pub fn new() -> Self {
        let validation_rules = vec![
            ValidationRule {
                field_path: "storage",
                validator: |config| {
                    let storage = &config.storage;
                    if [
                        &storage.data_dir,
                        &storage.users_file,
                        &storage.patients_file,
                        &storage.masks_dir,
                    ]
                    .iter()
                    .any(|value| value.trim().is_empty())
                    {
                        return Err(anyhow::anyhow!("Storage paths cannot be empty"));
                    }
                    // 掩膜目录会在重置时被整体清空，必须与文档分开
                    config.database_options().validate()?;
                    Ok(())
                },
            },
            ValidationRule {
                field_path: "segmentation.input_size",
                validator: |config| {
                    if config.segmentation.input_width == 0 || config.segmentation.input_height == 0
                    {
                        Err(anyhow::anyhow!("Model input size cannot be 0"))
                    } else {
                        Ok(())
                    }
                },
            },
            ValidationRule {
                field_path: "security.reset_password",
                validator: |config| {
                    if config.security.reset_password.is_empty() {
                        Err(anyhow::anyhow!("Reset password cannot be empty"))
                    } else {
                        Ok(())
                    }
                },
            },
            ValidationRule {
                field_path: "logging",
                validator: |config| {
                    tracing_subscriber::EnvFilter::try_new(&config.logging.level)
                        .map_err(|e| anyhow::anyhow!("Invalid log level: {}", e))?;
                    config.logging.format.parse::<crate::logging::LogFormat>()?;
                    Ok(())
                },
            },
        ];

        Self { validation_rules }
    }

    /// 验证配置
    pub fn validate(&self, config: &SegapConfig) -> Result<()> {
        for rule in &self.validation_rules {
            if let Err(e) = (rule.validator)(config) {
                error!("Configuration validation failed for {}: {}", rule.field_path, e);
                return Err(anyhow::anyhow!("Invalid {}: {}", rule.field_path, e));
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
