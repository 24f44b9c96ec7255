//! # SEGAp管理模块
//!
//! 提供配置加载、验证与日志初始化

pub mod config;
pub mod logging;

pub use config::{
    ConfigManager, ConfigValidator, LoggingConfig, SecurityConfig, SegapConfig,
    SegmentationConfig, StorageConfig,
};
pub use logging::{init_logging, LogFormat};
