//! 错误定义模块

use thiserror::Error;

/// SEGAp系统统一错误类型
#[derive(Error, Debug)]
pub enum SegapError {
    #[error("用户已存在: {0}")]
    DuplicateUser(String),

    #[error("用户名或密码错误")]
    InvalidCredentials,

    #[error("DNI已存在: {0}")]
    DuplicateDni(String),

    #[error("患者未找到: {0}")]
    PatientNotFound(String),

    #[error("没有可分配的分割结果")]
    SegmentationUnavailable,

    #[error("图像处理错误: {0}")]
    ImageProcessing(String),

    #[error("文件删除失败: {path}: {reason}")]
    FileDeletion { path: String, reason: String },

    #[error("模型错误: {0}")]
    Model(String),

    #[error("导出错误: {0}")]
    Export(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("存储错误: {0}")]
    Storage(String),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("无效页面转换: 从 {from} 经 {event}")]
    InvalidStateTransition { from: String, event: String },
}

/// SEGAp系统统一结果类型
pub type Result<T> = std::result::Result<T, SegapError>;
