//! # SEGAp数据库模块
//!
//! 基于JSON文档的用户与患者存储。每个存储在内存中维护唯一键索引，
//! 写操作在锁内完成检查与追加，并整份持久化文档。

pub mod connection;
pub mod patients;
pub mod users;

// 重新导出主要类型
pub use connection::{Database, DatabaseOptions};
pub use patients::PatientStore;
pub use users::UserStore;
