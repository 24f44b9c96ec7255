//! # SEGAp存储模块
//!
//! 负责分割掩膜文件的存储，以及JSON文档的读写。

pub mod document;
pub mod storage;

pub use document::{load_document, save_document};
pub use storage::*;
