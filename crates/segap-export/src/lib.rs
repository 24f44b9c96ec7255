//! # SEGAp导出模块
//!
//! 把患者档案及其分割掩膜渲染为分页PDF。

pub mod pdf;

pub use pdf::{export_patient_pdf, PdfLayout};
