//! # SEGAp分割模块
//!
//! 将上传的伤口照片送入预训练分割模型，得到掩膜并计算覆盖率：
//! - 模型能力接口：`SegmentationModel`，推理实现可替换
//! - 分割流水线：解码、缩放、归一化、推理、还原为8位掩膜
//! - 掩膜：覆盖率统计与PNG编解码

pub mod mask;
pub mod model;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod pipeline;

// 重新导出主要类型
pub use mask::{coverage, Mask};
pub use model::{ImageTensor, Prediction, SegmentationModel, DEFAULT_INPUT_SIZE};
#[cfg(feature = "onnx")]
pub use onnx::OnnxSegmentationModel;
pub use pipeline::SegmentationPipeline;
