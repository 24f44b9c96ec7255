//! ONNX Runtime 推理后端
//!
//! 加载导出为ONNX的分割模型（NHWC输入，单通道sigmoid输出）。

use crate::model::{ImageTensor, Prediction, SegmentationModel, DEFAULT_INPUT_SIZE};
use ort::session::Session;
use segap_core::{Result, SegapError};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

/// 基于ONNX Runtime的分割模型
///
/// `Session::run` 需要 `&mut self`，因此会话放在互斥锁里。
pub struct OnnxSegmentationModel {
    session: Mutex<Session>,
    input_size: (u32, u32),
}

impl OnnxSegmentationModel {
    /// 从模型文件加载
    pub fn load(model_path: &Path) -> Result<Self> {
        Self::load_with_input_size(model_path, DEFAULT_INPUT_SIZE)
    }

    pub fn load_with_input_size(model_path: &Path, input_size: (u32, u32)) -> Result<Self> {
        if !model_path.exists() {
            return Err(SegapError::Model(format!(
                "模型文件不存在: {}",
                model_path.display()
            )));
        }

        let session = Session::builder()
            .map_err(|e: ort::Error| SegapError::Model(e.to_string()))?
            .with_intra_threads(2)
            .map_err(|e: ort::Error| SegapError::Model(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e: ort::Error| SegapError::Model(format!("ONNX load failed: {e}")))?;

        info!("ONNX segmentation model loaded from {}", model_path.display());

        Ok(Self {
            session: Mutex::new(session),
            input_size,
        })
    }
}

impl SegmentationModel for OnnxSegmentationModel {
    fn input_size(&self) -> (u32, u32) {
        self.input_size
    }

    fn predict(&self, batch: &ImageTensor) -> Result<Prediction> {
        use ort::value::TensorRef;

        let [n, h, w, c] = batch.shape();
        let array = ndarray::Array4::from_shape_vec((n, h, w, c), batch.data.clone())
            .map_err(|e| SegapError::Model(e.to_string()))?;
        let tensor =
            TensorRef::from_array_view(&array).map_err(|e| SegapError::Model(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| SegapError::Model("Session lock poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| SegapError::Model(format!("ONNX inference failed: {e}")))?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| SegapError::Model(format!("Output extraction: {e}")))?;

        let shape = shape.iter().map(|&d| d as usize).collect();
        Prediction::new(shape, data.to_vec())
    }
}
