//! 分割流水线
//!
//! 解码 → 缩放到模型输入尺寸 → 像素归一化到[0, 1] → 推理 → 去掉批次与单通道维 → 还原到0-255。

use crate::mask::Mask;
use crate::model::{ImageTensor, Prediction, SegmentationModel};
use image::imageops::FilterType;
use segap_core::{Result, SegapError};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 分割流水线
#[derive(Clone)]
pub struct SegmentationPipeline {
    model: Arc<dyn SegmentationModel>,
}

impl std::fmt::Debug for SegmentationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentationPipeline")
            .field("input_size", &self.model.input_size())
            .finish()
    }
}

impl SegmentationPipeline {
    pub fn new(model: Arc<dyn SegmentationModel>) -> Self {
        Self { model }
    }

    /// 处理上传的图像，失败时返回 `None`
    pub fn segment(&self, image_bytes: &[u8]) -> Option<Mask> {
        match self.try_segment(image_bytes) {
            Ok(mask) => Some(mask),
            Err(e) => {
                warn!("Segmentation produced no mask: {}", e);
                None
            }
        }
    }

    /// 处理上传的图像，保留失败原因
    pub fn try_segment(&self, image_bytes: &[u8]) -> Result<Mask> {
        let batch = preprocess(image_bytes, self.model.input_size())?;
        debug!("Prepared input tensor {:?}", batch.shape());

        let prediction = self
            .model
            .predict(&batch)
            .map_err(|e| SegapError::ImageProcessing(format!("推理失败: {e}")))?;

        let mask = postprocess(prediction)?;
        info!(
            "Segmented {}x{} mask, coverage {:.2}%",
            mask.width(),
            mask.height(),
            mask.coverage()
        );
        Ok(mask)
    }
}

/// 解码并缩放图像，返回归一化的RGB张量
pub fn preprocess(image_bytes: &[u8], input_size: (u32, u32)) -> Result<ImageTensor> {
    let (width, height) = input_size;
    if width == 0 || height == 0 {
        return Err(SegapError::ImageProcessing(format!(
            "无效的模型输入尺寸 {}x{}",
            width, height
        )));
    }

    let image = image::load_from_memory(image_bytes)
        .map_err(|e| SegapError::ImageProcessing(format!("图像解码失败: {e}")))?;
    let resized = image.resize_exact(width, height, FilterType::Triangle).to_rgb8();

    let data = resized
        .into_raw()
        .into_iter()
        .map(|v| v as f32 / 255.0)
        .collect();

    Ok(ImageTensor {
        height: height as usize,
        width: width as usize,
        channels: 3,
        data,
    })
}

/// 把预测网格还原为8位掩膜
///
/// 预测值先截断到[0, 1]，NaN按0处理。
pub fn postprocess(prediction: Prediction) -> Result<Mask> {
    let (height, width) = prediction.grid_dims().ok_or_else(|| {
        SegapError::ImageProcessing(format!(
            "预测结果不是二维网格: {:?}",
            prediction.shape()
        ))
    })?;
    let (_, data) = prediction.into_parts();

    let pixels = data
        .into_iter()
        .map(|v| {
            let v = if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
            (v * 255.0) as u8
        })
        .collect();

    Mask::new(width as u32, height as u32, pixels)
}
