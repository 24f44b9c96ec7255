//! 模型能力接口
//!
//! 推理本身在系统之外：实现者只需把归一化后的图像批次映射为逐像素预测。

use segap_core::{Result, SegapError};

/// 模型默认输入尺寸（宽, 高）
pub const DEFAULT_INPUT_SIZE: (u32, u32) = (224, 224);

/// 批大小为1的NHWC输入张量，取值范围[0, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
    pub data: Vec<f32>,
}

impl ImageTensor {
    /// `[batch, height, width, channels]`
    pub fn shape(&self) -> [usize; 4] {
        [1, self.height, self.width, self.channels]
    }

    /// 读取 (y, x, c) 处的值
    pub fn get(&self, y: usize, x: usize, c: usize) -> Option<f32> {
        if y >= self.height || x >= self.width || c >= self.channels {
            return None;
        }
        self.data
            .get((y * self.width + x) * self.channels + c)
            .copied()
    }
}

/// 模型输出的预测网格，按行优先存储
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Prediction {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(SegapError::Model(format!(
                "预测形状 {:?} 与数据长度 {} 不符",
                shape,
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// 去掉批次维与末尾的单通道维后的 (高, 宽)
    ///
    /// 接受 `[1, H, W, 1]`、`[H, W, 1]`、`[1, H, W]` 与 `[H, W]`。
    pub fn grid_dims(&self) -> Option<(usize, usize)> {
        match self.shape.as_slice() {
            [1, h, w, 1] => Some((*h, *w)),
            [h, w, 1] => Some((*h, *w)),
            [1, h, w] => Some((*h, *w)),
            [h, w] => Some((*h, *w)),
            _ => None,
        }
    }

    pub fn into_parts(self) -> (Vec<usize>, Vec<f32>) {
        (self.shape, self.data)
    }
}

/// 预训练分割模型
pub trait SegmentationModel: Send + Sync {
    /// 模型期望的输入尺寸（宽, 高）
    fn input_size(&self) -> (u32, u32) {
        DEFAULT_INPUT_SIZE
    }

    /// 对一个批次做逐像素预测
    fn predict(&self, batch: &ImageTensor) -> Result<Prediction>;
}
