//! 分割掩膜

use image::{DynamicImage, GrayImage, ImageOutputFormat};
use segap_core::{Result, SegapError};
use std::io::Cursor;

/// 8位灰度掩膜，非零像素表示伤口区域
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Mask {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        if pixels.len() != width as usize * height as usize {
            return Err(SegapError::ImageProcessing(format!(
                "掩膜尺寸 {}x{} 与像素数 {} 不符",
                width,
                height,
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// 非零像素所占百分比
    pub fn coverage(&self) -> f64 {
        coverage(&self.pixels)
    }

    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            image::Luma([self.pixels[(y * self.width + x) as usize]])
        })
    }

    pub fn from_gray_image(image: GrayImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            pixels: image.into_raw(),
        }
    }

    /// 编码为PNG
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        DynamicImage::ImageLuma8(self.to_gray_image())
            .write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)
            .map_err(|e| SegapError::ImageProcessing(format!("PNG编码失败: {e}")))?;
        Ok(buf)
    }

    /// 从PNG等图像字节解码，彩色图像转为灰度
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| SegapError::ImageProcessing(format!("掩膜解码失败: {e}")))?;
        Ok(Self::from_gray_image(image.to_luma8()))
    }
}

/// 覆盖率：强度大于0的像素数 / 总像素数 × 100
///
/// 空掩膜的覆盖率为0。
pub fn coverage(pixels: &[u8]) -> f64 {
    if pixels.is_empty() {
        return 0.0;
    }
    let covered = pixels.iter().filter(|&&p| p > 0).count();
    covered as f64 / pixels.len() as f64 * 100.0
}
