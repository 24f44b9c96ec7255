//! 患者档案PDF导出

use image::DynamicImage;
use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference,
};
use segap_core::{Patient, Result, SegapError};
use segap_segmentation::Mask;
use std::io::BufWriter;
use tracing::{info, warn};

const MM_PER_INCH: f32 = 25.4;

/// 页面布局参数，单位毫米
#[derive(Debug, Clone)]
pub struct PdfLayout {
    pub page_width: f32,
    pub page_height: f32,
    pub margin_left: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub line_height: f32,
    pub image_width: f32,
}

impl Default for PdfLayout {
    fn default() -> Self {
        Self {
            page_width: 210.0,
            page_height: 297.0,
            margin_left: 20.0,
            margin_top: 17.0,
            margin_bottom: 20.0,
            line_height: 7.0,
            image_width: 80.0,
        }
    }
}

/// 当前写入位置
struct PageCursor<'a> {
    doc: &'a PdfDocumentReference,
    layout: &'a PdfLayout,
    layer: PdfLayerReference,
    y: f32,
    pages: usize,
}

impl<'a> PageCursor<'a> {
    fn top(layout: &PdfLayout) -> f32 {
        layout.page_height - layout.margin_top
    }

    /// 剩余空间不足时换页
    fn reserve(&mut self, height: f32) {
        if self.y - height >= self.layout.margin_bottom {
            return;
        }
        let (page, layer) = self.doc.add_page(
            Mm(self.layout.page_width),
            Mm(self.layout.page_height),
            "Layer 1",
        );
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = Self::top(self.layout);
        self.pages += 1;
    }

    fn text(&mut self, text: &str, size: f32, font: &IndirectFontRef) {
        self.reserve(self.layout.line_height);
        self.y -= self.layout.line_height;
        self.layer
            .use_text(text, size, Mm(self.layout.margin_left), Mm(self.y), font);
    }

    fn gap(&mut self, height: f32) {
        self.y -= height;
    }

    fn image(&mut self, image: &DynamicImage) {
        let (width_px, height_px) = (image.width().max(1), image.height().max(1));
        let dpi = width_px as f32 * MM_PER_INCH / self.layout.image_width;
        let height_mm = height_px as f32 * MM_PER_INCH / dpi;

        self.reserve(height_mm);
        self.y -= height_mm;
        Image::from_dynamic_image(image).add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(self.layout.margin_left)),
                translate_y: Some(Mm(self.y)),
                dpi: Some(dpi),
                ..Default::default()
            },
        );
    }
}

/// 使用默认布局导出患者PDF
pub fn export_patient_pdf(patient: &Patient) -> Result<Vec<u8>> {
    export_patient_pdf_with_layout(patient, &PdfLayout::default())
}

/// 导出患者PDF，返回PDF字节
///
/// 掩膜按档案中的路径从磁盘读取；无法读取的文件以一行说明代替。
pub fn export_patient_pdf_with_layout(patient: &Patient, layout: &PdfLayout) -> Result<Vec<u8>> {
    render(patient, layout).map(|rendered| rendered.bytes)
}

struct RenderedPdf {
    bytes: Vec<u8>,
    pages: usize,
}

fn render(patient: &Patient, layout: &PdfLayout) -> Result<RenderedPdf> {
    let title = format!("Paciente {}", patient.dni);
    let (doc, page1, layer1) = PdfDocument::new(
        &title,
        Mm(layout.page_width),
        Mm(layout.page_height),
        "Layer 1",
    );
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| SegapError::Export(format!("PDF font error: {e}")))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| SegapError::Export(format!("PDF font error: {e}")))?;

    let mut cursor = PageCursor {
        doc: &doc,
        layout,
        layer: doc.get_page(page1).get_layer(layer1),
        y: PageCursor::top(layout),
        pages: 1,
    };

    // 患者信息
    cursor.text("Historia del paciente", 16.0, &bold);
    cursor.gap(3.0);
    cursor.text(&format!("Nombre: {}", patient.name), 11.0, &font);
    cursor.text(&format!("Edad: {}", patient.age), 11.0, &font);
    cursor.text(&format!("Sexo: {}", patient.sex), 11.0, &font);
    cursor.text(&format!("DNI: {}", patient.dni), 11.0, &font);
    cursor.gap(5.0);

    // 分割结果
    cursor.text(
        &format!("Segmentaciones ({})", patient.segmentations.len()),
        13.0,
        &bold,
    );
    for (i, path) in patient.segmentations.iter().enumerate() {
        cursor.gap(3.0);
        match load_mask(path) {
            Ok(mask) => {
                cursor.text(
                    &format!("{}. {} (cobertura {:.2}%)", i + 1, path, mask.coverage()),
                    10.0,
                    &font,
                );
                let image = DynamicImage::ImageRgb8(
                    DynamicImage::ImageLuma8(mask.to_gray_image()).to_rgb8(),
                );
                cursor.image(&image);
            }
            Err(e) => {
                warn!("Skipping mask {} in export: {}", path, e);
                cursor.text(
                    &format!("{}. {} (imagen no disponible)", i + 1, path),
                    10.0,
                    &font,
                );
            }
        }
    }

    let pages = cursor.pages;
    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| SegapError::Export(format!("PDF save error: {e}")))?;
    let bytes = buf
        .into_inner()
        .map_err(|e| SegapError::Export(format!("PDF buffer error: {e}")))?;

    info!(
        "Exported patient {} to PDF ({} pages, {} bytes)",
        patient.dni,
        pages,
        bytes.len()
    );
    Ok(RenderedPdf { bytes, pages })
}

fn load_mask(path: &str) -> Result<Mask> {
    let bytes = std::fs::read(path)?;
    Mask::decode(&bytes)
}
