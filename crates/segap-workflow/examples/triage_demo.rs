//! 分诊流程演示程序
//!
//! 使用阈值桩模型走一遍注册、登记、分割、分配与导出，不需要真实模型文件

use segap_core::{NewPatient, Result, Sex};
use segap_database::{Database, DatabaseOptions};
use segap_segmentation::{ImageTensor, Mask, Prediction, SegmentationModel, SegmentationPipeline};
use segap_workflow::{TriageService, UiEvent};
use std::sync::Arc;

/// 红色通道阈值模型
struct RedThresholdModel;

impl SegmentationModel for RedThresholdModel {
    fn predict(&self, batch: &ImageTensor) -> Result<Prediction> {
        let mut data = Vec::with_capacity(batch.height * batch.width);
        for y in 0..batch.height {
            for x in 0..batch.width {
                let red = batch.get(y, x, 0).unwrap_or(0.0);
                data.push(if red > 0.6 { 1.0 } else { 0.0 });
            }
        }
        Prediction::new(vec![1, batch.height, batch.width, 1], data)
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    tracing_subscriber::fmt::init();

    let data_dir = std::env::temp_dir().join("segap-demo");
    let options = DatabaseOptions {
        data_dir: data_dir.clone(),
        users_file: "users.json".to_string(),
        patients_file: "patients.json".to_string(),
        masks_dir: "segmentations".to_string(),
        reset_password: "demo".to_string(),
    };

    println!("🚀 SEGAp 分诊流程演示\n");

    let database = Database::open(&options).await?;
    let mut service = TriageService::new(database)
        .with_pipeline(SegmentationPipeline::new(Arc::new(RedThresholdModel)));

    // 1. 注册并登录
    service.navigate(UiEvent::OpenRegister)?;
    if let Err(e) = service.register_user("demo", "demo", "demo").await {
        println!("ℹ️  {}", e);
    }
    service.navigate(UiEvent::Back)?;
    let page = service.login("demo", "demo").await?;
    println!("✅ 登录成功，当前页面: {:?}", page);

    // 2. 登记患者
    let patient = match service
        .register_patient(NewPatient::new("Ana", 30, Sex::Female, "DEMO-123"))
        .await
    {
        Ok(patient) => patient,
        Err(e) => {
            println!("ℹ️  {}", e);
            service.find_patient("DEMO-123").await?
        }
    };
    println!("✅ 患者: {} (DNI {})", patient.name, patient.dni);

    // 3. 合成一张中心偏红的照片并分割
    let mut pixels = vec![40u8; 64 * 64];
    for y in 16..48 {
        for x in 16..48 {
            pixels[y * 64 + x] = 220;
        }
    }
    let photo = Mask::new(64, 64, pixels)?.encode_png()?;

    service.navigate(UiEvent::OpenSegmentation)?;
    let coverage = service.process_image(&photo)?;
    println!("📋 分割完成，覆盖率 {:.2}%", coverage);

    // 4. 分配给患者并导出
    let patient = service.assign_pending(&patient.dni).await?;
    println!("✅ 已分配，共 {} 条分割结果", patient.segmentations.len());

    let pdf = service.export_patient(&patient.dni).await?;
    let pdf_path = data_dir.join(format!("{}.pdf", patient.dni));
    std::fs::write(&pdf_path, &pdf)?;
    println!("📄 PDF 已导出到 {}", pdf_path.display());

    service.logout()?;
    println!("\n🎉 演示完成");
    Ok(())
}
