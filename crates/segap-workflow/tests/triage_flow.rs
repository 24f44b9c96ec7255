//! 完整分诊流程：注册 → 登录 → 登记患者 → 分割 → 分配 → 查询 → 导出 → 重置

use segap_core::{NewPatient, Result, SegapError, Sex};
use segap_database::{Database, DatabaseOptions};
use segap_segmentation::{ImageTensor, Mask, Prediction, SegmentationModel, SegmentationPipeline};
use segap_workflow::{Page, TriageService, UiEvent};
use std::sync::Arc;

/// 亮度超过一半即视为伤口
struct BrightnessModel;

impl SegmentationModel for BrightnessModel {
    fn predict(&self, batch: &ImageTensor) -> Result<Prediction> {
        let mut data = Vec::with_capacity(batch.height * batch.width);
        for y in 0..batch.height {
            for x in 0..batch.width {
                let v = batch.get(y, x, 0).unwrap_or(0.0);
                data.push(if v > 0.5 { 1.0 } else { 0.0 });
            }
        }
        Prediction::new(vec![1, batch.height, batch.width, 1], data)
    }
}

fn photo(fill: u8) -> Vec<u8> {
    Mask::new(32, 32, vec![fill; 32 * 32])
        .unwrap()
        .encode_png()
        .unwrap()
}

async fn open(dir: &std::path::Path) -> TriageService {
    let options = DatabaseOptions {
        data_dir: dir.to_path_buf(),
        users_file: "users.json".to_string(),
        patients_file: "patients.json".to_string(),
        masks_dir: "segmentations".to_string(),
        reset_password: "borrar".to_string(),
    };
    TriageService::new(Database::open(&options).await.unwrap())
        .with_pipeline(SegmentationPipeline::new(Arc::new(BrightnessModel)))
}

#[tokio::test]
async fn full_triage_flow() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = open(dir.path()).await;

    service.navigate(UiEvent::OpenRegister).unwrap();
    service.register_user("medico", "clave", "clave").await.unwrap();
    assert_eq!(service.navigate(UiEvent::Back).unwrap(), Page::Home);
    assert_eq!(service.login("medico", "clave").await.unwrap(), Page::Panel);

    service.navigate(UiEvent::OpenRegisterPatient).unwrap();
    service
        .register_patient(NewPatient::new("Ana", 30, Sex::Female, "123"))
        .await
        .unwrap();
    assert!(matches!(
        service
            .register_patient(NewPatient::new("Ana B", 31, Sex::Female, "123"))
            .await,
        Err(SegapError::DuplicateDni(_))
    ));
    service.navigate(UiEvent::Back).unwrap();

    service.navigate(UiEvent::OpenSegmentation).unwrap();
    assert_eq!(service.process_image(&photo(255)).unwrap(), 100.0);
    service.assign_pending("123").await.unwrap();
    assert_eq!(service.process_image(&photo(0)).unwrap(), 0.0);
    service.assign_pending("123").await.unwrap();

    let patient = service.find_patient("123").await.unwrap();
    assert_eq!(patient.segmentations.len(), 2);
    assert_ne!(patient.segmentations[0], patient.segmentations[1]);
    for path in &patient.segmentations {
        let mask = Mask::decode(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!((mask.width(), mask.height()), (224, 224));
    }

    let pdf = service.export_patient("123").await.unwrap();
    assert!(pdf.starts_with(b"%PDF"));

    // 重新打开后数据保持一致
    let mut reopened = open(dir.path()).await;
    reopened.login("medico", "clave").await.unwrap();
    assert_eq!(reopened.find_patient("123").await.unwrap(), patient);

    assert!(matches!(
        reopened.reset("adivina").await,
        Err(SegapError::InvalidCredentials)
    ));
    let report = reopened.reset("borrar").await.unwrap();
    assert_eq!(report.deleted, 2);
    assert!(reopened.database().patients().is_empty().await);
    assert_eq!(
        std::fs::read_dir(dir.path().join("segmentations"))
            .unwrap()
            .count(),
        0
    );
}

#[tokio::test]
async fn single_assignment_is_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let service = open(dir.path()).await;
    let patients = service.database().patients();

    patients
        .register_patient(NewPatient::new("Ana", 30, Sex::Female, "123"))
        .await
        .unwrap();
    patients
        .assign_segmentation("123", "segmentations/mask_20240101_000000.png")
        .await
        .unwrap();

    let found = patients.find_by_dni("123").await.unwrap();
    assert_eq!(
        found.segmentations,
        vec!["segmentations/mask_20240101_000000.png".to_string()]
    );
}
