//! 分诊服务
//!
//! 界面事件到存储与分割操作的统一入口，每个操作都在当前会话内执行。

use crate::session::{PendingSegmentation, Session};
use crate::state_machine::{Page, PageStateMachine, UiEvent};
use segap_core::utils::validate_registration;
use segap_core::{NewPatient, Patient, Result, SegapError};
use segap_database::Database;
use segap_segmentation::SegmentationPipeline;
use segap_storage::PurgeReport;
use tracing::{info, warn};

/// 分诊服务
#[derive(Debug)]
pub struct TriageService {
    database: Database,
    pipeline: Option<SegmentationPipeline>,
    state_machine: PageStateMachine,
    session: Session,
}

impl TriageService {
    /// 创建新的分诊服务
    pub fn new(database: Database) -> Self {
        Self {
            database,
            pipeline: None,
            state_machine: PageStateMachine::new(),
            session: Session::new(),
        }
    }

    /// 挂载分割流水线
    pub fn with_pipeline(mut self, pipeline: SegmentationPipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// 处理页面导航事件
    ///
    /// 登录成功事件只能由 [`TriageService::login`] 触发。
    pub fn navigate(&mut self, event: UiEvent) -> Result<Page> {
        if event == UiEvent::LoginSucceeded {
            return Err(SegapError::InvalidCredentials);
        }
        self.session.apply(&self.state_machine, event)
    }

    /// 注册新用户
    pub async fn register_user(&self, username: &str, password: &str, confirm: &str) -> Result<()> {
        validate_registration(username, password, confirm)?;
        self.database.users().register(username, password).await?;
        Ok(())
    }

    /// 登录并进入主面板
    pub async fn login(&mut self, username: &str, password: &str) -> Result<Page> {
        if self.session.page() == Page::Home {
            self.session.apply(&self.state_machine, UiEvent::OpenLogin)?;
        }
        if !self
            .state_machine
            .can_transition(self.session.page(), UiEvent::LoginSucceeded)
        {
            return Err(SegapError::InvalidStateTransition {
                from: format!("{:?}", self.session.page()),
                event: format!("{:?}", UiEvent::LoginSucceeded),
            });
        }

        self.database.users().login(username, password).await?;
        self.session.set_user(username);
        self.session.apply(&self.state_machine, UiEvent::LoginSucceeded)
    }

    /// 登出并回到首页
    pub fn logout(&mut self) -> Result<Page> {
        self.ensure_logged_in()?;
        if self.session.page() != Page::Panel {
            self.session.apply(&self.state_machine, UiEvent::Back)?;
        }
        let page = self.session.apply(&self.state_machine, UiEvent::Logout)?;
        info!("Session logged out");
        Ok(page)
    }

    /// 登记新患者
    pub async fn register_patient(&self, patient: NewPatient) -> Result<Patient> {
        self.ensure_logged_in()?;
        self.database.patients().register_patient(patient).await
    }

    /// 按DNI查找患者
    pub async fn find_patient(&self, dni: &str) -> Result<Patient> {
        self.ensure_logged_in()?;
        self.database.patients().find_by_dni(dni).await
    }

    /// 对上传的图像做分割，结果暂存在会话中，返回覆盖率
    ///
    /// 此时不写任何文件；失败时会话中原有的待分配结果被丢弃。
    pub fn process_image(&mut self, image_bytes: &[u8]) -> Result<f64> {
        self.ensure_logged_in()?;
        let pipeline = self
            .pipeline
            .as_ref()
            .ok_or_else(|| SegapError::Model("未加载分割模型".to_string()))?;

        self.session.clear_pending();
        let mask = pipeline.try_segment(image_bytes)?;
        let coverage = mask.coverage();
        self.session.set_pending(PendingSegmentation { mask, coverage });
        Ok(coverage)
    }

    /// 把待分配的分割结果保存为文件并追加到患者档案
    pub async fn assign_pending(&mut self, dni: &str) -> Result<Patient> {
        self.ensure_logged_in()?;
        let pending = self
            .session
            .pending()
            .ok_or(SegapError::SegmentationUnavailable)?;

        // 先确认患者存在，避免产生无人引用的掩膜文件
        if !self.database.patients().contains(dni).await {
            return Err(SegapError::PatientNotFound(dni.to_string()));
        }

        let png = pending.mask.encode_png()?;
        let path = self.database.masks().store_mask(&png).await?;

        match self.database.patients().assign_segmentation(dni, &path).await {
            Ok(patient) => {
                self.session.take_pending();
                info!("Assigned segmentation {} to patient {}", path, dni);
                Ok(patient)
            }
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&path).await {
                    warn!("Failed to remove orphan mask {}: {}", path, cleanup);
                }
                Err(e)
            }
        }
    }

    /// 导出患者档案为PDF
    pub async fn export_patient(&self, dni: &str) -> Result<Vec<u8>> {
        let patient = self.find_patient(dni).await?;
        tokio::task::spawn_blocking(move || segap_export::export_patient_pdf(&patient))
            .await
            .map_err(|e| SegapError::Export(format!("导出任务失败: {e}")))?
    }

    /// 重置数据库：清空患者并删除所有掩膜文件
    pub async fn reset(&mut self, password: &str) -> Result<PurgeReport> {
        self.ensure_logged_in()?;
        let report = self.database.reset(password).await?;
        self.session.clear_pending();
        Ok(report)
    }

    fn ensure_logged_in(&self) -> Result<()> {
        if self.session.is_logged_in() {
            Ok(())
        } else {
            Err(SegapError::InvalidCredentials)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segap_core::Sex;
    use segap_database::DatabaseOptions;
    use segap_segmentation::{ImageTensor, Prediction, SegmentationModel};
    use std::sync::Arc;

    /// 左半边为伤口的桩模型
    struct LeftHalfModel;

    impl SegmentationModel for LeftHalfModel {
        fn input_size(&self) -> (u32, u32) {
            (4, 4)
        }

        fn predict(&self, batch: &ImageTensor) -> Result<Prediction> {
            let mut data = Vec::new();
            for _ in 0..batch.height {
                for x in 0..batch.width {
                    data.push(if x < batch.width / 2 { 1.0 } else { 0.0 });
                }
            }
            Prediction::new(vec![1, batch.height, batch.width, 1], data)
        }
    }

    fn png() -> Vec<u8> {
        let mask = segap_segmentation::Mask::new(8, 8, vec![90; 64]).unwrap();
        mask.encode_png().unwrap()
    }

    async fn service(dir: &std::path::Path) -> TriageService {
        let options = DatabaseOptions {
            data_dir: dir.to_path_buf(),
            users_file: "users.json".to_string(),
            patients_file: "patients.json".to_string(),
            masks_dir: "segmentations".to_string(),
            reset_password: "reset".to_string(),
        };
        let database = Database::open(&options).await.unwrap();
        TriageService::new(database)
            .with_pipeline(SegmentationPipeline::new(Arc::new(LeftHalfModel)))
    }

    async fn logged_in(dir: &std::path::Path) -> TriageService {
        let mut service = service(dir).await;
        service.register_user("ana", "pw", "pw").await.unwrap();
        service.login("ana", "pw").await.unwrap();
        service
    }

    #[tokio::test]
    async fn test_login_flow() {
        let dir = tempfile::tempdir().unwrap();
        let mut service = service(dir.path()).await;
        service.register_user("ana", "pw", "pw").await.unwrap();

        assert!(matches!(
            service.login("ana", "bad").await,
            Err(SegapError::InvalidCredentials)
        ));
        assert!(!service.session().is_logged_in());

        assert_eq!(service.login("ana", "pw").await.unwrap(), Page::Panel);
        assert_eq!(service.session().username(), Some("ana"));

        service.navigate(UiEvent::OpenSegmentation).unwrap();
        assert_eq!(service.logout().unwrap(), Page::Home);
        assert!(!service.session().is_logged_in());
    }

    #[tokio::test]
    async fn test_register_user_checks() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;

        assert!(matches!(
            service.register_user("ana", "pw", "other").await,
            Err(SegapError::Validation(_))
        ));
        service.register_user("ana", "pw", "pw").await.unwrap();
        assert!(matches!(
            service.register_user("ana", "pw2", "pw2").await,
            Err(SegapError::DuplicateUser(_))
        ));
    }

    #[tokio::test]
    async fn test_operations_require_login() {
        let dir = tempfile::tempdir().unwrap();
        let mut service = service(dir.path()).await;

        assert!(matches!(
            service.find_patient("123").await,
            Err(SegapError::InvalidCredentials)
        ));
        assert!(service.process_image(&png()).is_err());
        assert!(service.navigate(UiEvent::LoginSucceeded).is_err());
    }

    #[tokio::test]
    async fn test_assign_without_pending_mask() {
        let dir = tempfile::tempdir().unwrap();
        let mut service = logged_in(dir.path()).await;
        service
            .register_patient(NewPatient::new("Ana", 30, Sex::Female, "123"))
            .await
            .unwrap();

        assert!(matches!(
            service.assign_pending("123").await,
            Err(SegapError::SegmentationUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_assign_to_unknown_patient_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut service = logged_in(dir.path()).await;

        let coverage = service.process_image(&png()).unwrap();
        assert_eq!(coverage, 50.0);

        assert!(matches!(
            service.assign_pending("999").await,
            Err(SegapError::PatientNotFound(_))
        ));
        assert!(service.database().masks().list_masks().await.unwrap().is_empty());
        assert!(service.session().pending().is_some());
    }

    #[tokio::test]
    async fn test_process_and_assign() {
        let dir = tempfile::tempdir().unwrap();
        let mut service = logged_in(dir.path()).await;
        service
            .register_patient(NewPatient::new("Ana", 30, Sex::Female, "123"))
            .await
            .unwrap();

        service.process_image(&png()).unwrap();
        let patient = service.assign_pending("123").await.unwrap();

        assert_eq!(patient.segmentations.len(), 1);
        assert!(service.session().pending().is_none());
        let stored = service.database().masks().list_masks().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].to_string_lossy(), patient.segmentations[0]);
    }

    #[tokio::test]
    async fn test_failed_processing_drops_pending() {
        let dir = tempfile::tempdir().unwrap();
        let mut service = logged_in(dir.path()).await;

        service.process_image(&png()).unwrap();
        assert!(matches!(
            service.process_image(b"garbage"),
            Err(SegapError::ImageProcessing(_))
        ));
        assert!(service.session().pending().is_none());
    }

    #[tokio::test]
    async fn test_missing_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let options = DatabaseOptions {
            data_dir: dir.path().to_path_buf(),
            users_file: "users.json".to_string(),
            patients_file: "patients.json".to_string(),
            masks_dir: "segmentations".to_string(),
            reset_password: "reset".to_string(),
        };
        let mut service = TriageService::new(Database::open(&options).await.unwrap());
        service.register_user("ana", "pw", "pw").await.unwrap();
        service.login("ana", "pw").await.unwrap();

        assert!(matches!(
            service.process_image(&png()),
            Err(SegapError::Model(_))
        ));
    }
}
