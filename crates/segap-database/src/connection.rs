//! 数据目录管理

use crate::patients::PatientStore;
use crate::users::UserStore;
use segap_core::{Result, SegapError};
use segap_storage::{MaskStorage, PurgeReport};
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};

/// 数据目录布局
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub data_dir: PathBuf,
    pub users_file: String,
    pub patients_file: String,
    pub masks_dir: String,
    pub reset_password: String,
}

impl DatabaseOptions {
    pub fn users_path(&self) -> PathBuf {
        self.data_dir.join(&self.users_file)
    }

    pub fn patients_path(&self) -> PathBuf {
        self.data_dir.join(&self.patients_file)
    }

    pub fn masks_path(&self) -> PathBuf {
        self.data_dir.join(&self.masks_dir)
    }

    /// 检查目录布局
    ///
    /// 三个名字都必须是数据目录下的相对路径，不能含 `.` 或 `..`；
    /// 掩膜目录不能是数据目录本身，两个文档也不能位于掩膜目录之内。
    pub fn validate(&self) -> Result<()> {
        let masks = relative_path("masks_dir", &self.masks_dir)?;
        for (field, value) in [
            ("users_file", &self.users_file),
            ("patients_file", &self.patients_file),
        ] {
            let document = relative_path(field, value)?;
            if document.starts_with(masks) {
                return Err(SegapError::Config(format!(
                    "{} ({}) 不能位于掩膜目录 {} 之内",
                    field, value, self.masks_dir
                )));
            }
        }
        if self.users_file == self.patients_file {
            return Err(SegapError::Config(format!(
                "users_file 与 patients_file 不能相同: {}",
                self.users_file
            )));
        }
        Ok(())
    }
}

/// 只接受由普通路径段组成的非空相对路径
fn relative_path<'a>(field: &str, value: &'a str) -> Result<&'a Path> {
    let path = Path::new(value);
    let plain = path.components().next().is_some()
        && path.components().all(|c| matches!(c, Component::Normal(_)));
    if !plain || value.trim().is_empty() {
        return Err(SegapError::Config(format!(
            "{} 必须是数据目录下的相对路径: {:?}",
            field, value
        )));
    }
    Ok(path)
}

/// 用户、患者与掩膜目录的统一入口
#[derive(Debug)]
pub struct Database {
    users: UserStore,
    patients: PatientStore,
    masks: MaskStorage,
    reset_password: String,
}

impl Database {
    pub async fn open(options: &DatabaseOptions) -> Result<Self> {
        options.validate()?;
        tokio::fs::create_dir_all(&options.data_dir).await?;

        let users = UserStore::open(options.users_path()).await?;
        let patients = PatientStore::open(options.patients_path()).await?;
        let masks = MaskStorage::new(options.masks_path());

        info!("Opened data directory {}", options.data_dir.display());
        Ok(Self {
            users,
            patients,
            masks,
            reset_password: options.reset_password.clone(),
        })
    }

    pub fn users(&self) -> &UserStore {
        &self.users
    }

    pub fn patients(&self) -> &PatientStore {
        &self.patients
    }

    pub fn masks(&self) -> &MaskStorage {
        &self.masks
    }

    /// 清空患者集合并删除所有掩膜文件
    ///
    /// 需提供共享的重置密码。先扫描掩膜目录，目录无法读取时直接失败，
    /// 患者数据保持不变；之后清空患者并逐个删除文件，失败项记录在返回的报告中。
    pub async fn reset(&self, password: &str) -> Result<PurgeReport> {
        if password != self.reset_password {
            warn!("Rejected database reset: wrong password");
            return Err(SegapError::InvalidCredentials);
        }

        let plan = self.masks.prepare_purge().await?;
        self.patients.clear().await?;
        let report = plan.execute().await;
        for failure in &report.failures {
            warn!("Reset left a file behind: {}", failure);
        }

        info!("Database reset: {} mask files deleted", report.deleted);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segap_core::{NewPatient, Sex};

    fn options(dir: &std::path::Path) -> DatabaseOptions {
        DatabaseOptions {
            data_dir: dir.to_path_buf(),
            users_file: "users.json".to_string(),
            patients_file: "patients.json".to_string(),
            masks_dir: "segmentations".to_string(),
            reset_password: "reset".to_string(),
        }
    }

    #[tokio::test]
    async fn test_reset_empties_everything() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&options(dir.path())).await.unwrap();

        db.patients()
            .register_patient(NewPatient::new("Ana", 30, Sex::Female, "123"))
            .await
            .unwrap();
        let path = db.masks().store_mask(b"mask").await.unwrap();
        db.patients().assign_segmentation("123", &path).await.unwrap();

        let report = db.reset("reset").await.unwrap();
        assert_eq!(report.deleted, 1);
        assert!(db.patients().is_empty().await);
        assert!(db.masks().list_masks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reset_requires_password() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&options(dir.path())).await.unwrap();
        db.patients()
            .register_patient(NewPatient::new("Ana", 30, Sex::Female, "123"))
            .await
            .unwrap();

        let result = db.reset("guess").await;
        assert!(matches!(result, Err(SegapError::InvalidCredentials)));
        assert_eq!(db.patients().len().await, 1);
    }

    #[tokio::test]
    async fn test_reset_on_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&options(dir.path())).await.unwrap();

        let report = db.reset("reset").await.unwrap();
        assert_eq!(report.deleted, 0);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_masks_dir_must_stay_inside_data_dir() {
        let dir = tempfile::tempdir().unwrap();

        for masks_dir in [".", "", "..", "../masks", "segmentations/../..", "/", "/tmp/masks", "./segmentations"] {
            let mut opts = options(dir.path());
            opts.masks_dir = masks_dir.to_string();
            assert!(
                matches!(opts.validate(), Err(SegapError::Config(_))),
                "masks_dir {:?} should be rejected",
                masks_dir
            );
            assert!(Database::open(&opts).await.is_err());
        }

        let mut opts = options(dir.path());
        opts.masks_dir = "data/segmentations".to_string();
        assert!(opts.validate().is_ok());
    }

    #[tokio::test]
    async fn test_documents_must_not_live_in_masks_dir() {
        let dir = tempfile::tempdir().unwrap();

        let mut opts = options(dir.path());
        opts.users_file = "segmentations/users.json".to_string();
        assert!(matches!(opts.validate(), Err(SegapError::Config(_))));
        assert!(Database::open(&opts).await.is_err());

        let mut opts = options(dir.path());
        opts.patients_file = "segmentations/patients.json".to_string();
        assert!(opts.validate().is_err());

        let mut opts = options(dir.path());
        opts.users_file = "../users.json".to_string();
        assert!(opts.validate().is_err());

        let mut opts = options(dir.path());
        opts.patients_file = opts.users_file.clone();
        assert!(opts.validate().is_err());

        // 同名前缀但不是子路径
        let mut opts = options(dir.path());
        opts.users_file = "segmentations-users.json".to_string();
        assert!(opts.validate().is_ok());
    }

    #[tokio::test]
    async fn test_reset_keeps_users() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(dir.path());
        let db = Database::open(&opts).await.unwrap();
        db.users().register("ana", "pw").await.unwrap();
        db.masks().store_mask(b"mask").await.unwrap();

        let report = db.reset("reset").await.unwrap();
        assert_eq!(report.deleted, 1);

        let reopened = Database::open(&opts).await.unwrap();
        assert_eq!(reopened.users().len().await, 1);
        assert!(reopened.users().verify("ana", "pw").await);
        assert!(dir.path().join("users.json").is_file());
        assert!(dir.path().join("patients.json").is_file());
    }

    #[tokio::test]
    async fn test_unreadable_masks_dir_leaves_patients() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(dir.path());
        let db = Database::open(&opts).await.unwrap();
        db.patients()
            .register_patient(NewPatient::new("Ana", 30, Sex::Female, "123"))
            .await
            .unwrap();

        // 掩膜目录位置被普通文件占用
        std::fs::write(opts.masks_path(), b"x").unwrap();

        assert!(db.reset("reset").await.is_err());
        assert_eq!(db.patients().len().await, 1);
        assert!(PatientStore::open(opts.patients_path())
            .await
            .unwrap()
            .contains("123")
            .await);
        assert!(opts.masks_path().is_file());
    }
}
