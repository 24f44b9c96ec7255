//! 患者存储

use segap_core::utils::validate_new_patient;
use segap_core::{NewPatient, Patient, Result, SegapError};
use segap_storage::{load_document, save_document};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// 患者集合及其DNI索引
#[derive(Debug, Default)]
struct PatientIndex {
    records: Vec<Patient>,
    by_dni: HashMap<String, usize>,
}

impl PatientIndex {
    fn from_records(records: Vec<Patient>) -> Self {
        let mut by_dni = HashMap::with_capacity(records.len());
        for (position, patient) in records.iter().enumerate() {
            if by_dni.contains_key(&patient.dni) {
                // 查找时以第一条为准
                warn!("Patient document holds duplicate DNI {}", patient.dni);
                continue;
            }
            by_dni.insert(patient.dni.clone(), position);
        }
        Self { records, by_dni }
    }

    fn get(&self, dni: &str) -> Option<&Patient> {
        self.by_dni.get(dni).map(|&i| &self.records[i])
    }
}

/// 有序患者档案存储
#[derive(Debug)]
pub struct PatientStore {
    path: PathBuf,
    index: RwLock<PatientIndex>,
}

impl PatientStore {
    /// 打开患者文档，不存在时以空集合开始
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let records: Vec<Patient> = load_document(&path).await?;
        info!("Opened patient store {} ({} patients)", path.display(), records.len());

        Ok(Self {
            path,
            index: RwLock::new(PatientIndex::from_records(records)),
        })
    }

    /// 登记新患者
    pub async fn register_patient(&self, new_patient: NewPatient) -> Result<Patient> {
        validate_new_patient(&new_patient)?;

        let mut index = self.index.write().await;
        if index.by_dni.contains_key(&new_patient.dni) {
            return Err(SegapError::DuplicateDni(new_patient.dni));
        }

        let patient = new_patient.into_patient();
        let position = index.records.len();
        index.records.push(patient.clone());
        index.by_dni.insert(patient.dni.clone(), position);

        if let Err(e) = save_document(&self.path, &index.records).await {
            index.records.pop();
            index.by_dni.remove(&patient.dni);
            return Err(e);
        }

        info!("Registered patient {}", patient.dni);
        Ok(patient)
    }

    /// 按DNI查找患者
    pub async fn find_by_dni(&self, dni: &str) -> Result<Patient> {
        let index = self.index.read().await;
        index
            .get(dni)
            .cloned()
            .ok_or_else(|| SegapError::PatientNotFound(dni.to_string()))
    }

    /// 为患者追加一条分割结果路径
    pub async fn assign_segmentation(&self, dni: &str, artifact_path: &str) -> Result<Patient> {
        let mut index = self.index.write().await;
        let position = *index
            .by_dni
            .get(dni)
            .ok_or_else(|| SegapError::PatientNotFound(dni.to_string()))?;

        index.records[position]
            .segmentations
            .push(artifact_path.to_string());

        if let Err(e) = save_document(&self.path, &index.records).await {
            index.records[position].segmentations.pop();
            return Err(e);
        }

        debug!("Assigned {} to patient {}", artifact_path, dni);
        Ok(index.records[position].clone())
    }

    /// 判断DNI是否已登记
    pub async fn contains(&self, dni: &str) -> bool {
        self.index.read().await.by_dni.contains_key(dni)
    }

    /// 按登记顺序返回所有患者
    pub async fn list(&self) -> Vec<Patient> {
        self.index.read().await.records.clone()
    }

    pub async fn len(&self) -> usize {
        self.index.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.index.read().await.records.is_empty()
    }

    /// 清空患者集合并持久化
    pub async fn clear(&self) -> Result<()> {
        let mut index = self.index.write().await;
        save_document(&self.path, &Vec::<Patient>::new()).await?;
        *index = PatientIndex::default();

        info!("Cleared patient store {}", self.path.display());
        Ok(())
    }
}
