//! 分割掩膜存储管理

use chrono::Local;
use segap_core::utils::{is_valid_mask_file_name, mask_file_name};
use segap_core::{Result, SegapError};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// 同一秒内保存时尝试的最大后缀数
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// 掩膜目录管理器
#[derive(Debug, Clone)]
pub struct MaskStorage {
    base_path: PathBuf,
}

/// 清空目录的结果
#[derive(Debug, Default)]
pub struct PurgeReport {
    /// 已删除的文件数
    pub deleted: usize,
    /// 删除失败的文件
    pub failures: Vec<SegapError>,
}

impl PurgeReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl MaskStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// 保存PNG掩膜，返回写入的路径
    ///
    /// 文件名按时间戳生成；同名文件已存在时追加数字后缀。
    pub async fn store_mask(&self, png: &[u8]) -> Result<String> {
        tokio::fs::create_dir_all(&self.base_path).await?;

        let now = Local::now();
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let full_path = self.base_path.join(mask_file_name(&now, attempt));
            let mut options = tokio::fs::OpenOptions::new();
            options.write(true).create_new(true);

            match options.open(&full_path).await {
                Ok(file) => {
                    write_or_discard(file, &full_path, png).await?;

                    let path = full_path.to_string_lossy().to_string();
                    info!("Stored mask {} ({} bytes)", path, png.len());
                    return Ok(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    debug!("Mask name {} taken, retrying", full_path.display());
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(SegapError::Storage(format!(
            "无法在 {} 中分配掩膜文件名",
            self.base_path.display()
        )))
    }

    /// 读取掩膜文件
    pub async fn read_mask(&self, path: &str) -> Result<Vec<u8>> {
        let data = tokio::fs::read(path).await?;
        Ok(data)
    }

    /// 列出目录中的掩膜文件，按文件名排序
    pub async fn list_masks(&self) -> Result<Vec<PathBuf>> {
        let mut masks = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.base_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(masks),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if entry.file_type().await?.is_file() && is_valid_mask_file_name(&name) {
                masks.push(entry.path());
            }
        }

        masks.sort();
        Ok(masks)
    }

    /// 删除目录中的所有文件
    ///
    /// 单个文件删除失败只记录在报告中，不中断其余文件的删除。
    pub async fn purge(&self) -> Result<PurgeReport> {
        Ok(self.prepare_purge().await?.execute().await)
    }

    /// 列出待删除的文件，尚不删除任何内容
    ///
    /// 目录无法打开时返回错误；目录不存在时得到空计划。
    /// 遍历中单个条目出错记入计划，执行后出现在报告里。
    pub async fn prepare_purge(&self) -> Result<PurgePlan> {
        let mut plan = PurgePlan {
            base_path: self.base_path.clone(),
            files: Vec::new(),
            failures: Vec::new(),
        };
        let mut entries = match tokio::fs::read_dir(&self.base_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(plan),
            Err(e) => return Err(e.into()),
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!("Stopped scanning {}: {}", self.base_path.display(), e);
                    plan.failures.push(deletion_failure(&self.base_path, &e));
                    break;
                }
            };

            let path = entry.path();
            match entry.file_type().await {
                Ok(file_type) if file_type.is_file() => plan.files.push(path),
                Ok(_) => {}
                Err(e) => {
                    warn!("Cannot stat {}: {}", path.display(), e);
                    plan.failures.push(deletion_failure(&path, &e));
                }
            }
        }

        Ok(plan)
    }
}

/// 已扫描、待执行的清空操作
#[derive(Debug)]
pub struct PurgePlan {
    base_path: PathBuf,
    files: Vec<PathBuf>,
    failures: Vec<SegapError>,
}

impl PurgePlan {
    /// 待删除的文件
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// 逐个删除文件，失败项记入报告
    pub async fn execute(self) -> PurgeReport {
        let mut report = PurgeReport {
            deleted: 0,
            failures: self.failures,
        };
        for path in &self.files {
            remove_entry(path, &mut report).await;
        }

        info!(
            "Purged mask directory {}: {} deleted, {} failed",
            self.base_path.display(),
            report.deleted,
            report.failures.len()
        );
        report
    }
}

/// 删除单个文件，结果记入报告
async fn remove_entry(path: &Path, report: &mut PurgeReport) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => report.deleted += 1,
        Err(e) => {
            warn!("Failed to delete {}: {}", path.display(), e);
            report.failures.push(deletion_failure(path, &e));
        }
    }
}

fn deletion_failure(path: &Path, e: &std::io::Error) -> SegapError {
    SegapError::FileDeletion {
        path: path.to_string_lossy().to_string(),
        reason: e.to_string(),
    }
}

/// 写入新建的掩膜文件；写入失败时删除残留文件
async fn write_or_discard<W>(mut file: W, path: &Path, png: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let written = match file.write_all(png).await {
        Ok(()) => file.flush().await,
        Err(e) => Err(e),
    };
    drop(file);

    if let Err(e) = written {
        if let Err(cleanup) = tokio::fs::remove_file(path).await {
            warn!("Failed to remove partial mask {}: {}", path.display(), cleanup);
        }
        return Err(e.into());
    }
    Ok(())
}
