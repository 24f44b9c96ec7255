//! JSON文档读写
//!
//! 用户与患者数据均以整份JSON文档持久化。写入先落到同目录的临时文件，再原子重命名。

use segap_core::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// 读取JSON文档，文件不存在时返回默认值
pub async fn load_document<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let document = serde_json::from_slice(&bytes)?;
            debug!("Loaded document from {}", path.display());
            Ok(document)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("Document {} not found, starting empty", path.display());
            Ok(T::default())
        }
        Err(e) => Err(e.into()),
    }
}

/// 整份写入JSON文档
pub async fn save_document<T>(path: &Path, document: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let bytes = serde_json::to_vec_pretty(document)?;
    let tmp = temp_path_for(path);
    tokio::fs::write(&tmp, &bytes).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }

    debug!("Saved document to {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string());
    path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()))
}
