//! 用户存储

use segap_core::{Result, SegapError, UserDocument, UserRecord};
use segap_storage::{load_document, save_document};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{info, warn};

/// 用户名到密码的文档存储
#[derive(Debug)]
pub struct UserStore {
    path: PathBuf,
    users: RwLock<UserDocument>,
}

impl UserStore {
    /// 打开用户文档，不存在时以空集合开始
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let users: UserDocument = load_document(&path).await?;

        // 注意：密码以明文保存，与现有用户文档格式兼容
        warn!(
            "User store {} keeps passwords in plaintext ({} users)",
            path.display(),
            users.len()
        );

        Ok(Self {
            path,
            users: RwLock::new(users),
        })
    }

    /// 注册新用户
    pub async fn register(&self, username: &str, password: &str) -> Result<UserRecord> {
        let mut users = self.users.write().await;
        if users.contains_key(username) {
            return Err(SegapError::DuplicateUser(username.to_string()));
        }

        users.insert(username.to_string(), password.to_string());
        if let Err(e) = save_document(&self.path, &*users).await {
            users.remove(username);
            return Err(e);
        }

        info!("Registered user {}", username);
        Ok(UserRecord {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    /// 校验用户名与密码
    pub async fn verify(&self, username: &str, password: &str) -> bool {
        let users = self.users.read().await;
        users.get(username).map(|p| p == password).unwrap_or(false)
    }

    /// 登录校验，失败时返回 `InvalidCredentials`
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        if self.verify(username, password).await {
            info!("User {} logged in", username);
            Ok(())
        } else {
            warn!("Rejected login for {}", username);
            Err(SegapError::InvalidCredentials)
        }
    }

    pub async fn contains(&self, username: &str) -> bool {
        self.users.read().await.contains_key(username)
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}
