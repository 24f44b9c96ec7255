//! 核心数据模型定义

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SegapError};

/// 用户名到密码的映射，对应用户文档的顶层对象
pub type UserDocument = std::collections::BTreeMap<String, String>;

/// 用户凭据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    pub password: String, // 明文保存，与用户文档格式保持一致
}

/// 性别枚举，序列化为表单中的西班牙语取值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "Masculino")]
    Male,
    #[serde(rename = "Femenino")]
    Female,
    #[serde(rename = "Otro")]
    Other,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "Masculino",
            Sex::Female => "Femenino",
            Sex::Other => "Otro",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sex {
    type Err = SegapError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Masculino" => Ok(Sex::Male),
            "Femenino" => Ok(Sex::Female),
            "Otro" => Ok(Sex::Other),
            other => Err(SegapError::Validation(format!("未知性别: {}", other))),
        }
    }
}

/// 患者档案
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub name: String,
    pub age: u8,
    pub sex: Sex,
    pub dni: String,                // 唯一键
    pub segmentations: Vec<String>, // 掩膜文件路径，按分配顺序
}

/// 新患者登记模型
#[derive(Debug, Clone)]
pub struct NewPatient {
    pub name: String,
    pub age: u8,
    pub sex: Sex,
    pub dni: String,
}

impl NewPatient {
    pub fn new(name: impl Into<String>, age: u8, sex: Sex, dni: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            age,
            sex,
            dni: dni.into(),
        }
    }

    /// 转换为尚无分割结果的患者档案
    pub fn into_patient(self) -> Patient {
        Patient {
            name: self.name,
            age: self.age,
            sex: self.sex,
            dni: self.dni,
            segmentations: Vec::new(),
        }
    }
}
