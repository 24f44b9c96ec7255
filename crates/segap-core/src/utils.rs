//! 通用工具函数

use chrono::{DateTime, TimeZone};
use regex::Regex;
use std::sync::OnceLock;

use crate::error::{Result, SegapError};
use crate::models::NewPatient;

/// 患者年龄允许范围
pub const MIN_PATIENT_AGE: u8 = 1;
pub const MAX_PATIENT_AGE: u8 = 100;

const MASK_FILE_PATTERN: &str = r"^mask_\d{8}_\d{6}(_\d+)?\.png$";

/// 生成掩膜文件名 `mask_YYYYMMDD_HHMMSS.png`
///
/// `attempt` 大于 0 时追加数字后缀，用于同一秒内的多次保存。
pub fn mask_file_name<Tz>(at: &DateTime<Tz>, attempt: u32) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let stamp = at.format("%Y%m%d_%H%M%S");
    if attempt == 0 {
        format!("mask_{}.png", stamp)
    } else {
        format!("mask_{}_{}.png", stamp, attempt)
    }
}

fn mask_file_regex() -> Option<&'static Regex> {
    static MASK_FILE_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    MASK_FILE_REGEX
        .get_or_init(|| Regex::new(MASK_FILE_PATTERN).ok())
        .as_ref()
}

/// 验证掩膜文件名格式
pub fn is_valid_mask_file_name(name: &str) -> bool {
    mask_file_regex().map_or(false, |re| re.is_match(name))
}

/// 验证新患者的表单字段
pub fn validate_new_patient(patient: &NewPatient) -> Result<()> {
    if patient.name.trim().is_empty() {
        return Err(SegapError::Validation("患者姓名不能为空".to_string()));
    }
    if patient.dni.trim().is_empty() {
        return Err(SegapError::Validation("DNI不能为空".to_string()));
    }
    if !(MIN_PATIENT_AGE..=MAX_PATIENT_AGE).contains(&patient.age) {
        return Err(SegapError::Validation(format!(
            "年龄必须在 {} 到 {} 之间: {}",
            MIN_PATIENT_AGE, MAX_PATIENT_AGE, patient.age
        )));
    }
    Ok(())
}

/// 验证注册时的用户名与两次输入的密码
pub fn validate_registration(username: &str, password: &str, confirm: &str) -> Result<()> {
    if username.trim().is_empty() {
        return Err(SegapError::Validation("用户名不能为空".to_string()));
    }
    if password != confirm {
        return Err(SegapError::Validation("两次输入的密码不一致".to_string()));
    }
    Ok(())
}
