//! # SEGAp工作流模块
//!
//! 提供界面背后的全部流程：
//! - 页面状态机：显式的页面枚举与纯转换函数
//! - 会话：当前页面、登录用户与待分配的分割结果
//! - 分诊服务：用户、患者、分割、导出与重置操作的统一入口

pub mod engine;
pub mod session;
pub mod state_machine;

// 重新导出主要类型
pub use engine::TriageService;
pub use session::{PendingSegmentation, Session};
pub use state_machine::{Page, PageStateMachine, UiEvent};
