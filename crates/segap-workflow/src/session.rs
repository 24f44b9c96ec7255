//! 界面会话状态

use crate::state_machine::{Page, PageStateMachine, UiEvent};
use segap_core::Result;
use segap_segmentation::Mask;

/// 已计算但尚未分配给患者的分割结果
#[derive(Debug, Clone)]
pub struct PendingSegmentation {
    pub mask: Mask,
    pub coverage: f64,
}

/// 单个用户的会话
#[derive(Debug, Clone)]
pub struct Session {
    page: Page,
    username: Option<String>,
    pending: Option<PendingSegmentation>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            page: Page::Home,
            username: None,
            pending: None,
        }
    }

    pub fn page(&self) -> Page {
        self.page
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.username.is_some()
    }

    pub fn pending(&self) -> Option<&PendingSegmentation> {
        self.pending.as_ref()
    }

    /// 应用页面事件；登出时清除用户与待分配结果
    pub fn apply(&mut self, state_machine: &PageStateMachine, event: UiEvent) -> Result<Page> {
        let next = state_machine.transition(self.page, event)?;
        if event == UiEvent::Logout {
            self.username = None;
            self.pending = None;
        }
        self.page = next;
        Ok(next)
    }

    pub(crate) fn set_user(&mut self, username: &str) {
        self.username = Some(username.to_string());
    }

    pub(crate) fn set_pending(&mut self, pending: PendingSegmentation) {
        self.pending = Some(pending);
    }

    pub(crate) fn take_pending(&mut self) -> Option<PendingSegmentation> {
        self.pending.take()
    }

    pub(crate) fn clear_pending(&mut self) {
        self.pending = None;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logout_clears_session() {
        let sm = PageStateMachine::new();
        let mut session = Session::new();

        session.apply(&sm, UiEvent::OpenLogin).unwrap();
        session.set_user("ana");
        session.apply(&sm, UiEvent::LoginSucceeded).unwrap();
        session.set_pending(PendingSegmentation {
            mask: Mask::new(1, 1, vec![255]).unwrap(),
            coverage: 100.0,
        });

        assert_eq!(session.apply(&sm, UiEvent::Logout).unwrap(), Page::Home);
        assert!(!session.is_logged_in());
        assert!(session.pending().is_none());
    }

    #[test]
    fn test_invalid_event_keeps_page() {
        let sm = PageStateMachine::new();
        let mut session = Session::new();

        assert!(session.apply(&sm, UiEvent::Back).is_err());
        assert_eq!(session.page(), Page::Home);
    }
}
