//! 页面状态机
//!
//! 界面只根据当前页面渲染；页面切换由 (页面, 事件) 的纯函数决定。

use segap_core::{Result, SegapError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 界面页面
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Page {
    Home,
    Login,
    Register,
    Panel,
    SearchPatient,
    RegisterPatient,
    Segmentation,
}

impl Page {
    /// 是否只有登录后才能进入
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            Page::Panel | Page::SearchPatient | Page::RegisterPatient | Page::Segmentation
        )
    }
}

/// 页面切换事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum UiEvent {
    OpenLogin,
    OpenRegister,
    LoginSucceeded,
    Logout,
    OpenSearchPatient,
    OpenRegisterPatient,
    OpenSegmentation,
    Back,
}

/// 页面状态机
#[derive(Debug)]
pub struct PageStateMachine {
    transitions: HashMap<(Page, UiEvent), Page>,
}

impl PageStateMachine {
    /// 创建新的状态机实例
    pub fn new() -> Self {
        let mut transitions = HashMap::new();

        // 未登录
        transitions.insert((Page::Home, UiEvent::OpenLogin), Page::Login);
        transitions.insert((Page::Home, UiEvent::OpenRegister), Page::Register);
        transitions.insert((Page::Login, UiEvent::LoginSucceeded), Page::Panel);
        transitions.insert((Page::Login, UiEvent::Back), Page::Home);
        transitions.insert((Page::Register, UiEvent::Back), Page::Home);

        // 已登录
        transitions.insert((Page::Panel, UiEvent::OpenSearchPatient), Page::SearchPatient);
        transitions.insert((Page::Panel, UiEvent::OpenRegisterPatient), Page::RegisterPatient);
        transitions.insert((Page::Panel, UiEvent::OpenSegmentation), Page::Segmentation);
        transitions.insert((Page::Panel, UiEvent::Logout), Page::Home);
        transitions.insert((Page::SearchPatient, UiEvent::Back), Page::Panel);
        transitions.insert((Page::RegisterPatient, UiEvent::Back), Page::Panel);
        transitions.insert((Page::Segmentation, UiEvent::Back), Page::Panel);

        Self { transitions }
    }

    /// 检查页面转换是否有效
    pub fn can_transition(&self, from: Page, event: UiEvent) -> bool {
        self.transitions.contains_key(&(from, event))
    }

    /// 执行页面转换
    pub fn transition(&self, from: Page, event: UiEvent) -> Result<Page> {
        match self.transitions.get(&(from, event)) {
            Some(to) => Ok(*to),
            None => Err(SegapError::InvalidStateTransition {
                from: format!("{:?}", from),
                event: format!("{:?}", event),
            }),
        }
    }

    /// 获取所有页面
    pub fn get_all_pages() -> Vec<Page> {
        vec![
            Page::Home,
            Page::Login,
            Page::Register,
            Page::Panel,
            Page::SearchPatient,
            Page::RegisterPatient,
            Page::Segmentation,
        ]
    }

    /// 获取页面上的所有可用事件
    pub fn get_possible_events(&self, current: Page) -> Vec<UiEvent> {
        self.transitions
            .keys()
            .filter(|(page, _)| *page == current)
            .map(|(_, event)| *event)
            .collect()
    }
}

impl Default for PageStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        let sm = PageStateMachine::new();

        assert!(sm.can_transition(Page::Home, UiEvent::OpenLogin));
        assert!(sm.can_transition(Page::Login, UiEvent::LoginSucceeded));
        assert!(sm.can_transition(Page::Panel, UiEvent::OpenSegmentation));
    }

    #[test]
    fn test_invalid_transitions() {
        let sm = PageStateMachine::new();

        // 未登录不能直接进入工作页面
        assert!(!sm.can_transition(Page::Home, UiEvent::OpenSegmentation));
        assert!(!sm.can_transition(Page::Home, UiEvent::Back));
        assert!(!sm.can_transition(Page::Register, UiEvent::LoginSucceeded));
    }

    #[test]
    fn test_back_navigation() {
        let sm = PageStateMachine::new();

        assert_eq!(sm.transition(Page::Login, UiEvent::Back).unwrap(), Page::Home);
        assert_eq!(sm.transition(Page::Register, UiEvent::Back).unwrap(), Page::Home);
        for page in [Page::SearchPatient, Page::RegisterPatient, Page::Segmentation] {
            assert_eq!(sm.transition(page, UiEvent::Back).unwrap(), Page::Panel);
        }
    }

    #[test]
    fn test_transition_error() {
        let sm = PageStateMachine::new();

        let result = sm.transition(Page::Segmentation, UiEvent::Logout);
        assert!(matches!(
            result,
            Err(SegapError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_every_page_has_an_exit() {
        let sm = PageStateMachine::new();
        for page in PageStateMachine::get_all_pages() {
            assert!(!sm.get_possible_events(page).is_empty(), "{:?}", page);
        }
    }

    #[test]
    fn test_login_gated_pages() {
        let sm = PageStateMachine::new();
        // 只有登录成功才能从未登录页面进入需要登录的页面
        for ((from, event), to) in &sm.transitions {
            if to.requires_login() && !from.requires_login() {
                assert_eq!(*event, UiEvent::LoginSucceeded);
            }
        }
    }
}
