//! 门诊状态机
//!
//! 管理门诊就诊的生命周期状态转换：候诊 → 就诊中 → 已完成，候诊 → 已取消

use clinic_core::{ClinicError, OutpatientStatus, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 门诊状态转换事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum VisitEvent {
    Examine,
    Finish,
    Cancel,
}

/// 门诊状态机
#[derive(Debug)]
pub struct OutpatientStateMachine {
    transitions: HashMap<(OutpatientStatus, VisitEvent), OutpatientStatus>,
}

impl OutpatientStateMachine {
    /// 创建新的状态机实例
    pub fn new() -> Self {
        let mut transitions = HashMap::new();

        // 定义状态转换规则
        transitions.insert((OutpatientStatus::Waiting, VisitEvent::Examine), OutpatientStatus::OnExamination);
        transitions.insert((OutpatientStatus::OnExamination, VisitEvent::Finish), OutpatientStatus::Finished);
        transitions.insert((OutpatientStatus::Waiting, VisitEvent::Cancel), OutpatientStatus::Canceled);

        Self { transitions }
    }

    /// 检查状态转换是否有效
    pub fn can_transition(&self, from: OutpatientStatus, event: VisitEvent) -> bool {
        self.transitions.contains_key(&(from, event))
    }

    /// 执行状态转换
    pub fn transition(&self, from: OutpatientStatus, event: VisitEvent) -> Result<OutpatientStatus> {
        match self.transitions.get(&(from, event)) {
            Some(to) => Ok(*to),
            None => Err(ClinicError::InvalidStateTransition {
                from: format!("{:?}", from),
                event: format!("{:?}", event),
            }),
        }
    }

    /// 获取状态的所有可能事件
    pub fn possible_events(&self, current_state: OutpatientStatus) -> Vec<VisitEvent> {
        let mut events: Vec<VisitEvent> = self
            .transitions
            .keys()
            .filter(|(state, _)| *state == current_state)
            .map(|(_, event)| *event)
            .collect();
        events.sort_by_key(|event| *event as u8);
        events
    }

    /// 终止状态：没有任何可用事件
    pub fn is_terminal(&self, state: OutpatientStatus) -> bool {
        self.possible_events(state).is_empty()
    }
}

impl Default for OutpatientStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
