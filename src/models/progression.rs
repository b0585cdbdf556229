use serde::{Deserialize, Serialize};

/// 人格上下文
///
/// 当前情绪状态与状态机的交互计数。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersonaContext {
    /// 当前情绪状态
    pub current_state: String,
    /// 状态机处理过的消息数
    pub interactions: u64,
}

impl PersonaContext {
    pub fn new(initial_state: &str) -> Self {
        Self {
            current_state: initial_state.to_string(),
            interactions: 0,
        }
    }
}

/// 进度状态
///
/// 经验值只增不减；等级由经验值推导；已解锁能力只增不减。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgressionState {
    /// 累计经验值
    pub experience: u64,

    /// 当前等级 [1, max_level]
    pub level: u8,

    /// 已解锁能力（按解锁顺序）
    pub unlocked_abilities: Vec<String>,

    /// 人格上下文
    pub persona: PersonaContext,
}

impl ProgressionState {
    pub fn new(initial_state: &str) -> Self {
        Self {
            experience: 0,
            level: 1,
            unlocked_abilities: Vec::new(),
            persona: PersonaContext::new(initial_state),
        }
    }

    /// 追加能力，已存在时忽略
    pub fn unlock(&mut self, ability: &str) -> bool {
        if self.unlocked_abilities.iter().any(|a| a == ability) {
            return false;
        }
        self.unlocked_abilities.push(ability.to_string());
        true
    }

    pub fn current_state(&self) -> &str {
        &self.persona.current_state
    }
}

/// 一次演化的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evolution {
    /// 本轮获得的经验值
    pub gained: u64,
    /// 演化后的累计经验值
    pub experience: u64,
    /// 演化后的等级
    pub level: u8,
    /// 是否升级
    pub leveled_up: bool,
    /// 本轮新解锁的能力
    pub unlocked: Vec<String>,
    /// 一次性的演化提示
    pub notice: Option<String>,
}

impl Evolution {
    /// 无变化（静态人格）
    pub fn unchanged(state: &ProgressionState) -> Self {
        Self {
            gained: 0,
            experience: state.experience,
            level: state.level,
            leveled_up: false,
            unlocked: Vec::new(),
            notice: None,
        }
    }

    /// 本轮跨越的等级数
    pub fn levels_gained(&self, previous_level: u8) -> u8 {
        self.level.saturating_sub(previous_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlock_is_idempotent() {
        let mut state = ProgressionState::new("shy");
        assert!(state.unlock("philosophical musings"));
        assert!(!state.unlock("philosophical musings"));
        assert_eq!(state.unlocked_abilities.len(), 1);
    }
}
