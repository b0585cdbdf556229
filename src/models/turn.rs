use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 对话轮次实体
///
/// 只追加，不修改历史。人格回复在模型调用结束后补齐。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationTurn {
    /// 轮次唯一标识
    pub id: String,

    /// 所属用户邮箱
    pub user_email: String,

    /// 轮次序号（从 1 开始）
    pub turn_number: u64,

    /// 用户消息
    pub user_text: String,

    /// 人格回复
    pub persona_text: String,

    /// 记录时的情绪状态
    pub emotion: String,

    /// 时间戳
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    /// 创建新轮次（回复为空）
    pub fn new(user_email: &str, turn_number: u64, user_text: &str, emotion: &str) -> Self {
        Self {
            id: format!("turn_{}", Uuid::new_v4()),
            user_email: user_email.to_string(),
            turn_number,
            user_text: user_text.to_string(),
            persona_text: String::new(),
            emotion: emotion.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// 是否已有人格回复
    pub fn is_answered(&self) -> bool {
        !self.persona_text.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_create() {
        let turn = ConversationTurn::new("ana@example.com", 1, "Hello, world!", "shy");
        assert_eq!(turn.turn_number, 1);
        assert_eq!(turn.user_text, "Hello, world!");
        assert_eq!(turn.emotion, "shy");
        assert!(!turn.is_answered());
    }
}
