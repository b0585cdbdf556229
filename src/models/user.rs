use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::achievement::UserStats;
use crate::models::progression::ProgressionState;

/// 注册用户的初始信任度
pub const INITIAL_CONFIDENCE: u8 = 30;

/// 信任度上限
pub const MAX_CONFIDENCE: u8 = 100;

/// 用户实体
///
/// 以 email 作为唯一身份。进度状态随用户一起持久化，
/// 因此每个用户的人格演化相互独立。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    /// 内部标识
    pub id: String,

    /// 邮箱（唯一身份）
    pub email: String,

    /// 显示名称
    pub display_name: String,

    /// 信任度 [0, 100]
    pub confidence: u8,

    /// 累计交互次数
    pub interactions_total: u64,

    /// 人格进度
    pub progression: ProgressionState,

    /// 注册时间
    pub registered_at: DateTime<Utc>,

    /// 最后活跃时间
    pub last_seen_at: DateTime<Utc>,
}

impl User {
    /// 创建新用户
    pub fn new(email: &str, display_name: &str, initial_state: &str) -> Self {
        let now = Utc::now();
        Self {
            id: format!("user_{}", Uuid::new_v4().simple()),
            email: email.to_string(),
            display_name: display_name.to_string(),
            confidence: INITIAL_CONFIDENCE,
            interactions_total: 0,
            progression: ProgressionState::new(initial_state),
            registered_at: now,
            last_seen_at: now,
        }
    }

    /// 更新最后活跃时间
    pub fn touch(&mut self) {
        self.last_seen_at = Utc::now();
    }

    /// 调整信任度，结果始终落在 [0, 100]
    pub fn adjust_confidence(&mut self, delta: i32) {
        let next = (self.confidence as i32 + delta).clamp(0, MAX_CONFIDENCE as i32);
        self.confidence = next as u8;
    }

    /// 成就判定使用的统计快照
    pub fn stats(&self) -> UserStats {
        UserStats {
            interactions_total: self.interactions_total,
            confidence: self.confidence,
        }
    }
}
