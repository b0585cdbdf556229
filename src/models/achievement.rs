//! 成就数据模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 成就判定所需的用户统计
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct UserStats {
    /// 累计交互次数
    pub interactions_total: u64,
    /// 信任度
    pub confidence: u8,
}

/// 解锁条件
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AchievementCriterion {
    /// 交互次数达到阈值
    InteractionsAtLeast { count: u64 },
    /// 信任度达到阈值
    ConfidenceAtLeast { score: u8 },
    /// 全部子条件同时满足
    All { criteria: Vec<AchievementCriterion> },
}

impl AchievementCriterion {
    pub fn is_met(&self, stats: &UserStats) -> bool {
        match self {
            AchievementCriterion::InteractionsAtLeast { count } => {
                stats.interactions_total >= *count
            }
            AchievementCriterion::ConfidenceAtLeast { score } => stats.confidence >= *score,
            AchievementCriterion::All { criteria } => criteria.iter().all(|c| c.is_met(stats)),
        }
    }
}

/// 成就定义
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AchievementDefinition {
    /// 成就标识
    pub id: String,
    /// 名称
    pub name: String,
    /// 描述
    pub description: String,
    /// 解锁条件
    pub criterion: AchievementCriterion,
}

impl AchievementDefinition {
    pub fn new(id: &str, name: &str, description: &str, criterion: AchievementCriterion) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            criterion,
        }
    }
}

/// 解锁记录
///
/// 每个 (用户, 成就) 最多一条。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AchievementUnlock {
    /// 用户邮箱
    pub user_email: String,
    /// 成就标识
    pub achievement_id: String,
    /// 解锁时间
    pub unlocked_at: DateTime<Utc>,
}

impl AchievementUnlock {
    pub fn new(user_email: &str, achievement_id: &str) -> Self {
        Self {
            user_email: user_email.to_string(),
            achievement_id: achievement_id.to_string(),
            unlocked_at: Utc::now(),
        }
    }
}

/// 默认成就集
pub fn default_achievements() -> Vec<AchievementDefinition> {
    use AchievementCriterion::*;

    vec![
        AchievementDefinition::new(
            "first_words",
            "First Words",
            "Sent the first message",
            InteractionsAtLeast { count: 1 },
        ),
        AchievementDefinition::new(
            "regular",
            "Regular",
            "Ten conversations and she still answers",
            InteractionsAtLeast { count: 10 },
        ),
        AchievementDefinition::new(
            "night_owl",
            "Night Owl",
            "Fifty messages exchanged",
            InteractionsAtLeast { count: 50 },
        ),
        AchievementDefinition::new(
            "confidant",
            "Confidant",
            "Confidence reached 50",
            ConfidenceAtLeast { score: 50 },
        ),
        AchievementDefinition::new(
            "kindred_spirit",
            "Kindred Spirit",
            "Confidence reached 80 after at least 40 messages",
            All {
                criteria: vec![
                    ConfidenceAtLeast { score: 80 },
                    InteractionsAtLeast { count: 40 },
                ],
            },
        ),
    ]
}
