use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// 情绪状态定义
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersonaStateDef {
    /// 状态名
    pub name: String,
    /// 表情符号
    pub emoji: String,
    /// 简短描述
    pub description: String,
    /// 最低解锁等级（1 表示基础状态）
    #[serde(default = "default_min_level")]
    pub min_level: u8,
}

fn default_min_level() -> u8 {
    1
}

impl PersonaStateDef {
    pub fn new(name: &str, emoji: &str, description: &str, min_level: u8) -> Self {
        Self {
            name: name.to_string(),
            emoji: emoji.to_string(),
            description: description.to_string(),
            min_level,
        }
    }

    /// 是否为基础状态
    pub fn is_base(&self) -> bool {
        self.min_level <= 1
    }

    /// 在给定等级下是否可用
    pub fn is_available_at(&self, level: u8) -> bool {
        self.min_level <= level
    }
}

/// 人格状态快照
///
/// 供展示层渲染状态面板。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersonaStatus {
    pub persona_name: String,
    pub state: String,
    pub emoji: String,
    pub description: String,
    pub age: Option<u32>,
    pub interactions: u64,
    pub level: u8,
    pub experience: u64,
    pub unlocked_abilities: Vec<String>,
    /// 最常出现的情绪
    pub dominant_emotion: Option<String>,
}

/// 根据生日计算年龄
///
/// 生日在今天之后时返回 `None`。
pub fn age_on(birth_date: NaiveDate, today: NaiveDate) -> Option<u32> {
    if today < birth_date {
        return None;
    }
    let mut age = today.year() - birth_date.year();
    if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }
    u32::try_from(age).ok()
}
