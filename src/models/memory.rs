//! 情感记忆数据模型
//!
//! 长期记忆条目与计数表。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// 长期记忆条目
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LongTermMemoryItem {
    /// 记忆唯一标识
    pub id: String,

    /// 所属用户邮箱
    pub user_email: String,

    /// 摘录
    pub excerpt: String,

    /// 分类标签
    pub category: String,

    /// 重要性权重
    pub importance: u32,

    /// 创建时间
    pub created_at: DateTime<Utc>,

    /// 更新时间
    pub updated_at: DateTime<Utc>,
}

impl LongTermMemoryItem {
    pub fn new(user_email: &str, excerpt: &str, category: &str, importance: u32) -> Self {
        let now = Utc::now();
        Self {
            id: format!("mem_{}", Uuid::new_v4()),
            user_email: user_email.to_string(),
            excerpt: excerpt.to_string(),
            category: category.to_string(),
            importance,
            created_at: now,
            updated_at: now,
        }
    }

    /// 再次提及同一内容时刷新
    pub fn reinforce(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// 单调递增的标签计数表
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct Tally {
    counts: BTreeMap<String, u64>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    /// 计数加一
    pub fn increment(&mut self, label: &str) -> u64 {
        let count = self.counts.entry(label.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn count(&self, label: &str) -> u64 {
        self.counts.get(label).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// 出现次数最多的标签（并列时取字典序最小者）
    pub fn dominant(&self) -> Option<&str> {
        self.counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(label, _)| label.as_str())
    }
}

/// 情绪计数
pub type EmotionTally = Tally;

/// 话题偏好计数
///
/// 仅用于观测，不影响人格行为。
pub type TopicTally = Tally;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally_increment() {
        let mut tally = Tally::new();
        assert_eq!(tally.increment("shy"), 1);
        assert_eq!(tally.increment("shy"), 2);
        assert_eq!(tally.increment("curious"), 1);

        assert_eq!(tally.count("shy"), 2);
        assert_eq!(tally.count("ironic"), 0);
        assert_eq!(tally.total(), 3);
        assert_eq!(tally.dominant(), Some("shy"));
    }

    #[test]
    fn test_tally_dominant_tie_is_stable() {
        let mut tally = Tally::new();
        tally.increment("music");
        tally.increment("books");
        assert_eq!(tally.dominant(), Some("books"));
        assert_eq!(Tally::new().dominant(), None);
    }

    #[test]
    fn test_memory_item_create() {
        let item = LongTermMemoryItem::new("ana@example.com", "never forget this", "keyword", 3);
        assert_eq!(item.importance, 3);
        assert_eq!(item.created_at, item.updated_at);
        assert!(item.id.starts_with("mem_"));
    }
}
