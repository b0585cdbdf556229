//! 成就评估
//!
//! 用户统计满足条件时解锁成就，解锁记录通过存储的“不存在才插入”保证幂等。

use std::collections::BTreeSet;

use crate::error::Result;
use crate::models::achievement::{AchievementDefinition, AchievementUnlock, UserStats};
use crate::storage::PersistentStore;

/// 成就评估器
pub struct AchievementEvaluator {
    definitions: Vec<AchievementDefinition>,
}

impl AchievementEvaluator {
    pub fn new(definitions: Vec<AchievementDefinition>) -> Self {
        Self { definitions }
    }

    pub fn definitions(&self) -> &[AchievementDefinition] {
        &self.definitions
    }

    pub fn definition(&self, id: &str) -> Option<&AchievementDefinition> {
        self.definitions.iter().find(|d| d.id == id)
    }

    /// 检查并记录新解锁的成就，返回本次新解锁的 ID
    ///
    /// 统计不变时重复调用返回空集。
    pub async fn verify(
        &self,
        store: &dyn PersistentStore,
        user_email: &str,
        stats: &UserStats,
    ) -> Result<BTreeSet<String>> {
        let existing: BTreeSet<String> = store
            .list_achievements(user_email)
            .await?
            .into_iter()
            .map(|u| u.achievement_id)
            .collect();

        let mut unlocked = BTreeSet::new();
        for definition in &self.definitions {
            if existing.contains(&definition.id) || !definition.criterion.is_met(stats) {
                continue;
            }

            let unlock = AchievementUnlock::new(user_email, &definition.id);
            if store.upsert_achievement_if_absent(&unlock).await? {
                tracing::info!(user = %user_email, achievement = %definition.id, "achievement unlocked");
                unlocked.insert(definition.id.clone());
            }
        }

        Ok(unlocked)
    }
}
