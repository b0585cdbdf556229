//! 内存存储
//!
//! 嵌入式存储实现，可选地以 JSON 快照落盘。

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::models::achievement::AchievementUnlock;
use crate::models::turn::ConversationTurn;
use crate::models::user::User;
use crate::storage::repository::PersistentStore;

/// 内存存储实现
#[derive(Debug, Default)]
pub struct InMemoryStore {
    users: DashMap<String, User>,
    turns: DashMap<String, Vec<ConversationTurn>>,
    achievements: DashMap<String, Vec<AchievementUnlock>>,
}

/// 存储快照
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StoreSnapshot {
    pub users: Vec<User>,
    pub turns: Vec<ConversationTurn>,
    pub achievements: Vec<AchievementUnlock>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 导出快照
    pub fn snapshot(&self) -> StoreSnapshot {
        let mut users: Vec<User> = self.users.iter().map(|e| e.value().clone()).collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));

        let mut turns: Vec<ConversationTurn> = self
            .turns
            .iter()
            .flat_map(|e| e.value().clone())
            .collect();
        turns.sort_by(|a, b| {
            a.user_email
                .cmp(&b.user_email)
                .then(a.turn_number.cmp(&b.turn_number))
        });

        let achievements = self
            .achievements
            .iter()
            .flat_map(|e| e.value().clone())
            .collect();

        StoreSnapshot {
            users,
            turns,
            achievements,
        }
    }

    /// 从快照恢复
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let store = Self::new();
        for user in snapshot.users {
            store.users.insert(user.email.clone(), user);
        }
        for turn in snapshot.turns {
            store
                .turns
                .entry(turn.user_email.clone())
                .or_default()
                .push(turn);
        }
        for unlock in snapshot.achievements {
            store
                .achievements
                .entry(unlock.user_email.clone())
                .or_default()
                .push(unlock);
        }
        store
    }

    /// 写入 JSON 快照文件
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        std::fs::write(path, json)?;
        tracing::debug!(path = %path.display(), "store snapshot written");
        Ok(())
    }

    /// 读取 JSON 快照文件，文件不存在时返回空存储
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let json = std::fs::read_to_string(path)?;
        let snapshot: StoreSnapshot = serde_json::from_str(&json)?;
        tracing::info!(
            path = %path.display(),
            users = snapshot.users.len(),
            turns = snapshot.turns.len(),
            "store snapshot loaded"
        );
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}

#[async_trait]
impl PersistentStore for InMemoryStore {
    async fn upsert_user(&self, user: &User) -> Result<()> {
        self.users.insert(user.email.clone(), user.clone());
        Ok(())
    }

    async fn get_user(&self, email: &str) -> Result<Option<User>> {
        Ok(self.users.get(email).map(|u| u.value().clone()))
    }

    async fn append_conversation_turn(&self, turn: &ConversationTurn) -> Result<()> {
        self.turns
            .entry(turn.user_email.clone())
            .or_default()
            .push(turn.clone());
        Ok(())
    }

    async fn get_recent_turns(&self, email: &str, limit: usize) -> Result<Vec<ConversationTurn>> {
        Ok(self
            .turns
            .get(email)
            .map(|turns| {
                let start = turns.len().saturating_sub(limit);
                turns[start..].to_vec()
            })
            .unwrap_or_default())
    }

    async fn upsert_achievement_if_absent(&self, unlock: &AchievementUnlock) -> Result<bool> {
        // entry 持有分片写锁，检查与插入在同一临界区内完成
        let mut unlocks = self
            .achievements
            .entry(unlock.user_email.clone())
            .or_default();
        if unlocks
            .iter()
            .any(|u| u.achievement_id == unlock.achievement_id)
        {
            return Ok(false);
        }
        unlocks.push(unlock.clone());
        Ok(true)
    }

    async fn list_achievements(&self, email: &str) -> Result<Vec<AchievementUnlock>> {
        Ok(self
            .achievements
            .get(email)
            .map(|u| u.value().clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_user_upsert_and_get() {
        let store = InMemoryStore::new();
        let mut user = User::new("ana@example.com", "Ana", "shy");
        store.upsert_user(&user).await.unwrap();

        user.interactions_total = 4;
        store.upsert_user(&user).await.unwrap();

        let loaded = store.get_user("ana@example.com").await.unwrap().unwrap();
        assert_eq!(loaded.interactions_total, 4);
        assert_eq!(store.user_count(), 1);
        assert!(store.get_user("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recent_turns_are_chronological() {
        let store = InMemoryStore::new();
        for n in 1..=5 {
            let turn = ConversationTurn::new("ana@example.com", n, &format!("message {}", n), "shy");
            store.append_conversation_turn(&turn).await.unwrap();
        }

        let recent = store.get_recent_turns("ana@example.com", 2).await.unwrap();
        let numbers: Vec<u64> = recent.iter().map(|t| t.turn_number).collect();
        assert_eq!(numbers, vec![4, 5]);

        let all = store.get_recent_turns("ana@example.com", 50).await.unwrap();
        assert_eq!(all.len(), 5);
        assert!(store.get_recent_turns("x@example.com", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_achievement_insert_if_absent() {
        let store = InMemoryStore::new();
        let unlock = AchievementUnlock::new("ana@example.com", "first_words");

        assert!(store.upsert_achievement_if_absent(&unlock).await.unwrap());
        assert!(!store.upsert_achievement_if_absent(&unlock).await.unwrap());
        assert_eq!(store.list_achievements("ana@example.com").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_achievement_inserts_do_not_duplicate() {
        let store = Arc::new(InMemoryStore::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let unlock = AchievementUnlock::new("ana@example.com", "regular");
                store.upsert_achievement_if_absent(&unlock).await.unwrap()
            }));
        }

        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
        assert_eq!(store.list_achievements("ana@example.com").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_file_roundtrip() {
        let dir = std::env::temp_dir().join(format!("hakari-store-{}", uuid::Uuid::new_v4()));
        let path = dir.join("store.json");

        let store = InMemoryStore::new();
        store
            .upsert_user(&User::new("ana@example.com", "Ana", "shy"))
            .await
            .unwrap();
        store
            .append_conversation_turn(&ConversationTurn::new("ana@example.com", 1, "hi", "shy"))
            .await
            .unwrap();
        store.save_to(&path).unwrap();

        let reopened = InMemoryStore::open(&path).unwrap();
        assert!(reopened.get_user("ana@example.com").await.unwrap().is_some());
        assert_eq!(reopened.get_recent_turns("ana@example.com", 10).await.unwrap().len(), 1);

        let missing = InMemoryStore::open(&dir.join("missing.json")).unwrap();
        assert_eq!(missing.user_count(), 0);

        std::fs::remove_dir_all(&dir).ok();
    }
}
