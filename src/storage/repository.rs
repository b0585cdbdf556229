use async_trait::async_trait;

use crate::error::Result;
use crate::models::achievement::AchievementUnlock;
use crate::models::turn::ConversationTurn;
use crate::models::user::User;

/// 持久化存储 trait
///
/// 每个操作各自原子，引擎不依赖跨操作事务。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PersistentStore: Send + Sync {
    /// 新增或覆盖用户
    async fn upsert_user(&self, user: &User) -> Result<()>;

    /// 根据邮箱获取用户
    async fn get_user(&self, email: &str) -> Result<Option<User>>;

    /// 追加对话轮次
    async fn append_conversation_turn(&self, turn: &ConversationTurn) -> Result<()>;

    /// 获取最近的轮次（按时间正序）
    async fn get_recent_turns(&self, email: &str, limit: usize) -> Result<Vec<ConversationTurn>>;

    /// 不存在时写入解锁记录，返回是否为新写入
    async fn upsert_achievement_if_absent(&self, unlock: &AchievementUnlock) -> Result<bool>;

    /// 列出用户的解锁记录
    async fn list_achievements(&self, email: &str) -> Result<Vec<AchievementUnlock>>;
}
