use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 会话实体
///
/// 不透明令牌到用户的映射，仅保存在内存中，进程重启后丢失。
/// 令牌由外部签发，引擎只负责解析。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    /// 会话令牌
    pub token: String,

    /// 所属用户邮箱
    pub user_email: String,

    /// 会话创建时间
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// 创建新会话
    pub fn new(token: &str, user_email: &str) -> Self {
        Self {
            token: token.to_string(),
            user_email: user_email.to_string(),
            created_at: Utc::now(),
        }
    }
}
