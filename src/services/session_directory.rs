//! 会话目录
//!
//! 不透明令牌到用户邮箱的映射。只保存在内存中，进程重启后丢失。

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::session::Session;

/// 会话目录 trait
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionDirectory: Send + Sync {
    /// 为用户签发新令牌
    async fn open(&self, user_email: &str) -> Result<Session>;

    /// 绑定外部签发的令牌
    async fn bind(&self, token: &str, user_email: &str) -> Result<Session>;

    /// 令牌对应的用户邮箱
    async fn resolve(&self, token: &str) -> Result<Option<String>>;

    /// 注销令牌
    async fn revoke(&self, token: &str) -> Result<bool>;
}

/// 内存会话目录
#[derive(Debug, Default)]
pub struct InMemorySessionDirectory {
    sessions: DashMap<String, Session>,
}

impl InMemorySessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionDirectory for InMemorySessionDirectory {
    async fn open(&self, user_email: &str) -> Result<Session> {
        let token = Uuid::new_v4().simple().to_string();
        self.bind(&token, user_email).await
    }

    async fn bind(&self, token: &str, user_email: &str) -> Result<Session> {
        if token.trim().is_empty() {
            return Err(AppError::Validation("session token is empty".into()));
        }
        let session = Session::new(token, user_email);
        self.sessions.insert(token.to_string(), session.clone());
        tracing::debug!(user = %user_email, "session bound");
        Ok(session)
    }

    async fn resolve(&self, token: &str) -> Result<Option<String>> {
        Ok(self.sessions.get(token).map(|s| s.user_email.clone()))
    }

    async fn revoke(&self, token: &str) -> Result<bool> {
        Ok(self.sessions.remove(token).is_some())
    }
}

/// 创建会话目录
pub fn create_session_directory() -> Box<dyn SessionDirectory> {
    Box::new(InMemorySessionDirectory::new())
}
