//! Hakari - 会成长的对话人格引擎
//!
//! 为聊天界面提供一个有情绪、有记忆、会随对话演化的人格。引擎本身不暴露网络协议，
//! 由展示层通过会话令牌调用。

pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod observability;
pub mod rng;
pub mod services;
pub mod storage;
pub mod templates;
