//! 语言模型客户端模块
//!
//! 引擎只依赖 `send(prompt) -> text` 这一个操作；模型选择、温度与系统指令由调用方配置。

pub mod gemini;

use async_trait::async_trait;

use crate::config::ModelConfig;
use crate::error::{ModelError, Result};

pub use gemini::GeminiClient;

/// 语言模型客户端 trait
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LanguageModelClient: Send + Sync {
    /// 发送提示词并返回模型文本
    async fn send(&self, prompt: &str) -> std::result::Result<String, ModelError>;
}

/// 未配置 API 密钥时使用的客户端，所有调用都返回不可用
pub struct OfflineModelClient;

#[async_trait]
impl LanguageModelClient for OfflineModelClient {
    async fn send(&self, _prompt: &str) -> std::result::Result<String, ModelError> {
        Err(ModelError::ModelUnavailable("no model api key configured".into()))
    }
}

/// 根据配置创建模型客户端
pub fn create_model_client(config: &ModelConfig) -> Result<Box<dyn LanguageModelClient>> {
    if config.api_key.trim().is_empty() {
        tracing::warn!("model api key is empty, replies will use fallback lines");
        return Ok(Box::new(OfflineModelClient));
    }
    let client = GeminiClient::new(config)?;
    Ok(Box::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offline_client_is_unavailable() {
        let client = create_model_client(&ModelConfig::default()).unwrap();
        let result = client.send("hello").await;
        assert!(matches!(result, Err(ModelError::ModelUnavailable(_))));
    }
}
