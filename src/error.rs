//! 错误处理模块
//!
//! 定义引擎的错误类型。模型调用失败在本地降级处理，存储失败只作为状态标记上报，
//! 两者都不会中断回复的生成。

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 语言模型调用错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// 模型不可用（服务端错误、空响应等）
    #[error("模型不可用: {0}")]
    ModelUnavailable(String),

    /// 网络错误
    #[error("网络错误: {0}")]
    NetworkError(String),

    /// 速率限制
    #[error("模型请求过于频繁，请稍后再试")]
    RateLimited,

    /// 调用超时
    #[error("模型调用超时（{0} 秒）")]
    Timeout(u64),
}

impl From<reqwest::Error> for ModelError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ModelError::NetworkError(format!("request timed out: {}", e))
        } else if e.is_decode() {
            ModelError::ModelUnavailable(format!("malformed response: {}", e))
        } else {
            ModelError::NetworkError(e.to_string())
        }
    }
}

/// 应用程序错误类型
#[derive(Error, Debug)]
pub enum AppError {
    /// 存储错误
    #[error("存储错误: {0}")]
    Store(String),

    /// 资源不存在
    #[error("资源不存在: {0}")]
    NotFound(String),

    /// 参数验证错误
    #[error("参数验证失败: {0}")]
    Validation(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    Serialization(String),

    /// 模型错误
    #[error(transparent)]
    Model(#[from] ModelError),

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(String),
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Serialization(e.to_string())
    }
}

impl From<figment::Error> for AppError {
    fn from(e: figment::Error) -> Self {
        AppError::Config(e.to_string())
    }
}

impl AppError {
    /// 是否属于存储层错误
    pub fn is_store_error(&self) -> bool {
        matches!(self, AppError::Store(_) | AppError::Serialization(_) | AppError::Io(_))
    }
}

/// 存储状态标记
///
/// 随回复一起返回给调用方；持久化失败时回复仍然送达。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StoreStatus {
    /// 全部持久化成功
    #[default]
    Ok,
    /// 至少一次持久化失败
    Degraded,
}

impl StoreStatus {
    /// 合并一次存储操作的结果
    pub fn absorb<T>(&mut self, result: &Result<T>) {
        if result.is_err() {
            *self = StoreStatus::Degraded;
        }
    }

    pub fn is_ok(&self) -> bool {
        *self == StoreStatus::Ok
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_status_absorb() {
        let mut status = StoreStatus::Ok;
        status.absorb(&Ok::<(), AppError>(()));
        assert!(status.is_ok());

        status.absorb(&Err::<(), AppError>(AppError::Store("disk full".into())));
        assert_eq!(status, StoreStatus::Degraded);

        // 一旦降级不会再恢复
        status.absorb(&Ok::<(), AppError>(()));
        assert_eq!(status, StoreStatus::Degraded);
    }

    #[test]
    fn test_model_error_converts_to_app_error() {
        let err: AppError = ModelError::RateLimited.into();
        assert!(matches!(err, AppError::Model(ModelError::RateLimited)));
        assert!(!err.is_store_error());
    }
}
