//! 可观测性模块
//!
//! 提供引擎计数指标（Prometheus 文本格式）和结构化日志初始化。

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;
use crate::error::{AppError, Result};

// ===== Engine Metrics =====

/// 引擎指标
#[derive(Clone, Default, Debug)]
pub struct EngineMetrics {
    pub turns_total: Arc<AtomicU64>,
    pub ignored_messages_total: Arc<AtomicU64>,
    pub model_calls_total: Arc<AtomicU64>,
    pub model_latency_sum: Arc<AtomicU64>,
    pub fallbacks_total: Arc<AtomicU64>,
    pub store_errors_total: Arc<AtomicU64>,
    pub level_ups_total: Arc<AtomicU64>,
    pub achievements_unlocked_total: Arc<AtomicU64>,
    pub registrations_total: Arc<AtomicU64>,
}

impl EngineMetrics {
    /// 记录一轮完成的对话
    pub fn record_turn(&self) {
        self.turns_total.fetch_add(1, Ordering::SeqCst);
    }

    /// 记录被忽略的输入（空消息、未知会话）
    pub fn record_ignored(&self) {
        self.ignored_messages_total.fetch_add(1, Ordering::SeqCst);
    }

    /// 记录模型调用
    pub fn record_model_call(&self, duration_ms: u64) {
        self.model_calls_total.fetch_add(1, Ordering::SeqCst);
        self.model_latency_sum.fetch_add(duration_ms, Ordering::SeqCst);
    }

    pub fn record_fallback(&self) {
        self.fallbacks_total.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_store_error(&self) {
        self.store_errors_total.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_level_ups(&self, levels: u64) {
        self.level_ups_total.fetch_add(levels, Ordering::SeqCst);
    }

    pub fn record_achievements(&self, count: u64) {
        self.achievements_unlocked_total
            .fetch_add(count, Ordering::SeqCst);
    }

    pub fn record_registration(&self) {
        self.registrations_total.fetch_add(1, Ordering::SeqCst);
    }

    /// 生成 Prometheus 格式指标
    pub fn gather(&self) -> String {
        format!(
            r#"# HELP persona_turns_total Completed conversation turns
# TYPE persona_turns_total counter
persona_turns_total {}
# HELP persona_ignored_messages_total Messages dropped at the boundary
# TYPE persona_ignored_messages_total counter
persona_ignored_messages_total {}
# HELP persona_model_latency_seconds Language model call latency in seconds
# TYPE persona_model_latency_seconds histogram
persona_model_latency_seconds_sum {}
persona_model_latency_seconds_count {}
# HELP persona_fallbacks_total Replies served from fallback lines
# TYPE persona_fallbacks_total counter
persona_fallbacks_total {}
# HELP persona_store_errors_total Failed persistence operations
# TYPE persona_store_errors_total counter
persona_store_errors_total {}
# HELP persona_level_ups_total Levels gained across all users
# TYPE persona_level_ups_total counter
persona_level_ups_total {}
# HELP persona_achievements_unlocked_total Achievements unlocked
# TYPE persona_achievements_unlocked_total counter
persona_achievements_unlocked_total {}
# HELP persona_registrations_total Registered users
# TYPE persona_registrations_total counter
persona_registrations_total {}
"#,
            self.turns_total.load(Ordering::SeqCst),
            self.ignored_messages_total.load(Ordering::SeqCst),
            self.model_latency_sum.load(Ordering::SeqCst) as f64 / 1000.0,
            self.model_calls_total.load(Ordering::SeqCst),
            self.fallbacks_total.load(Ordering::SeqCst),
            self.store_errors_total.load(Ordering::SeqCst),
            self.level_ups_total.load(Ordering::SeqCst),
            self.achievements_unlocked_total.load(Ordering::SeqCst),
            self.registrations_total.load(Ordering::SeqCst),
        )
    }
}

// ===== Structured Logging =====

/// 初始化日志
///
/// `RUST_LOG` 优先于配置中的级别。日志写到 stderr；配置了 `log_dir` 时另外按天滚动写文件，
/// 返回的 guard 需要在进程退出前一直持有。
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},{}", config.level, service_name)));

    let json_layer = config
        .structured
        .then(|| fmt::layer().json().with_writer(std::io::stderr));
    let plain_layer = (!config.structured).then(|| {
        fmt::layer()
            .with_target(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
    });

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, format!("{}.log", service_name));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(plain_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| AppError::Internal(format!("failed to initialize tracing subscriber: {}", e)))?;

    tracing::info!(service = %service_name, level = %config.level, "tracing initialized");
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_gather() {
        let metrics = EngineMetrics::default();
        metrics.record_turn();
        metrics.record_turn();
        metrics.record_model_call(1500);
        metrics.record_fallback();
        metrics.record_store_error();
        metrics.record_level_ups(2);
        metrics.record_achievements(3);

        let output = metrics.gather();
        assert!(output.contains("persona_turns_total 2"));
        assert!(output.contains("persona_model_latency_seconds_sum 1.5"));
        assert!(output.contains("persona_model_latency_seconds_count 1"));
        assert!(output.contains("persona_fallbacks_total 1"));
        assert!(output.contains("persona_store_errors_total 1"));
        assert!(output.contains("persona_level_ups_total 2"));
        assert!(output.contains("persona_achievements_unlocked_total 3"));
    }

    #[test]
    fn test_metrics_clone_shares_counters() {
        let metrics = EngineMetrics::default();
        let handle = metrics.clone();
        handle.record_ignored();
        assert_eq!(metrics.ignored_messages_total.load(Ordering::SeqCst), 1);
    }
}
