use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::achievement::{AchievementDefinition, default_achievements};

/// 人格配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaConfig {
    /// 人格生日（YYYY-MM-DD），用于计算年龄
    pub birth_date: Option<String>,
    /// 无关键词命中时随机切换状态的概率
    pub random_shift_probability: f64,
    /// 提及敏感话题时产生矛盾前缀的概率
    pub contradiction_probability: f64,
    /// 生成自我肯定的概率
    pub affirmation_probability: f64,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            birth_date: Some("2007-05-01".into()),
            random_shift_probability: 0.3,
            contradiction_probability: 0.3,
            affirmation_probability: 0.2,
        }
    }
}

/// 进度配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionConfig {
    /// 每级所需经验值
    pub xp_per_level: u64,
    /// 最高等级
    pub max_level: u8,
    /// 每轮最少获得经验
    pub gain_min: u64,
    /// 每轮最多获得经验
    pub gain_max: u64,
    /// 每轮信任度增量
    pub confidence_per_turn: i32,
    /// 每次升级的信任度增量
    pub confidence_per_level: i32,
    /// 每个新成就的信任度增量
    pub confidence_per_achievement: i32,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            xp_per_level: 50,
            max_level: 5,
            gain_min: 1,
            gain_max: 3,
            confidence_per_turn: 1,
            confidence_per_level: 5,
            confidence_per_achievement: 3,
        }
    }
}

/// 情感记忆配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// 超过该字符数即视为值得长期保存
    pub salience_min_chars: usize,
    /// 长期记忆的重要性权重
    pub importance: u32,
    /// 每次召回的最大条数
    pub recall_limit: usize,
    /// 摘录最大字符数
    pub excerpt_max_chars: usize,
    /// 构造提示词时附带的近期轮次数
    pub recent_turns: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            salience_min_chars: 20,
            importance: 3,
            recall_limit: 2,
            excerpt_max_chars: 120,
            recent_turns: 6,
        }
    }
}

/// 回复合成配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposerConfig {
    /// 保留的最大句子数
    pub max_sentences: usize,
    /// 最终回复的最大字符数
    pub max_chars: usize,
    /// 追加自我肯定的概率
    pub affirmation_append_probability: f64,
    /// 截断标记
    pub ellipsis: String,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            max_sentences: 2,
            max_chars: 200,
            affirmation_append_probability: 0.3,
            ellipsis: "...".into(),
        }
    }
}

/// 语言模型配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// API 密钥
    pub api_key: String,
    /// 模型名称
    pub model: String,
    /// API 地址
    pub endpoint: String,
    /// 系统指令
    pub system_instruction: String,
    /// 采样温度
    pub temperature: f32,
    /// 最大输出 Token 数
    pub max_output_tokens: u32,
    /// 调用超时（秒）
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-2.0-flash".into(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".into(),
            system_instruction: "You are Hakari, an 18-year-old girl: shy, dry dark humor, \
                                 loves psychological anime, alternative music and books. \
                                 Short sentences, two or three at most. Never be too agreeable."
                .into(),
            temperature: 0.8,
            max_output_tokens: 150,
            timeout_secs: 15,
        }
    }
}

/// 功能开关
///
/// 同一个引擎通过开关组合出不同的变体。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    /// 长期记忆与召回
    pub long_term_memory: bool,
    /// 成就系统
    pub achievements: bool,
    /// 人格演化（关闭时为静态人格）
    pub evolving_persona: bool,
    /// 矛盾前缀
    pub contradictions: bool,
    /// 自我肯定
    pub self_affirmations: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            long_term_memory: true,
            achievements: true,
            evolving_persona: true,
            contradictions: true,
            self_affirmations: true,
        }
    }
}

impl FeatureFlags {
    /// 最初的静态人格变体
    pub fn static_persona() -> Self {
        Self {
            long_term_memory: false,
            achievements: false,
            evolving_persona: false,
            contradictions: true,
            self_affirmations: true,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: String,
    /// 结构化日志格式
    pub structured: bool,
    /// 日志文件目录
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            structured: false,
            log_dir: None,
        }
    }
}

/// 引擎配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 人格配置
    pub persona: PersonaConfig,
    /// 进度配置
    pub progression: ProgressionConfig,
    /// 情感记忆配置
    pub memory: MemoryConfig,
    /// 回复合成配置
    pub composer: ComposerConfig,
    /// 语言模型配置
    pub model: ModelConfig,
    /// 功能开关
    pub features: FeatureFlags,
    /// 日志配置
    pub logging: LoggingConfig,
    /// 成就集
    pub achievements: Vec<AchievementDefinition>,
    /// 人格模板文件
    pub templates_path: Option<PathBuf>,
    /// 存储快照文件（为空时只保存在内存）
    pub store_path: Option<PathBuf>,
    /// 随机种子（为空时随机）
    pub rng_seed: Option<u64>,
    /// 应用名称
    pub app_name: String,
    /// 环境
    pub environment: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            persona: PersonaConfig::default(),
            progression: ProgressionConfig::default(),
            memory: MemoryConfig::default(),
            composer: ComposerConfig::default(),
            model: ModelConfig::default(),
            features: FeatureFlags::default(),
            logging: LoggingConfig::default(),
            achievements: default_achievements(),
            templates_path: None,
            store_path: None,
            rng_seed: None,
            app_name: "hakari".into(),
            environment: "development".into(),
        }
    }
}

impl EngineConfig {
    /// 创建开发环境配置
    pub fn development() -> Self {
        let mut config = Self::default();
        config.logging.level = "debug".into();
        config.rng_seed = Some(7);
        config
    }

    /// 创建生产环境配置
    pub fn production() -> Self {
        let mut config = Self::default();
        config.environment = "production".into();
        config.logging.level = "info".into();
        config.logging.structured = true;
        config.logging.log_dir = Some(PathBuf::from("./logs"));
        config.store_path = Some(PathBuf::from("./data/hakari.json"));
        config
    }
}
