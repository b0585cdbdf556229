use crate::config::config::EngineConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::PathBuf;

/// 配置加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 从默认路径加载配置
    ///
    /// 搜索路径：
    /// 1. 内置默认值
    /// 2. ./hakari.toml
    /// 3. 环境变量（HAKARI_ 前缀，`__` 分隔层级，例如 HAKARI_MODEL__API_KEY）
    pub fn load() -> Result<EngineConfig, figment::Error> {
        Self::load_from(default_config_path())
    }

    /// 从指定路径加载配置
    pub fn load_from(path: PathBuf) -> Result<EngineConfig, figment::Error> {
        Figment::from(Serialized::defaults(EngineConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("HAKARI_").split("__"))
            .extract()
    }

    /// 验证配置
    pub fn validate(config: &EngineConfig) -> Result<(), ConfigValidationError> {
        let probabilities = [
            ("persona.random_shift_probability", config.persona.random_shift_probability),
            ("persona.contradiction_probability", config.persona.contradiction_probability),
            ("persona.affirmation_probability", config.persona.affirmation_probability),
            (
                "composer.affirmation_append_probability",
                config.composer.affirmation_append_probability,
            ),
        ];
        for (name, p) in probabilities {
            if !(0.0..=1.0).contains(&p) {
                return Err(ConfigValidationError::InvalidProbability(name.to_string(), p));
            }
        }

        if config.progression.xp_per_level == 0 {
            return Err(ConfigValidationError::InvalidXpPerLevel);
        }

        if config.progression.max_level == 0 {
            return Err(ConfigValidationError::InvalidMaxLevel);
        }

        if config.progression.gain_min > config.progression.gain_max {
            return Err(ConfigValidationError::InvalidGainRange(
                config.progression.gain_min,
                config.progression.gain_max,
            ));
        }

        if config.composer.max_chars <= config.composer.ellipsis.chars().count() {
            return Err(ConfigValidationError::InvalidMaxChars(config.composer.max_chars));
        }

        if config.model.timeout_secs == 0 {
            return Err(ConfigValidationError::InvalidTimeout);
        }

        if let Some(birth_date) = &config.persona.birth_date {
            chrono::NaiveDate::parse_from_str(birth_date, "%Y-%m-%d")
                .map_err(|_| ConfigValidationError::InvalidBirthDate(birth_date.clone()))?;
        }

        Ok(())
    }
}

/// 配置验证错误
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ConfigValidationError {
    #[error("概率 {0} 无效，必须位于 [0, 1]：{1}")]
    InvalidProbability(String, f64),

    #[error("每级经验值必须大于 0")]
    InvalidXpPerLevel,

    #[error("最高等级必须大于 0")]
    InvalidMaxLevel,

    #[error("经验增量区间无效: [{0}, {1}]")]
    InvalidGainRange(u64, u64),

    #[error("最大字符数无效: {0}")]
    InvalidMaxChars(usize),

    #[error("模型超时必须大于 0")]
    InvalidTimeout,

    #[error("生日格式无效（需要 YYYY-MM-DD）: {0}")]
    InvalidBirthDate(String),
}

/// 获取默认配置文件路径
pub fn default_config_path() -> PathBuf {
    PathBuf::from("hakari.toml")
}
