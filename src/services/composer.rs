//! 回复合成
//!
//! 顺序：特殊事件提示 → 演化提示 → 矛盾前缀 → 截断后的模型文本 → 自我肯定。
//! 最后统一做字符数硬上限截断。

use std::sync::Arc;

use crate::config::ComposerConfig;
use crate::rng::EngineRng;
use crate::templates::PersonaTemplates;

/// 合成输入
#[derive(Debug, Clone, Default)]
pub struct CompositionInput<'a> {
    /// 模型原始输出，调用失败时为 None
    pub raw: Option<&'a str>,
    /// 当前情绪状态
    pub state: &'a str,
    /// 矛盾前缀
    pub contradiction: Option<&'a str>,
    /// 自我肯定
    pub affirmation: Option<&'a str>,
    /// 演化提示
    pub evolution_banner: Option<&'a str>,
    /// 特殊事件提示（成就）
    pub special_banner: Option<&'a str>,
    /// 用于选择固定回复的序号
    pub fallback_seed: u64,
}

/// 合成结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedReply {
    pub text: String,
    /// 是否使用了固定回复
    pub used_fallback: bool,
    /// 是否触发了硬上限截断
    pub truncated: bool,
}

/// 回复合成器
pub struct ResponseComposer {
    config: ComposerConfig,
    templates: Arc<PersonaTemplates>,
    rng: EngineRng,
}

impl ResponseComposer {
    pub fn new(config: ComposerConfig, templates: Arc<PersonaTemplates>, rng: EngineRng) -> Self {
        Self {
            config,
            templates,
            rng,
        }
    }

    /// 合成最终回复
    pub fn assemble(&self, input: &CompositionInput<'_>) -> ComposedReply {
        let (body, used_fallback) = match input.raw.map(str::trim).filter(|r| !r.is_empty()) {
            Some(raw) => (self.shorten(raw), false),
            None => {
                tracing::debug!(state = %input.state, "using fallback line");
                (self.fallback_line(input.fallback_seed).to_string(), true)
            }
        };

        let mut banners: Vec<&str> = Vec::new();
        banners.extend(input.special_banner);
        banners.extend(input.evolution_banner);

        let mut sentence: Vec<&str> = Vec::new();
        sentence.extend(input.contradiction);
        sentence.push(&body);
        if let Some(affirmation) = input.affirmation {
            if self.rng.chance(self.config.affirmation_append_probability) {
                sentence.push(affirmation);
            }
        }

        let sentence = sentence.join(" ");
        let composed = if banners.is_empty() {
            sentence
        } else {
            format!("{}\n{}", banners.join("\n"), sentence)
        };

        let (text, truncated) = self.cap(composed);
        ComposedReply {
            text,
            used_fallback,
            truncated,
        }
    }

    /// 按 ". " 分句，超过上限时只保留前几句并以句号结尾
    pub fn shorten(&self, raw: &str) -> String {
        let sentences: Vec<&str> = raw.split(". ").collect();
        if sentences.len() > self.config.max_sentences {
            format!("{}.", sentences[..self.config.max_sentences].join(". "))
        } else {
            raw.to_string()
        }
    }

    /// 硬上限，只在字符边界截断
    fn cap(&self, text: String) -> (String, bool) {
        if text.chars().count() <= self.config.max_chars {
            return (text, false);
        }
        let keep = self
            .config
            .max_chars
            .saturating_sub(self.config.ellipsis.chars().count());
        let mut out: String = text.chars().take(keep).collect();
        out.push_str(&self.config.ellipsis);
        (out, true)
    }

    /// 固定回复，同一序号总是得到同一行
    pub fn fallback_line(&self, seed: u64) -> &str {
        let lines = &self.templates.fallback_lines;
        if lines.is_empty() {
            return "...";
        }
        &lines[(seed % lines.len() as u64) as usize]
    }
}
