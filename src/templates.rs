//! 人格文本模板
//!
//! 所有人格文案、关键词表与能力表都以数据形式存放，与状态机和进度引擎分离。
//! 可以通过 TOML 文件整体或部分覆盖默认值。

use figment::{
    Figment,
    providers::{Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::persona::PersonaStateDef;

/// 关键词规则
///
/// 按优先级排列，命中第一条即停止。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeywordRule {
    /// 规则类别
    pub category: String,
    /// 关键词（小写）
    pub keywords: Vec<String>,
    /// 目标状态
    pub target: String,
}

/// 话题关键词
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopicKeywords {
    pub topic: String,
    pub keywords: Vec<String>,
}

/// 等级能力
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LevelAbility {
    pub level: u8,
    pub ability: String,
}

/// 提示词模板
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PromptTemplates {
    /// 状态行，占位符：{persona} {state} {description}
    pub state_line: String,
    /// 长期记忆段落标题，占位符：{persona}
    pub memory_header: String,
    /// 近期对话段落标题
    pub history_header: String,
    /// 请求行，占位符：{message}
    pub request: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            state_line: "[{persona} is feeling {state}: {description}]".into(),
            memory_header: "Things {persona} remembers about this person:".into(),
            history_header: "Recent conversation:".into(),
            request: "Reply briefly and naturally: {message}".into(),
        }
    }
}

/// 人格模板集合
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PersonaTemplates {
    /// 人格名称
    pub persona_name: String,
    /// 初始状态
    pub initial_state: String,
    /// 全部状态（基础 + 高级）
    pub states: Vec<PersonaStateDef>,
    /// 关键词规则（按优先级）
    pub rules: Vec<KeywordRule>,
    /// 敏感话题
    pub sensitive_topics: Vec<String>,
    /// 矛盾前缀，占位符：{topic}
    pub contradictions: Vec<String>,
    /// 自我肯定
    pub affirmations: Vec<String>,
    /// 模型失败时的固定回复
    pub fallback_lines: Vec<String>,
    /// 长期记忆关键词
    pub salience_keywords: Vec<String>,
    /// 话题偏好关键词（仅观测用）
    pub topic_keywords: Vec<TopicKeywords>,
    /// 召回时忽略的词
    pub stopwords: Vec<String>,
    /// 等级能力表
    pub abilities: Vec<LevelAbility>,
    /// 演化提示，占位符：{persona} {level} {ability}
    pub evolution_notice: String,
    /// 成就提示，占位符：{name}
    pub achievement_banner: String,
    /// 提示词
    pub prompt: PromptTemplates,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn rule(category: &str, keywords: &[&str], target: &str) -> KeywordRule {
    KeywordRule {
        category: category.to_string(),
        keywords: strings(keywords),
        target: target.to_string(),
    }
}

fn topic(name: &str, keywords: &[&str]) -> TopicKeywords {
    TopicKeywords {
        topic: name.to_string(),
        keywords: strings(keywords),
    }
}

impl Default for PersonaTemplates {
    fn default() -> Self {
        Self {
            persona_name: "Hakari".into(),
            initial_state: "shy".into(),
            states: vec![
                PersonaStateDef::new("shy", "🌙", "Not sure she wants to talk", 1),
                PersonaStateDef::new("ironic", "😏", "Dark humor activated", 1),
                PersonaStateDef::new("nostalgic", "📚", "Remembering things", 1),
                PersonaStateDef::new("defensive", "🛡️", "Protecting her space", 1),
                PersonaStateDef::new("curious", "🔍", "Interested despite herself", 1),
                PersonaStateDef::new("philosophical", "🌌", "Wondering about existence", 2),
                PersonaStateDef::new("creative", "🎨", "Thinking in images and verses", 3),
                PersonaStateDef::new("wistful", "🍂", "Missing something she can't name", 4),
                PersonaStateDef::new("serene", "🕊️", "At peace, for once", 5),
            ],
            rules: vec![
                rule("explanation", &["why", "explain", "reason"], "defensive"),
                rule("memory_recall", &["remember", "before", "when"], "nostalgic"),
                rule("curiosity", &["interesting", "tell me", "you know"], "curious"),
                rule(
                    "philosophy",
                    &["existence", "exist", "meaning", "philosophy", "universe"],
                    "philosophical",
                ),
                rule(
                    "creative",
                    &["art", "poem", "poetry", "paint", "draw", "compose"],
                    "creative",
                ),
                rule(
                    "nostalgia",
                    &["i miss", "childhood", "used to", "old days", "nostalg"],
                    "wistful",
                ),
            ],
            sensitive_topics: strings(&[
                "family",
                "father",
                "mother",
                "past",
                "school",
                "feelings",
            ]),
            contradictions: strings(&[
                "I don't want to talk about {topic}... well, maybe a little.",
                "I hate when people bring up {topic}, but since we're here...",
                "{topic} doesn't matter to me, seriously. Though if you insist...",
            ]),
            affirmations: strings(&[
                "That's just how I am, I don't like being pushed.",
                "I've always been weird, what can you do.",
                "I'd rather be myself even if people don't get why.",
            ]),
            fallback_lines: strings(&[
                "I don't know what to say right now... the connection feels weird.",
                "Give me a second. My head is somewhere else.",
                "Hm. Forget it, I lost my train of thought.",
            ]),
            salience_keywords: strings(&["important", "remember", "never forget"]),
            topic_keywords: vec![
                topic(
                    "anime",
                    &["anime", "manga", "evangelion", "monogatari", "perfect blue"],
                ),
                topic(
                    "music",
                    &["music", "song", "album", "band", "radiohead", "mitski"],
                ),
                topic(
                    "books",
                    &["book", "novel", "read", "murakami", "camus", "unamuno"],
                ),
                topic("art", &["art", "poem", "poetry", "paint", "draw"]),
            ],
            stopwords: strings(&[
                "the", "and", "but", "for", "with", "that", "this", "you", "your", "are", "was",
                "were", "have", "has", "had", "not", "what", "when", "why", "how", "about",
                "from", "they", "them", "just", "really", "very", "its", "it's", "i'm", "don't",
            ]),
            abilities: vec![
                LevelAbility {
                    level: 2,
                    ability: "philosophical musings".into(),
                },
                LevelAbility {
                    level: 3,
                    ability: "creative expression".into(),
                },
                LevelAbility {
                    level: 4,
                    ability: "wistful storytelling".into(),
                },
                LevelAbility {
                    level: 5,
                    ability: "serene acceptance".into(),
                },
            ],
            evolution_notice: "✨ {persona} evolved to level {level}: {ability}.".into(),
            achievement_banner: "🏆 {name} unlocked!".into(),
            prompt: PromptTemplates::default(),
        }
    }
}

impl PersonaTemplates {
    /// 从 TOML 文件加载，未出现的字段使用默认值
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut templates: PersonaTemplates =
            Figment::from(Serialized::defaults(PersonaTemplates::default()))
                .merge(Toml::file(path))
                .extract()?;
        templates.normalize_keywords();
        templates.validate()?;
        Ok(templates)
    }

    /// 关键词统一转为小写，与消息的匹配方式一致
    pub fn normalize_keywords(&mut self) {
        fn lower(words: &mut [String]) {
            for word in words.iter_mut() {
                *word = word.trim().to_lowercase();
            }
        }

        for rule in &mut self.rules {
            lower(&mut rule.keywords);
        }
        for topic in &mut self.topic_keywords {
            lower(&mut topic.keywords);
        }
        lower(&mut self.sensitive_topics);
        lower(&mut self.salience_keywords);
        lower(&mut self.stopwords);
    }

    /// 校验模板一致性
    pub fn validate(&self) -> Result<()> {
        let initial = self.state(&self.initial_state).ok_or_else(|| {
            AppError::Config(format!("unknown initial state: {}", self.initial_state))
        })?;
        if !initial.is_base() {
            return Err(AppError::Config(format!(
                "initial state must be a base state: {}",
                self.initial_state
            )));
        }

        for rule in &self.rules {
            if self.state(&rule.target).is_none() {
                return Err(AppError::Config(format!(
                    "rule '{}' targets unknown state '{}'",
                    rule.category, rule.target
                )));
            }
        }

        if self.fallback_lines.is_empty() {
            return Err(AppError::Config("at least one fallback line is required".into()));
        }

        Ok(())
    }

    pub fn state(&self, name: &str) -> Option<&PersonaStateDef> {
        self.states.iter().find(|s| s.name == name)
    }

    /// 给定等级下可用的状态名
    pub fn available_states(&self, level: u8) -> Vec<String> {
        self.states
            .iter()
            .filter(|s| s.is_available_at(level))
            .map(|s| s.name.clone())
            .collect()
    }

    /// 仅基础状态（静态人格）
    pub fn base_states(&self) -> Vec<String> {
        self.available_states(1)
    }

    pub fn ability_for(&self, level: u8) -> Option<&str> {
        self.abilities
            .iter()
            .find(|a| a.level == level)
            .map(|a| a.ability.as_str())
    }
}

/// 替换模板中的 `{key}` 占位符
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{}}}", key), value);
    }
    out
}

/// 关键词匹配：要求关键词起始处是词边界，结尾不限（允许词干匹配）
///
/// `text` 需已转为小写。
pub fn contains_keyword(text: &str, keyword: &str) -> bool {
    if keyword.is_empty() {
        return false;
    }
    text.match_indices(keyword).any(|(idx, _)| {
        text[..idx]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_templates_are_valid() {
        let templates = PersonaTemplates::default();
        assert!(templates.validate().is_ok());
        assert_eq!(templates.base_states().len(), 5);
        assert_eq!(templates.available_states(5).len(), templates.states.len());
    }

    #[test]
    fn test_validate_rejects_unknown_target() {
        let mut templates = PersonaTemplates::default();
        templates.rules.push(rule("bogus", &["zzz"], "ecstatic"));
        assert!(matches!(templates.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_render() {
        let out = render("{persona} evolved to level {level}", &[("persona", "Hakari"), ("level", "3")]);
        assert_eq!(out, "Hakari evolved to level 3");
    }

    #[test]
    fn test_contains_keyword_boundaries() {
        assert!(contains_keyword("why do you remember that?", "why"));
        assert!(contains_keyword("i remembered it", "remember"));
        assert!(contains_keyword("tell me more", "tell me"));
        assert!(!contains_keyword("let's start over", "art"));
        assert!(contains_keyword("modern art is odd", "art"));
        assert!(!contains_keyword("anything", ""));
    }

    #[test]
    fn test_load_from_partial_file() {
        let dir = std::env::temp_dir().join(format!("hakari-templates-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("persona.toml");
        std::fs::write(
            &path,
            "persona_name = \"Mirei\"\nfallback_lines = [\"...\"]\n",
        )
        .unwrap();

        let templates = PersonaTemplates::load_from(&path).unwrap();
        assert_eq!(templates.persona_name, "Mirei");
        assert_eq!(templates.fallback_lines, vec!["...".to_string()]);
        // 未覆盖的字段保持默认
        assert_eq!(templates.initial_state, "shy");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_from_lowercases_keywords() {
        let dir = std::env::temp_dir().join(format!("hakari-templates-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("persona.toml");
        std::fs::write(
            &path,
            r#"
sensitive_topics = ["Family"]
salience_keywords = ["REMEMBER "]

[[rules]]
category = "question"
keywords = ["WHY"]
target = "defensive"
"#,
        )
        .unwrap();

        let templates = PersonaTemplates::load_from(&path).unwrap();
        assert_eq!(templates.sensitive_topics, vec!["family".to_string()]);
        assert_eq!(templates.salience_keywords, vec!["remember".to_string()]);
        assert_eq!(templates.rules[0].keywords, vec!["why".to_string()]);
        assert!(contains_keyword("why not?", &templates.rules[0].keywords[0]));

        std::fs::remove_dir_all(&dir).ok();
    }
}
