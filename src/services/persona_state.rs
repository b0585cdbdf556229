//! 人格状态机
//!
//! 根据消息内容与随机性选择人格当前的情绪状态，并提供矛盾前缀与自我肯定文案。

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::PersonaConfig;
use crate::models::persona::{PersonaStatus, age_on};
use crate::models::progression::{PersonaContext, ProgressionState};
use crate::rng::EngineRng;
use crate::templates::{PersonaTemplates, contains_keyword, render};

/// 状态切换原因
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateTrigger {
    /// 命中关键词类别
    Keyword(String),
    /// 随机探索
    Random,
    /// 保持不变
    Unchanged,
}

/// 一次状态更新的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    pub previous: String,
    pub state: String,
    pub trigger: StateTrigger,
}

/// 人格状态机
pub struct PersonaStateMachine {
    templates: Arc<PersonaTemplates>,
    random_shift_probability: f64,
    contradiction_probability: f64,
    affirmation_probability: f64,
    birth_date: Option<NaiveDate>,
    rng: EngineRng,
}

impl PersonaStateMachine {
    pub fn new(templates: Arc<PersonaTemplates>, config: &PersonaConfig, rng: EngineRng) -> Self {
        let birth_date = config
            .birth_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());

        Self {
            templates,
            random_shift_probability: config.random_shift_probability,
            contradiction_probability: config.contradiction_probability,
            affirmation_probability: config.affirmation_probability,
            birth_date,
            rng,
        }
    }

    /// 更新情绪状态
    ///
    /// 关键词类别按优先级依次判断，命中第一个即停止；目标状态不在 `available_states`
    /// 或未达到 `current_level` 时该类别视为未命中。没有命中时以固定概率从可用状态中
    /// 均匀随机选择，否则保持当前状态。
    pub fn update(
        &self,
        ctx: &mut PersonaContext,
        message: &str,
        current_level: u8,
        available_states: &[String],
    ) -> StateTransition {
        ctx.interactions += 1;
        let previous = ctx.current_state.clone();
        let text = message.to_lowercase();

        let candidates: Vec<&String> = available_states
            .iter()
            .filter(|name| self.is_unlocked(name, current_level))
            .collect();

        for rule in &self.templates.rules {
            if !candidates.iter().any(|c| **c == rule.target) {
                continue;
            }
            if rule.keywords.iter().any(|k| contains_keyword(&text, k)) {
                ctx.current_state = rule.target.clone();
                return StateTransition {
                    previous,
                    state: ctx.current_state.clone(),
                    trigger: StateTrigger::Keyword(rule.category.clone()),
                };
            }
        }

        if self.rng.chance(self.random_shift_probability) {
            if let Some(next) = self.rng.choose(&candidates) {
                ctx.current_state = (*next).clone();
                return StateTransition {
                    previous,
                    state: ctx.current_state.clone(),
                    trigger: StateTrigger::Random,
                };
            }
        }

        StateTransition {
            previous: previous.clone(),
            state: previous,
            trigger: StateTrigger::Unchanged,
        }
    }

    fn is_unlocked(&self, name: &str, level: u8) -> bool {
        self.templates
            .state(name)
            .is_none_or(|def| def.is_available_at(level))
    }

    /// 提及敏感话题时，以一定概率生成矛盾前缀
    pub fn contradiction(&self, message: &str) -> Option<String> {
        let text = message.to_lowercase();
        let mentioned: Vec<&String> = self
            .templates
            .sensitive_topics
            .iter()
            .filter(|t| contains_keyword(&text, t))
            .collect();

        if mentioned.is_empty() || !self.rng.chance(self.contradiction_probability) {
            return None;
        }

        let topic = self.rng.choose(&mentioned)?;
        let template = self.rng.choose(&self.templates.contradictions)?;
        Some(render(template, &[("topic", topic)]))
    }

    /// 以一定概率生成自我肯定
    pub fn self_affirmation(&self) -> Option<String> {
        if !self.rng.chance(self.affirmation_probability) {
            return None;
        }
        self.rng.choose(&self.templates.affirmations).cloned()
    }

    /// 人格年龄
    pub fn age(&self, today: NaiveDate) -> Option<u32> {
        self.birth_date.and_then(|b| age_on(b, today))
    }

    /// 状态面板快照
    pub fn status(&self, progression: &ProgressionState, today: NaiveDate) -> PersonaStatus {
        let state = progression.current_state();
        let def = self.templates.state(state);

        PersonaStatus {
            persona_name: self.templates.persona_name.clone(),
            state: state.to_string(),
            emoji: def.map(|d| d.emoji.clone()).unwrap_or_default(),
            description: def.map(|d| d.description.clone()).unwrap_or_default(),
            age: self.age(today),
            interactions: progression.persona.interactions,
            level: progression.level,
            experience: progression.experience,
            unlocked_abilities: progression.unlocked_abilities.clone(),
            dominant_emotion: None,
        }
    }

    pub fn templates(&self) -> &PersonaTemplates {
        &self.templates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn machine_with(config: PersonaConfig, seed: u64) -> PersonaStateMachine {
        PersonaStateMachine::new(
            Arc::new(PersonaTemplates::default()),
            &config,
            EngineRng::new(seed),
        )
    }

    fn machine(seed: u64) -> PersonaStateMachine {
        machine_with(PersonaConfig::default(), seed)
    }

    fn never_random() -> PersonaConfig {
        PersonaConfig {
            random_shift_probability: 0.0,
            ..PersonaConfig::default()
        }
    }

    #[rstest]
    #[case("Why are you like this?", "defensive")]
    #[case("Can you explain that", "defensive")]
    #[case("Do you remember my dog?", "nostalgic")]
    #[case("That's interesting", "curious")]
    #[case("tell me something", "curious")]
    fn test_base_keyword_categories(#[case] message: &str, #[case] expected: &str) {
        let sm = machine_with(never_random(), 1);
        let mut ctx = PersonaContext::new("shy");
        let available = sm.templates().available_states(1);

        let transition = sm.update(&mut ctx, message, 1, &available);
        assert_eq!(transition.state, expected);
        assert_eq!(ctx.current_state, expected);
        assert!(matches!(transition.trigger, StateTrigger::Keyword(_)));
    }

    #[test]
    fn test_priority_order_wins_over_later_matches() {
        let sm = machine(1);
        let mut ctx = PersonaContext::new("shy");
        let available = sm.templates().available_states(5);

        let transition = sm.update(&mut ctx, "why do you remember that?", 5, &available);
        assert_eq!(transition.state, "defensive");
        assert_eq!(transition.trigger, StateTrigger::Keyword("explanation".into()));
    }

    #[test]
    fn test_advanced_category_requires_unlock() {
        let sm = machine_with(never_random(), 1);
        let mut ctx = PersonaContext::new("shy");

        let level_one = sm.templates().available_states(1);
        let t = sm.update(&mut ctx, "what is the meaning of existence", 1, &level_one);
        assert_eq!(t.state, "shy");
        assert_eq!(t.trigger, StateTrigger::Unchanged);

        let level_two = sm.templates().available_states(2);
        let t = sm.update(&mut ctx, "what is the meaning of existence", 2, &level_two);
        assert_eq!(t.state, "philosophical");
    }

    #[test]
    fn test_advanced_state_in_available_list_still_gated_by_level() {
        let sm = machine_with(never_random(), 1);
        let mut ctx = PersonaContext::new("shy");
        // 调用方误传了全部状态，等级 1 仍不能进入高级状态
        let everything = sm.templates().available_states(5);
        let t = sm.update(&mut ctx, "I want to paint a poem", 1, &everything);
        assert_eq!(t.state, "shy");
    }

    #[test]
    fn test_random_branch_only_selects_available_states() {
        let config = PersonaConfig {
            random_shift_probability: 1.0,
            ..PersonaConfig::default()
        };
        let sm = machine_with(config, 99);
        let available = vec!["ironic".to_string(), "curious".to_string()];
        let mut ctx = PersonaContext::new("shy");

        for _ in 0..200 {
            let t = sm.update(&mut ctx, "ok", 5, &available);
            assert!(available.contains(&t.state));
            assert_eq!(t.trigger, StateTrigger::Random);
        }
    }

    #[test]
    fn test_no_match_without_random_is_sticky() {
        let sm = machine_with(never_random(), 3);
        let mut ctx = PersonaContext::new("ironic");
        let available = sm.templates().available_states(1);

        for _ in 0..10 {
            let t = sm.update(&mut ctx, "ok", 1, &available);
            assert_eq!(t.state, "ironic");
        }
        assert_eq!(ctx.interactions, 10);
    }

    #[test]
    fn test_empty_available_states_keeps_state() {
        let config = PersonaConfig {
            random_shift_probability: 1.0,
            ..PersonaConfig::default()
        };
        let sm = machine_with(config, 5);
        let mut ctx = PersonaContext::new("shy");
        let t = sm.update(&mut ctx, "why?", 1, &[]);
        assert_eq!(t.state, "shy");
        assert_eq!(t.trigger, StateTrigger::Unchanged);
    }

    #[test]
    fn test_contradiction_names_mentioned_topic() {
        let config = PersonaConfig {
            contradiction_probability: 1.0,
            ..PersonaConfig::default()
        };
        let sm = machine_with(config, 11);

        let line = sm.contradiction("My family is weird").unwrap();
        assert!(line.contains("family"));
        assert!(sm.contradiction("nice weather today").is_none());
    }

    #[test]
    fn test_contradiction_and_affirmation_disabled_by_probability() {
        let config = PersonaConfig {
            contradiction_probability: 0.0,
            affirmation_probability: 0.0,
            ..PersonaConfig::default()
        };
        let sm = machine_with(config, 11);
        assert!(sm.contradiction("my mother called").is_none());
        assert!(sm.self_affirmation().is_none());
    }

    #[test]
    fn test_status_snapshot() {
        let sm = machine(1);
        let mut progression = ProgressionState::new("curious");
        progression.persona.interactions = 7;
        let today = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();

        let status = sm.status(&progression, today);
        assert_eq!(status.persona_name, "Hakari");
        assert_eq!(status.emoji, "🔍");
        assert_eq!(status.age, Some(19));
        assert_eq!(status.interactions, 7);
    }
}
