//! 进度引擎
//!
//! 每轮对话累积经验值，经验值决定等级，升级时解锁对应能力。

use std::sync::Arc;

use crate::config::ProgressionConfig;
use crate::models::progression::{Evolution, ProgressionState};
use crate::rng::EngineRng;
use crate::templates::{PersonaTemplates, render};

/// 进度引擎
pub struct ProgressionEngine {
    config: ProgressionConfig,
    templates: Arc<PersonaTemplates>,
    rng: EngineRng,
    /// 关闭时为静态人格：不累积经验，等级固定为 1
    enabled: bool,
}

impl ProgressionEngine {
    pub fn new(
        config: ProgressionConfig,
        templates: Arc<PersonaTemplates>,
        rng: EngineRng,
        enabled: bool,
    ) -> Self {
        Self {
            config,
            templates,
            rng,
            enabled,
        }
    }

    /// 经验值对应的等级
    pub fn level_for(&self, experience: u64) -> u8 {
        level_for(experience, self.config.xp_per_level, self.config.max_level)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// 当前等级可用的状态
    pub fn available_states(&self, state: &ProgressionState) -> Vec<String> {
        if self.enabled {
            self.templates.available_states(state.level)
        } else {
            self.templates.base_states()
        }
    }

    /// 处理一轮对话的进度变化
    ///
    /// 跨越多个等级时，每个跨越的等级都会解锁其能力。
    pub fn evolve(&self, state: &mut ProgressionState) -> Evolution {
        if !self.enabled {
            return Evolution::unchanged(state);
        }

        let gained = self
            .rng
            .range_inclusive(self.config.gain_min, self.config.gain_max);
        let previous_level = state.level;

        state.experience = state.experience.saturating_add(gained);
        // 等级不回退
        state.level = self.level_for(state.experience).max(previous_level);

        let mut unlocked = Vec::new();
        for level in previous_level.saturating_add(1)..=state.level {
            if let Some(ability) = self.templates.ability_for(level) {
                if state.unlock(ability) {
                    unlocked.push(ability.to_string());
                }
            }
        }

        let leveled_up = state.level > previous_level;
        let notice = leveled_up.then(|| {
            let ability = if unlocked.is_empty() {
                "something new".to_string()
            } else {
                unlocked.join(", ")
            };
            let level = state.level.to_string();
            render(
                &self.templates.evolution_notice,
                &[
                    ("persona", &self.templates.persona_name),
                    ("level", &level),
                    ("ability", &ability),
                ],
            )
        });

        if leveled_up {
            tracing::info!(
                from = previous_level,
                to = state.level,
                experience = state.experience,
                "persona leveled up"
            );
        }

        Evolution {
            gained,
            experience: state.experience,
            level: state.level,
            leveled_up,
            unlocked,
            notice,
        }
    }
}

/// `min(max_level, experience / xp_per_level + 1)`
pub fn level_for(experience: u64, xp_per_level: u64, max_level: u8) -> u8 {
    let xp_per_level = xp_per_level.max(1);
    let raw = experience / xp_per_level + 1;
    raw.min(u64::from(max_level.max(1))) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn engine(seed: u64) -> ProgressionEngine {
        ProgressionEngine::new(
            ProgressionConfig::default(),
            Arc::new(PersonaTemplates::default()),
            EngineRng::new(seed),
            true,
        )
    }

    #[rstest]
    #[case(0, 1)]
    #[case(49, 1)]
    #[case(50, 2)]
    #[case(99, 2)]
    #[case(100, 3)]
    #[case(199, 4)]
    #[case(200, 5)]
    #[case(10_000, 5)]
    fn test_level_table(#[case] experience: u64, #[case] expected: u8) {
        assert_eq!(level_for(experience, 50, 5), expected);
    }

    #[test]
    fn test_level_is_monotonic_in_experience() {
        let mut last = 0;
        for xp in 0..1_000 {
            let level = level_for(xp, 50, 5);
            assert!(level >= last);
            assert!((1..=5).contains(&level));
            last = level;
        }
    }

    #[test]
    fn test_gain_stays_in_range() {
        let engine = engine(42);
        let mut state = ProgressionState::new("shy");
        for _ in 0..500 {
            let before = state.experience;
            let evo = engine.evolve(&mut state);
            assert!((1..=3).contains(&evo.gained));
            assert_eq!(state.experience, before + evo.gained);
        }
    }

    #[test]
    fn test_ten_messages_stay_at_level_one() {
        let engine = engine(7);
        let mut state = ProgressionState::new("shy");
        for _ in 0..10 {
            let evo = engine.evolve(&mut state);
            assert!(!evo.leveled_up);
            assert!(evo.notice.is_none());
        }
        assert!((10..=30).contains(&state.experience));
        assert_eq!(state.level, 1);
        assert!(state.unlocked_abilities.is_empty());
    }

    #[test]
    fn test_crossing_threshold_unlocks_ability_once() {
        let engine = engine(7);
        let mut state = ProgressionState::new("shy");
        state.experience = 49;

        let evo = engine.evolve(&mut state);
        assert!(evo.leveled_up);
        assert_eq!(evo.level, 2);
        assert_eq!(evo.unlocked, vec!["philosophical musings".to_string()]);
        let notice = evo.notice.unwrap();
        assert!(notice.contains("level 2"));
        assert!(notice.contains("philosophical musings"));

        let evo = engine.evolve(&mut state);
        assert!(!evo.leveled_up);
        assert!(evo.unlocked.is_empty());
        assert_eq!(state.unlocked_abilities.len(), 1);
    }

    #[test]
    fn test_multi_level_jump_unlocks_every_crossed_level() {
        let config = ProgressionConfig {
            xp_per_level: 1,
            gain_min: 3,
            gain_max: 3,
            ..ProgressionConfig::default()
        };
        let engine = ProgressionEngine::new(
            config,
            Arc::new(PersonaTemplates::default()),
            EngineRng::new(1),
            true,
        );
        let mut state = ProgressionState::new("shy");

        let evo = engine.evolve(&mut state);
        assert_eq!(evo.level, 4);
        assert_eq!(evo.levels_gained(1), 3);
        assert_eq!(
            state.unlocked_abilities,
            vec![
                "philosophical musings".to_string(),
                "creative expression".to_string(),
                "wistful storytelling".to_string(),
            ]
        );
    }

    #[test]
    fn test_level_capped_at_max() {
        let engine = engine(3);
        let mut state = ProgressionState::new("shy");
        state.experience = 5_000;
        state.level = 5;
        let evo = engine.evolve(&mut state);
        assert_eq!(evo.level, 5);
        assert!(!evo.leveled_up);
    }

    #[test]
    fn test_static_persona_never_evolves() {
        let engine = ProgressionEngine::new(
            ProgressionConfig::default(),
            Arc::new(PersonaTemplates::default()),
            EngineRng::new(1),
            false,
        );
        let mut state = ProgressionState::new("shy");
        for _ in 0..100 {
            let evo = engine.evolve(&mut state);
            assert_eq!(evo.gained, 0);
        }
        assert_eq!(state.experience, 0);
        assert_eq!(state.level, 1);
        assert_eq!(engine.available_states(&state).len(), 5);
    }
}
