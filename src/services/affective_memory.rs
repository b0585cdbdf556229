//! 情感记忆
//!
//! 记录每轮对话、统计情绪分布，并把值得记住的消息提升为长期记忆。
//! 召回按话题词重叠打分，只读不写。

use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::MemoryConfig;
use crate::models::memory::{EmotionTally, LongTermMemoryItem, TopicTally};
use crate::models::turn::ConversationTurn;
use crate::templates::{PersonaTemplates, contains_keyword};

/// 单个用户的记忆
#[derive(Debug, Clone, Default)]
struct UserMemory {
    turns: Vec<ConversationTurn>,
    emotions: EmotionTally,
    /// 仅观测用
    topics: TopicTally,
    long_term: Vec<LongTermMemoryItem>,
}

/// 一次记录的结果
#[derive(Debug, Clone)]
pub struct RecordOutcome {
    /// 新追加的轮次
    pub turn: ConversationTurn,
    /// 是否满足长期记忆条件
    pub salient: bool,
    /// 新建或被强化的长期记忆 ID
    pub memory_id: Option<String>,
}

/// 召回结果
///
/// 有限、可重复遍历的只读序列。
#[derive(Debug, Clone, Default)]
pub struct RelevantMemories {
    items: Vec<LongTermMemoryItem>,
}

impl RelevantMemories {
    pub fn iter(&self) -> std::slice::Iter<'_, LongTermMemoryItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<'a> IntoIterator for &'a RelevantMemories {
    type Item = &'a LongTermMemoryItem;
    type IntoIter = std::slice::Iter<'a, LongTermMemoryItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// 情感记忆存储
pub struct AffectiveMemoryStore {
    config: MemoryConfig,
    templates: Arc<PersonaTemplates>,
    long_term_enabled: bool,
    users: DashMap<String, UserMemory>,
}

impl AffectiveMemoryStore {
    pub fn new(config: MemoryConfig, templates: Arc<PersonaTemplates>, long_term_enabled: bool) -> Self {
        Self {
            config,
            templates,
            long_term_enabled,
            users: DashMap::new(),
        }
    }

    /// 记录一轮对话
    pub fn record(&self, user_email: &str, message: &str, emotion: &str) -> RecordOutcome {
        let mut memory = self.users.entry(user_email.to_string()).or_default();

        let turn_number = memory.turns.last().map_or(1, |t| t.turn_number + 1);
        let turn = ConversationTurn::new(user_email, turn_number, message, emotion);
        memory.turns.push(turn.clone());
        memory.emotions.increment(emotion);

        let text = message.to_lowercase();
        let topics = self.matched_topics(&text);
        for topic in &topics {
            memory.topics.increment(topic);
        }

        let salient = self.is_salient(message);
        let memory_id = if salient && self.long_term_enabled {
            let category = topics
                .first()
                .cloned()
                .unwrap_or_else(|| self.salience_category(&text).to_string());
            Some(self.promote(&mut memory, user_email, message, &category))
        } else {
            None
        };

        tracing::debug!(
            user = %user_email,
            turn = turn_number,
            emotion = %emotion,
            emotions = ?memory.emotions,
            topics = ?memory.topics,
            salient = salient,
            "turn recorded"
        );

        RecordOutcome {
            turn,
            salient,
            memory_id,
        }
    }

    /// 长度超过阈值或包含关键词即视为值得记住
    pub fn is_salient(&self, message: &str) -> bool {
        if message.chars().count() > self.config.salience_min_chars {
            return true;
        }
        let text = message.to_lowercase();
        self.templates
            .salience_keywords
            .iter()
            .any(|k| contains_keyword(&text, k))
    }

    fn salience_category(&self, text: &str) -> &'static str {
        if self
            .templates
            .salience_keywords
            .iter()
            .any(|k| contains_keyword(text, k))
        {
            "keyword"
        } else {
            "detail"
        }
    }

    fn matched_topics(&self, text: &str) -> Vec<String> {
        self.templates
            .topic_keywords
            .iter()
            .filter(|t| t.keywords.iter().any(|k| contains_keyword(text, k)))
            .map(|t| t.topic.clone())
            .collect()
    }

    fn promote(&self, memory: &mut UserMemory, user_email: &str, message: &str, category: &str) -> String {
        let excerpt: String = message
            .trim()
            .chars()
            .take(self.config.excerpt_max_chars)
            .collect();

        if let Some(existing) = memory.long_term.iter_mut().find(|m| m.excerpt == excerpt) {
            existing.reinforce();
            return existing.id.clone();
        }

        let item = LongTermMemoryItem::new(user_email, &excerpt, category, self.config.importance);
        let id = item.id.clone();
        memory.long_term.push(item);
        id
    }

    /// 为最近的轮次补齐人格回复
    pub fn attach_reply(&self, user_email: &str, turn_id: &str, reply: &str) -> Option<ConversationTurn> {
        let mut memory = self.users.get_mut(user_email)?;
        let turn = memory.turns.iter_mut().rev().find(|t| t.id == turn_id)?;
        turn.persona_text = reply.to_string();
        Some(turn.clone())
    }

    /// 召回与查询相关的长期记忆
    ///
    /// 得分为共享话题词个数；零分不返回；同分时较新的在前。
    pub fn relevant_memories(&self, user_email: &str, query: &str, max_items: usize) -> RelevantMemories {
        let Some(memory) = self.users.get(user_email) else {
            return RelevantMemories::default();
        };

        let query_tokens = self.topic_tokens(query);
        if query_tokens.is_empty() || max_items == 0 {
            return RelevantMemories::default();
        }

        let mut scored: Vec<(usize, usize, &LongTermMemoryItem)> = memory
            .long_term
            .iter()
            .enumerate()
            .filter_map(|(idx, item)| {
                let score = self
                    .topic_tokens(&item.excerpt)
                    .intersection(&query_tokens)
                    .count();
                (score > 0).then_some((score, idx, item))
            })
            .collect();

        scored.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then_with(|| b.2.updated_at.cmp(&a.2.updated_at))
                .then_with(|| b.1.cmp(&a.1))
        });

        RelevantMemories {
            items: scored
                .into_iter()
                .take(max_items)
                .map(|(_, _, item)| item.clone())
                .collect(),
        }
    }

    fn topic_tokens(&self, text: &str) -> HashSet<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .map(|w| w.trim_matches('\''))
            .filter(|w| w.chars().count() >= 3)
            .filter(|w| !self.templates.stopwords.iter().any(|s| s == w))
            .map(str::to_string)
            .collect()
    }

    /// 从持久化的历史轮次恢复记忆（不重复追加）
    pub fn restore(&self, user_email: &str, turns: &[ConversationTurn]) {
        if turns.is_empty() || self.users.contains_key(user_email) {
            return;
        }

        let mut memory = UserMemory::default();
        for turn in turns {
            memory.emotions.increment(&turn.emotion);
            let text = turn.user_text.to_lowercase();
            let topics = self.matched_topics(&text);
            for topic in &topics {
                memory.topics.increment(topic);
            }
            if self.long_term_enabled && self.is_salient(&turn.user_text) {
                let category = topics
                    .first()
                    .cloned()
                    .unwrap_or_else(|| self.salience_category(&text).to_string());
                self.promote(&mut memory, user_email, &turn.user_text, &category);
            }
            memory.turns.push(turn.clone());
        }

        tracing::debug!(user = %user_email, turns = turns.len(), "affective memory restored");
        self.users.entry(user_email.to_string()).or_insert(memory);
    }

    pub fn emotion_tally(&self, user_email: &str) -> EmotionTally {
        self.users
            .get(user_email)
            .map(|m| m.emotions.clone())
            .unwrap_or_default()
    }

    /// 话题偏好（仅观测用）
    pub fn topic_tally(&self, user_email: &str) -> TopicTally {
        self.users
            .get(user_email)
            .map(|m| m.topics.clone())
            .unwrap_or_default()
    }

    pub fn turn_count(&self, user_email: &str) -> usize {
        self.users.get(user_email).map_or(0, |m| m.turns.len())
    }

    pub fn long_term(&self, user_email: &str) -> Vec<LongTermMemoryItem> {
        self.users
            .get(user_email)
            .map(|m| m.long_term.clone())
            .unwrap_or_default()
    }
}
