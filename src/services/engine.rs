//! 对话引擎
//!
//! 每条消息的处理顺序：状态更新 → 记录 → 演化 → 成就 → 模型调用 → 合成 → 持久化。
//! 每个用户一把异步锁，同一用户的消息串行处理，不同用户互不阻塞。

use chrono::Utc;
use dashmap::DashMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::config::{ConfigLoader, EngineConfig};
use crate::error::{AppError, ModelError, Result, StoreStatus};
use crate::llm::LanguageModelClient;
use crate::models::persona::PersonaStatus;
use crate::models::session::Session;
use crate::models::turn::ConversationTurn;
use crate::models::user::User;
use crate::observability::EngineMetrics;
use crate::rng::EngineRng;
use crate::services::achievement::AchievementEvaluator;
use crate::services::affective_memory::{AffectiveMemoryStore, RelevantMemories};
use crate::services::composer::{CompositionInput, ResponseComposer};
use crate::services::persona_state::PersonaStateMachine;
use crate::services::progression::ProgressionEngine;
use crate::services::session_directory::SessionDirectory;
use crate::storage::PersistentStore;
use crate::templates::{PersonaTemplates, render};

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

/// 一次对话的结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineReply {
    /// 最终回复
    pub text: String,
    /// 回复时的情绪状态
    pub state: String,
    /// 等级
    pub level: u8,
    /// 累计经验值
    pub experience: u64,
    /// 信任度
    pub confidence: u8,
    /// 本轮是否升级
    pub evolved: bool,
    /// 本轮新解锁的成就
    pub new_achievements: Vec<String>,
    /// 是否使用了固定回复
    pub used_fallback: bool,
    /// 持久化状态
    pub store_status: StoreStatus,
}

/// 用户上下文
struct UserContext {
    user: User,
    /// 存储读取失败时临时构造，不回写存储
    transient: bool,
}

/// 对话引擎
pub struct ConversationEngine {
    config: EngineConfig,
    templates: Arc<PersonaTemplates>,
    persona: PersonaStateMachine,
    progression: ProgressionEngine,
    memory: AffectiveMemoryStore,
    achievements: AchievementEvaluator,
    composer: ResponseComposer,
    store: Arc<dyn PersistentStore>,
    model: Arc<dyn LanguageModelClient>,
    sessions: Arc<dyn SessionDirectory>,
    contexts: DashMap<String, Arc<Mutex<UserContext>>>,
    metrics: EngineMetrics,
    email_pattern: Regex,
    /// 注册的查重与写入在同一把锁内完成
    registration: Mutex<()>,
}

impl ConversationEngine {
    pub fn new(
        config: EngineConfig,
        templates: PersonaTemplates,
        store: Arc<dyn PersistentStore>,
        model: Arc<dyn LanguageModelClient>,
        sessions: Arc<dyn SessionDirectory>,
    ) -> Result<Self> {
        ConfigLoader::validate(&config).map_err(|e| AppError::Config(e.to_string()))?;
        let mut templates = templates;
        templates.normalize_keywords();
        templates.validate()?;
        let templates = Arc::new(templates);
        let rng = EngineRng::from_seed_or_random(config.rng_seed);
        let features = &config.features;

        let email_pattern = Regex::new(EMAIL_PATTERN)
            .map_err(|e| AppError::Internal(format!("invalid email pattern: {}", e)))?;

        Ok(Self {
            persona: PersonaStateMachine::new(templates.clone(), &config.persona, rng.clone()),
            progression: ProgressionEngine::new(
                config.progression.clone(),
                templates.clone(),
                rng.clone(),
                features.evolving_persona,
            ),
            memory: AffectiveMemoryStore::new(
                config.memory.clone(),
                templates.clone(),
                features.long_term_memory,
            ),
            achievements: AchievementEvaluator::new(config.achievements.clone()),
            composer: ResponseComposer::new(config.composer.clone(), templates.clone(), rng),
            templates,
            store,
            model,
            sessions,
            contexts: DashMap::new(),
            metrics: EngineMetrics::default(),
            email_pattern,
            registration: Mutex::new(()),
            config,
        })
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    pub fn memory(&self) -> &AffectiveMemoryStore {
        &self.memory
    }

    /// 注册用户并签发会话
    ///
    /// 邮箱格式非法、名称为空或邮箱已注册时返回 `Validation` 错误。
    pub async fn register_user(&self, email: &str, display_name: &str) -> Result<Session> {
        let email = email.trim();
        let display_name = display_name.trim();

        if email.is_empty() || display_name.is_empty() {
            return Err(AppError::Validation("email and name are required".into()));
        }
        if !self.email_pattern.is_match(email) {
            return Err(AppError::Validation(format!("invalid email: {}", email)));
        }

        let claim = self.registration.lock().await;
        if self.store.get_user(email).await?.is_some() {
            return Err(AppError::Validation(format!("email already registered: {}", email)));
        }

        let user = User::new(email, display_name, &self.templates.initial_state);
        self.store.upsert_user(&user).await?;
        drop(claim);
        let session = self.sessions.open(email).await?;

        self.contexts.insert(
            email.to_string(),
            Arc::new(Mutex::new(UserContext {
                user,
                transient: false,
            })),
        );
        self.metrics.record_registration();
        tracing::info!(user = %email, "user registered");
        Ok(session)
    }

    /// 为已注册用户签发新会话
    pub async fn login(&self, email: &str) -> Result<Session> {
        let email = email.trim();
        if self.store.get_user(email).await?.is_none() {
            return Err(AppError::NotFound(format!("user not found: {}", email)));
        }
        self.sessions.open(email).await
    }

    pub async fn logout(&self, token: &str) -> bool {
        match self.sessions.revoke(token).await {
            Ok(revoked) => revoked,
            Err(e) => {
                tracing::warn!(error = %e, "failed to revoke session");
                false
            }
        }
    }

    /// 处理一条消息
    ///
    /// 空消息或未知会话返回 `None`，不报错。
    pub async fn handle_message(&self, token: &str, message: &str) -> Option<EngineReply> {
        let message = message.trim();
        if message.is_empty() {
            self.metrics.record_ignored();
            return None;
        }

        let Some(email) = self.resolve(token).await else {
            self.metrics.record_ignored();
            return None;
        };

        let mut status = StoreStatus::Ok;
        let Some(context) = self.context_for(&email, &mut status).await else {
            tracing::warn!(user = %email, "session points to an unknown user");
            self.metrics.record_ignored();
            return None;
        };

        let mut ctx = context.lock().await;
        Some(self.process(&mut ctx, message, status).await)
    }

    async fn process(&self, ctx: &mut UserContext, message: &str, mut status: StoreStatus) -> EngineReply {
        let features = &self.config.features;
        let progression_config = &self.config.progression;
        let transient = ctx.transient;
        let user = &mut ctx.user;
        let email = user.email.clone();

        // 1. 情绪状态
        let available = self.progression.available_states(&user.progression);
        let level = user.progression.level;
        let transition = self
            .persona
            .update(&mut user.progression.persona, message, level, &available);

        // 2. 情感记忆
        let outcome = self.memory.record(&email, message, &transition.state);

        // 3. 演化
        let previous_level = user.progression.level;
        let evolution = self.progression.evolve(&mut user.progression);
        let levels_gained = evolution.levels_gained(previous_level);

        user.interactions_total += 1;
        user.touch();
        user.adjust_confidence(
            progression_config.confidence_per_turn
                + progression_config.confidence_per_level * i32::from(levels_gained),
        );
        if levels_gained > 0 {
            self.metrics.record_level_ups(u64::from(levels_gained));
        }

        // 4. 成就（临时上下文的统计不可信，跳过）
        let mut new_achievements = Vec::new();
        if features.achievements && !transient {
            let result = self
                .achievements
                .verify(self.store.as_ref(), &email, &user.stats())
                .await;
            self.track(&mut status, &result, "verify achievements");
            if let Ok(unlocked) = result {
                let count = unlocked.len() as i32;
                user.adjust_confidence(progression_config.confidence_per_achievement * count);
                self.metrics.record_achievements(unlocked.len() as u64);
                new_achievements = unlocked.into_iter().collect();
            }
        }

        let special_banner = self.achievement_banner(&new_achievements);
        let contradiction = features
            .contradictions
            .then(|| self.persona.contradiction(message))
            .flatten();
        let affirmation = features
            .self_affirmations
            .then(|| self.persona.self_affirmation())
            .flatten();

        // 5. 模型调用
        let prompt = self.build_prompt(&email, &transition.state, message, &mut status).await;
        let raw = self.call_model(&prompt).await;
        if raw.is_none() {
            self.metrics.record_fallback();
        }

        // 6. 合成
        let composed = self.composer.assemble(&CompositionInput {
            raw: raw.as_deref(),
            state: &transition.state,
            contradiction: contradiction.as_deref(),
            affirmation: affirmation.as_deref(),
            evolution_banner: evolution.notice.as_deref(),
            special_banner: special_banner.as_deref(),
            fallback_seed: user.interactions_total,
        });

        // 7. 持久化
        let turn = self
            .memory
            .attach_reply(&email, &outcome.turn.id, &composed.text)
            .unwrap_or_else(|| {
                let mut turn = outcome.turn.clone();
                turn.persona_text = composed.text.clone();
                turn
            });
        if transient {
            tracing::warn!(user = %email, turn = turn.turn_number, "user unreadable, turn not persisted");
        } else {
            let appended = self.store.append_conversation_turn(&turn).await;
            self.track(&mut status, &appended, "append turn");

            let saved = self.store.upsert_user(&ctx.user).await;
            self.track(&mut status, &saved, "save user");
        }

        self.metrics.record_turn();
        let user = &ctx.user;
        tracing::info!(
            user = %email,
            state = %transition.state,
            level = user.progression.level,
            experience = user.progression.experience,
            confidence = user.confidence,
            fallback = composed.used_fallback,
            store = ?status,
            "turn processed"
        );

        EngineReply {
            text: composed.text,
            state: transition.state,
            level: user.progression.level,
            experience: user.progression.experience,
            confidence: user.confidence,
            evolved: evolution.leveled_up,
            new_achievements,
            used_fallback: composed.used_fallback,
            store_status: status,
        }
    }

    /// 状态面板
    pub async fn status(&self, token: &str) -> Option<PersonaStatus> {
        let email = self.resolve(token).await?;
        let mut status = StoreStatus::Ok;
        let context = self.context_for(&email, &mut status).await?;
        let ctx = context.lock().await;
        let mut snapshot = self
            .persona
            .status(&ctx.user.progression, Utc::now().date_naive());
        snapshot.dominant_emotion = self
            .memory
            .emotion_tally(&email)
            .dominant()
            .map(str::to_string);
        Some(snapshot)
    }

    /// 会话对应的用户档案
    pub async fn profile(&self, token: &str) -> Option<User> {
        let email = self.resolve(token).await?;
        let mut status = StoreStatus::Ok;
        let context = self.context_for(&email, &mut status).await?;
        let ctx = context.lock().await;
        Some(ctx.user.clone())
    }

    async fn resolve(&self, token: &str) -> Option<String> {
        if token.trim().is_empty() {
            return None;
        }
        match self.sessions.resolve(token).await {
            Ok(email) => email,
            Err(e) => {
                tracing::warn!(error = %e, "session lookup failed");
                None
            }
        }
    }

    /// 取得用户上下文，首次访问时从存储加载
    async fn context_for(&self, email: &str, status: &mut StoreStatus) -> Option<Arc<Mutex<UserContext>>> {
        let cached = self.contexts.get(email).map(|c| Arc::clone(c.value()));
        if cached.is_some() {
            return cached;
        }

        let loaded = self.store.get_user(email).await;
        self.track(status, &loaded, "load user");
        let (user, transient) = match loaded {
            Ok(Some(user)) => (user, false),
            Ok(None) => return None,
            Err(_) => (
                User::new(email, email, &self.templates.initial_state),
                true,
            ),
        };

        // 轮次编号与计数需要完整历史；长期记忆是否提取由记忆模块自行判断
        let turns = self.store.get_recent_turns(email, usize::MAX).await;
        self.track(status, &turns, "restore memory");
        if let Ok(turns) = turns {
            self.memory.restore(email, &turns);
        }

        let context = Arc::new(Mutex::new(UserContext { user, transient }));
        if transient {
            return Some(context);
        }
        Some(
            self.contexts
                .entry(email.to_string())
                .or_insert(context)
                .value()
                .clone(),
        )
    }

    fn track<T>(&self, status: &mut StoreStatus, result: &Result<T>, operation: &str) {
        if let Err(e) = result {
            tracing::error!(operation = %operation, error = %e, "store operation failed");
            self.metrics.record_store_error();
        }
        status.absorb(result);
    }

    fn achievement_banner(&self, unlocked: &[String]) -> Option<String> {
        if unlocked.is_empty() {
            return None;
        }
        let names: Vec<&str> = unlocked
            .iter()
            .map(|id| {
                self.achievements
                    .definition(id)
                    .map_or(id.as_str(), |d| d.name.as_str())
            })
            .collect();
        Some(render(
            &self.templates.achievement_banner,
            &[("name", &names.join(", "))],
        ))
    }

    async fn build_prompt(&self, email: &str, state: &str, message: &str, status: &mut StoreStatus) -> String {
        let prompt = &self.templates.prompt;
        let persona = self.templates.persona_name.as_str();
        let description = self
            .templates
            .state(state)
            .map_or("", |s| s.description.as_str());

        let mut sections = vec![render(
            &prompt.state_line,
            &[("persona", persona), ("state", state), ("description", description)],
        )];

        if self.config.features.long_term_memory {
            let memories = self
                .memory
                .relevant_memories(email, message, self.config.memory.recall_limit);
            if let Some(section) = memory_section(&render(&prompt.memory_header, &[("persona", persona)]), &memories) {
                sections.push(section);
            }
        }

        let recent = self
            .store
            .get_recent_turns(email, self.config.memory.recent_turns)
            .await;
        self.track(status, &recent, "load recent turns");
        if let Ok(turns) = recent {
            if let Some(section) = history_section(&prompt.history_header, persona, &turns) {
                sections.push(section);
            }
        }

        sections.push(render(&prompt.request, &[("message", message)]));
        sections.join("\n\n")
    }

    /// 调用模型，失败或超时返回 None
    async fn call_model(&self, prompt: &str) -> Option<String> {
        let timeout_secs = self.config.model.timeout_secs;
        let started = Instant::now();
        let result = match tokio::time::timeout(Duration::from_secs(timeout_secs), self.model.send(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(ModelError::Timeout(timeout_secs)),
        };
        self.metrics
            .record_model_call(started.elapsed().as_millis() as u64);

        match result {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!(error = %e, "model call failed, using fallback line");
                None
            }
        }
    }
}

fn memory_section(header: &str, memories: &RelevantMemories) -> Option<String> {
    if memories.is_empty() {
        return None;
    }
    let lines: Vec<String> = memories.iter().map(|m| format!("- {}", m.excerpt)).collect();
    Some(format!("{}\n{}", header, lines.join("\n")))
}

fn history_section(header: &str, persona: &str, turns: &[ConversationTurn]) -> Option<String> {
    if turns.is_empty() {
        return None;
    }
    let mut lines = Vec::with_capacity(turns.len() * 2);
    for turn in turns {
        lines.push(format!("User: {}", turn.user_text));
        if turn.is_answered() {
            lines.push(format!("{}: {}", persona, turn.persona_text));
        }
    }
    Some(format!("{}\n{}", header, lines.join("\n")))
}

/// 按配置创建引擎，配置了模板文件时从文件加载人格模板
pub fn create_conversation_engine(
    config: EngineConfig,
    store: Arc<dyn PersistentStore>,
    model: Arc<dyn LanguageModelClient>,
    sessions: Arc<dyn SessionDirectory>,
) -> Result<ConversationEngine> {
    let templates = match &config.templates_path {
        Some(path) => PersonaTemplates::load_from(path)?,
        None => PersonaTemplates::default(),
    };
    ConversationEngine::new(config, templates, store, model, sessions)
}
