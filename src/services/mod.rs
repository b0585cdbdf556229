//! 服务模块
//!
//! 人格状态机、进度引擎、情感记忆、成就评估与回复合成，由对话引擎串联。

pub mod achievement;
pub mod affective_memory;
pub mod composer;
pub mod engine;
pub mod persona_state;
pub mod progression;
pub mod session_directory;

pub use achievement::AchievementEvaluator;
pub use affective_memory::{AffectiveMemoryStore, RecordOutcome, RelevantMemories};
pub use composer::{ComposedReply, CompositionInput, ResponseComposer};
pub use engine::{ConversationEngine, EngineReply, create_conversation_engine};
pub use persona_state::{PersonaStateMachine, StateTransition, StateTrigger};
pub use progression::{ProgressionEngine, level_for};
pub use session_directory::{
    InMemorySessionDirectory, SessionDirectory, create_session_directory,
};
