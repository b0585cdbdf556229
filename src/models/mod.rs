//! 核心数据模型模块
//!
//! 定义引擎的核心数据结构：User, Session, ConversationTurn, LongTermMemoryItem,
//! ProgressionState 以及成就相关模型。

pub mod achievement;
pub mod memory;
pub mod persona;
pub mod progression;
pub mod session;
pub mod turn;
pub mod user;

pub use achievement::*;
pub use memory::*;
pub use persona::*;
pub use progression::*;
pub use session::Session;
pub use turn::ConversationTurn;
pub use user::User;
