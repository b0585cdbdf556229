//! 存储层模块
//!
//! 定义持久化接口，并提供内存实现（可选 JSON 快照落盘）。

pub mod memory;
pub mod repository;

pub use memory::{InMemoryStore, StoreSnapshot};
pub use repository::PersistentStore;
