//! Memory Layer - In-Memory State Management
//!
//! 实现 SessionRegistry，管理每个连接的游戏会话与超时定时器

mod session_registry;

pub use session_registry::{ConnectionSlot, SessionError, SessionHandle, SessionRegistry};
