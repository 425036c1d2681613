//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（MoveEventRepository）
//! - commands: 入站消息解析及 GameSessionHandler
//! - error: 应用层错误定义

pub mod commands;
pub mod error;
pub mod ports;

// Re-exports
pub use commands::{handlers::GameSessionHandler, MoveCommand};

pub use error::ApplicationError;

pub use ports::{MoveEventRecord, MoveEventRepositoryPort, RepositoryError};
