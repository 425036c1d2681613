//! 应用层 - 命令（写操作）
//!
//! 入站消息解析与游戏会话命令处理

mod move_commands;

pub mod handlers;

pub use move_commands::*;
