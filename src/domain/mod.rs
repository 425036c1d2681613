//! Domain Layer - 领域层
//!
//! 限界上下文:
//! - Game Context: 网格移动与游戏会话

pub mod game;
