//! Game Context - 网格移动游戏限界上下文
//!
//! 职责:
//! - 坐标与方向值对象
//! - 单连接的游戏会话状态机（Idle / Active）
//! - 会话结束时的距离计算

mod aggregate;
mod errors;
mod value_objects;

pub use aggregate::{GameSession, GameSummary, MoveOutcome, SessionStatus};
pub use errors::GameError;
pub use value_objects::{format_distance, ConnectionId, Direction, GameId, Position};
