//! Gridwalk - 网格移动游戏会话服务
//!
//! 架构设计: DDD + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Game Context: 坐标、方向、游戏会话状态机
//!
//! 应用层 (application/):
//! - Ports: 端口定义（MoveEventRepository）
//! - Commands: 入站消息解析与 GameSessionHandler
//!
//! 基础设施层 (infrastructure/):
//! - HTTP: WebSocket 传输 + 健康检查
//! - Memory: SessionRegistry（连接会话与超时定时器）
//! - Worker: MoveEventWriter 按连接顺序持久化
//! - Persistence: SQLite 移动事件存储
//! - Events: WebSocket 出站事件

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
