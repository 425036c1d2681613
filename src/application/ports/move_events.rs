//! Move Event Repository Port - 出站端口
//!
//! 移动事件的追加式持久化接口，具体实现在 infrastructure 层（SQLite）

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::game::{ConnectionId, Direction, GameId};

/// Repository 错误
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// 移动事件记录（与游戏边界无关的单条事实）
#[derive(Debug, Clone, PartialEq)]
pub struct MoveEventRecord {
    pub session_id: GameId,
    pub connection_id: ConnectionId,
    pub command: Direction,
    pub x: i32,
    pub y: i32,
    pub timestamp: DateTime<Utc>,
}

/// Move Event Repository Port
///
/// 只追加，不更新；调用方视为尽力而为，失败不重试
#[async_trait]
pub trait MoveEventRepositoryPort: Send + Sync {
    /// 追加一条移动事件
    async fn append(&self, record: &MoveEventRecord) -> Result<(), RepositoryError>;

    /// 按追加顺序读取某连接的所有移动事件
    async fn find_by_connection(
        &self,
        connection_id: &ConnectionId,
    ) -> Result<Vec<MoveEventRecord>, RepositoryError>;
}
