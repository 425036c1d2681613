//! Event Publisher Implementation
//!
//! WebSocket 出站事件推送实现：每个连接一个通道，由连接的转发任务序列化为 JSON 文本帧

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::game::{format_distance, ConnectionId, GameSummary, Position};

/// 事件推送错误
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Connection not registered: {0}")]
    ConnectionNotFound(ConnectionId),

    #[error("Connection channel closed: {0}")]
    ChannelClosed(ConnectionId),
}

/// WebSocket 出站事件类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WsEvent {
    /// 注册后的初始坐标
    InitialState { x: i32, y: i32 },
    /// 坐标更新
    PositionUpdate { x: i32, y: i32 },
    /// 游戏结束（仅超时触发）
    #[serde(rename_all = "camelCase")]
    GameOver {
        game_id: String,
        /// 两位小数
        distance: String,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    },
    /// 错误通知
    Error { message: String },
}

impl WsEvent {
    pub fn initial_state(position: Position) -> Self {
        Self::InitialState {
            x: position.x,
            y: position.y,
        }
    }

    pub fn position_update(position: Position) -> Self {
        Self::PositionUpdate {
            x: position.x,
            y: position.y,
        }
    }

    pub fn game_over(summary: &GameSummary) -> Self {
        Self::GameOver {
            game_id: summary.game_id.to_string(),
            distance: format_distance(summary.distance),
            start_time: summary.started_at,
            end_time: summary.ended_at,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// 事件发布器
pub struct EventPublisher {
    /// connection_id -> 出站通道
    connection_channels: DashMap<ConnectionId, mpsc::UnboundedSender<WsEvent>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            connection_channels: DashMap::new(),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 注册连接的出站通道（重复注册会替换旧通道）
    pub fn register_connection(
        &self,
        connection_id: &ConnectionId,
    ) -> mpsc::UnboundedReceiver<WsEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.connection_channels.insert(connection_id.clone(), tx);
        rx
    }

    /// 取消注册连接
    pub fn unregister_connection(&self, connection_id: &ConnectionId) {
        self.connection_channels.remove(connection_id);
    }

    pub fn is_registered(&self, connection_id: &ConnectionId) -> bool {
        self.connection_channels.contains_key(connection_id)
    }

    pub fn publish_initial_state(
        &self,
        connection_id: &ConnectionId,
        position: Position,
    ) -> Result<(), PublishError> {
        self.send(connection_id, WsEvent::initial_state(position))
    }

    pub fn publish_position_update(
        &self,
        connection_id: &ConnectionId,
        position: Position,
    ) -> Result<(), PublishError> {
        self.send(connection_id, WsEvent::position_update(position))
    }

    pub fn publish_game_over(
        &self,
        connection_id: &ConnectionId,
        summary: &GameSummary,
    ) -> Result<(), PublishError> {
        self.send(connection_id, WsEvent::game_over(summary))
    }

    pub fn publish_error(
        &self,
        connection_id: &ConnectionId,
        message: &str,
    ) -> Result<(), PublishError> {
        self.send(connection_id, WsEvent::error(message))
    }

    /// 发送事件到指定连接
    pub fn send(&self, connection_id: &ConnectionId, event: WsEvent) -> Result<(), PublishError> {
        let sender = self
            .connection_channels
            .get(connection_id)
            .ok_or_else(|| PublishError::ConnectionNotFound(connection_id.clone()))?;

        sender
            .send(event)
            .map_err(|_| PublishError::ChannelClosed(connection_id.clone()))
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
