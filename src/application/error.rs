//! 应用层错误定义
//!
//! 统一的命令处理错误类型

use thiserror::Error;

use crate::domain::game::GameError;

/// 应用层错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 无法解析的消息（非 JSON，或缺少字符串类型的 command 字段）
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// 结构合法但命令未知
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// 来自未注册连接的消息
    #[error("Connection not registered: {0}")]
    UnregisteredConnection(String),

    /// 连接重复注册
    #[error("Connection already registered: {0}")]
    AlreadyRegistered(String),
}

impl ApplicationError {
    /// 创建消息格式错误
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedMessage(message.into())
    }

    /// 是否需要向客户端回复 error 消息
    ///
    /// 未注册连接的消息静默丢弃，只记录日志
    pub fn is_client_visible(&self) -> bool {
        matches!(self, Self::MalformedMessage(_) | Self::UnknownCommand(_))
    }
}

impl From<GameError> for ApplicationError {
    fn from(err: GameError) -> Self {
        match err {
            GameError::UnknownCommand(command) => Self::UnknownCommand(command),
        }
    }
}
