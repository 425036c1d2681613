//! Move Commands - 移动命令
//!
//! 入站消息格式: `{"command": "up" | "down" | "left" | "right"}`

use serde_json::{Map, Value};

use crate::application::error::ApplicationError;
use crate::domain::game::{ConnectionId, Direction};

/// 移动命令 - 已通过校验的单步移动
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveCommand {
    pub connection_id: ConnectionId,
    pub direction: Direction,
}

impl MoveCommand {
    /// 解析并校验原始文本消息
    ///
    /// - 非 JSON 对象、缺少 command 或 command 非字符串 → MalformedMessage
    /// - command 不在四个方向之内 → UnknownCommand
    pub fn parse(connection_id: &ConnectionId, raw: &str) -> Result<Self, ApplicationError> {
        // 只接受 JSON 对象；数组等其他形状一律视为格式错误
        let message: Map<String, Value> = serde_json::from_str(raw)
            .map_err(|e| ApplicationError::malformed(e.to_string()))?;
        let command = match message.get("command") {
            Some(Value::String(command)) => command,
            Some(_) => return Err(ApplicationError::malformed("command must be a string")),
            None => return Err(ApplicationError::malformed("missing command field")),
        };
        let direction = Direction::parse(command)?;

        Ok(Self {
            connection_id: connection_id.clone(),
            direction,
        })
    }
}
