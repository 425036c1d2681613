//! Game Context - Aggregate Root

use chrono::{DateTime, Utc};

use super::{ConnectionId, Direction, GameId, Position};

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// 无进行中的游戏
    Idle,
    /// 游戏进行中，接受移动
    Active,
}

/// 进行中游戏的会话级字段，Idle 时整体清空
#[derive(Debug, Clone)]
struct ActiveGame {
    id: GameId,
    start_position: Position,
    started_at: DateTime<Utc>,
}

/// 一次被接受的移动的结果
#[derive(Debug, Clone)]
pub struct MoveOutcome {
    pub game_id: GameId,
    pub direction: Direction,
    pub position: Position,
    /// 本次移动是否开启了新游戏
    pub started: bool,
    /// 本次移动之后应布置的超时版本
    pub deadline_version: u64,
}

/// 游戏结束摘要
#[derive(Debug, Clone)]
pub struct GameSummary {
    pub game_id: GameId,
    /// 起点到最后位置的欧氏距离（全精度）
    pub distance: f64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

/// GameSession 聚合根 - 单个连接的游戏状态机
///
/// 不变量:
/// - Active 当且仅当 active 字段存在（即 start_position 已设置）
/// - 开启新游戏不重置 current_position，只有超时结束才归零
/// - 每个 deadline_version 至多结束一次游戏
#[derive(Debug, Clone)]
pub struct GameSession {
    connection_id: ConnectionId,
    current_position: Position,
    last_position: Option<Position>,
    active: Option<ActiveGame>,
    deadline_version: u64,
}

impl GameSession {
    /// 新连接以 Idle 状态、原点位置创建
    pub fn new(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            current_position: Position::ORIGIN,
            last_position: None,
            active: None,
            deadline_version: 0,
        }
    }

    /// 执行一次合法移动
    ///
    /// Idle 时先开启新游戏（记录起点、分配 GameId），然后移动并推进超时版本
    pub fn apply(&mut self, direction: Direction, now: DateTime<Utc>) -> MoveOutcome {
        let started = self.active.is_none();
        let connection_id = &self.connection_id;
        let start_position = self.current_position;
        let game_id = self
            .active
            .get_or_insert_with(|| ActiveGame {
                id: GameId::generate(connection_id, now),
                start_position,
                started_at: now,
            })
            .id
            .clone();

        self.current_position = self.current_position.apply(direction);
        self.last_position = Some(self.current_position);
        self.deadline_version += 1;

        MoveOutcome {
            game_id,
            direction,
            position: self.current_position,
            started,
            deadline_version: self.deadline_version,
        }
    }

    /// 超时触发：版本一致且处于 Active 时结束游戏
    ///
    /// 返回 None 表示过期的触发（已被更新的移动取代，或当前无游戏）
    pub fn expire(&mut self, version: u64, now: DateTime<Utc>) -> Option<GameSummary> {
        if version != self.deadline_version {
            return None;
        }
        let game = self.active.take()?;

        let distance = self
            .last_position
            .map(|last| game.start_position.distance(&last))
            .unwrap_or(0.0);

        self.last_position = None;
        self.current_position = Position::ORIGIN;

        Some(GameSummary {
            game_id: game.id,
            distance,
            started_at: game.started_at,
            ended_at: now,
        })
    }

    /// 连接关闭时放弃进行中的游戏，不产生摘要
    pub fn abandon(&mut self) -> Option<GameId> {
        self.deadline_version += 1;
        self.last_position = None;
        self.current_position = Position::ORIGIN;
        self.active.take().map(|game| game.id)
    }

    // Getters
    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    pub fn status(&self) -> SessionStatus {
        if self.active.is_some() {
            SessionStatus::Active
        } else {
            SessionStatus::Idle
        }
    }

    pub fn current_position(&self) -> Position {
        self.current_position
    }

    pub fn last_position(&self) -> Option<Position> {
        self.last_position
    }

    pub fn start_position(&self) -> Option<Position> {
        self.active.as_ref().map(|game| game.start_position)
    }

    pub fn game_id(&self) -> Option<&GameId> {
        self.active.as_ref().map(|game| &game.id)
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.active.as_ref().map(|game| game.started_at)
    }

    pub fn deadline_version(&self) -> u64 {
        self.deadline_version
    }
}
