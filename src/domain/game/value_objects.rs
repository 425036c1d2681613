//! Game Context - Value Objects

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::GameError;

/// 连接唯一标识（WebSocket 连接生命周期内不变）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 截断后的短标识，用于拼接 GameId
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 游戏会话标识
///
/// 由微秒级时间戳加连接短标识组成，同一时钟刻度内短标识相同的两个连接理论上会冲突
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameId(String);

impl GameId {
    pub fn generate(connection_id: &ConnectionId, now: DateTime<Utc>) -> Self {
        Self(format!("{}-{}", now.timestamp_micros(), connection_id.short()))
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 移动方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn parse(token: &str) -> Result<Self, GameError> {
        match token {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            other => Err(GameError::UnknownCommand(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    fn delta(&self) -> (i32, i32) {
        match self {
            Self::Up => (0, 1),
            Self::Down => (0, -1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 网格坐标
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0, y: 0 };

    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// 单位步进，返回新坐标；在 i32 边界处停住
    pub fn apply(self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }

    /// 欧氏距离（全精度）
    pub fn distance(&self, other: &Position) -> f64 {
        let dx = f64::from(other.x) - f64::from(self.x);
        let dy = f64::from(other.y) - f64::from(self.y);
        dx.hypot(dy)
    }
}

/// 对外展示的距离，保留两位小数
pub fn format_distance(distance: f64) -> String {
    format!("{:.2}", distance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_unit_steps() {
        let p = Position::ORIGIN;
        assert_eq!(p.apply(Direction::Up), Position::new(0, 1));
        assert_eq!(p.apply(Direction::Down), Position::new(0, -1));
        assert_eq!(p.apply(Direction::Left), Position::new(-1, 0));
        assert_eq!(p.apply(Direction::Right), Position::new(1, 0));
    }

    #[test]
    fn test_apply_is_vector_sum() {
        let moves = [
            Direction::Right,
            Direction::Right,
            Direction::Up,
            Direction::Left,
            Direction::Down,
            Direction::Down,
        ];
        let end = moves.iter().fold(Position::new(3, -2), |p, d| p.apply(*d));
        assert_eq!(end, Position::new(4, -3));
    }

    #[test]
    fn test_apply_clamps_at_grid_edge() {
        let edge = Position::new(i32::MAX, i32::MIN);
        assert_eq!(edge.apply(Direction::Right), edge);
        assert_eq!(edge.apply(Direction::Down), edge);
        assert_eq!(edge.apply(Direction::Left), Position::new(i32::MAX - 1, i32::MIN));
    }

    #[test]
    fn test_distance_symmetric_and_zero_iff_equal() {
        let a = Position::new(0, 0);
        let b = Position::new(1, 1);
        assert_eq!(a.distance(&b), b.distance(&a));
        assert_eq!(a.distance(&a), 0.0);
        assert!(a.distance(&b) > 0.0);
        assert_eq!(format_distance(a.distance(&b)), "1.41");
    }

    #[test]
    fn test_distance_large_coordinates() {
        let a = Position::new(i32::MIN, 0);
        let b = Position::new(i32::MAX, 0);
        assert_eq!(a.distance(&b), 4294967295.0);
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!(Direction::parse("up").unwrap(), Direction::Up);
        assert_eq!(Direction::parse("right").unwrap(), Direction::Right);
        assert!(matches!(
            Direction::parse("jump"),
            Err(GameError::UnknownCommand(ref c)) if c == "jump"
        ));
        assert!(Direction::parse("UP").is_err());
    }

    #[test]
    fn test_game_id_uses_short_connection_id() {
        let conn = ConnectionId::from_string("abcdef0123456789");
        let now = Utc::now();
        let id = GameId::generate(&conn, now);
        assert_eq!(id.as_str(), format!("{}-abcdef01", now.timestamp_micros()));

        let short = ConnectionId::from_string("abc");
        assert_eq!(short.short(), "abc");
    }
}
