//! SQLite Move Event Repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::DbPool;
use crate::application::ports::{MoveEventRecord, MoveEventRepositoryPort, RepositoryError};
use crate::domain::game::{ConnectionId, Direction, GameId};

/// SQLite Move Event Repository
pub struct SqliteMoveEventRepository {
    pool: DbPool,
}

impl SqliteMoveEventRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct MoveEventRow {
    session_id: String,
    connection_id: String,
    command: String,
    x: i64,
    y: i64,
    recorded_at: String,
}

impl TryFrom<MoveEventRow> for MoveEventRecord {
    type Error = RepositoryError;

    fn try_from(row: MoveEventRow) -> Result<Self, Self::Error> {
        Ok(MoveEventRecord {
            session_id: GameId::from_string(row.session_id),
            connection_id: ConnectionId::from_string(row.connection_id),
            command: Direction::parse(&row.command)
                .map_err(|e| RepositoryError::SerializationError(e.to_string()))?,
            x: i32::try_from(row.x)
                .map_err(|e| RepositoryError::SerializationError(e.to_string()))?,
            y: i32::try_from(row.y)
                .map_err(|e| RepositoryError::SerializationError(e.to_string()))?,
            timestamp: DateTime::parse_from_rfc3339(&row.recorded_at)
                .map_err(|e| RepositoryError::SerializationError(e.to_string()))?
                .with_timezone(&Utc),
        })
    }
}

#[async_trait]
impl MoveEventRepositoryPort for SqliteMoveEventRepository {
    async fn append(&self, record: &MoveEventRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO move_events (session_id, connection_id, command, x, y, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.session_id.as_str())
        .bind(record.connection_id.as_str())
        .bind(record.command.as_str())
        .bind(i64::from(record.x))
        .bind(i64::from(record.y))
        .bind(record.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn find_by_connection(
        &self,
        connection_id: &ConnectionId,
    ) -> Result<Vec<MoveEventRecord>, RepositoryError> {
        let rows: Vec<MoveEventRow> = sqlx::query_as(
            "SELECT session_id, connection_id, command, x, y, recorded_at FROM move_events WHERE connection_id = ? ORDER BY id ASC",
        )
        .bind(connection_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(MoveEventRecord::try_from).collect()
    }
}
