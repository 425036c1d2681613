//! Game Session Handler - 命令分发
//!
//! 连接生命周期事件（connect / message / close / error）与超时回调的统一入口。
//! 所有对同一连接会话的修改都在 SessionRegistry 的串行执行区内完成。

use chrono::Utc;
use std::sync::Arc;

use crate::application::commands::MoveCommand;
use crate::application::error::ApplicationError;
use crate::application::ports::{MoveEventRecord, MoveEventRepositoryPort};
use crate::domain::game::{format_distance, ConnectionId, Position};
use crate::infrastructure::events::EventPublisher;
use crate::infrastructure::memory::{SessionError, SessionRegistry};
use crate::infrastructure::worker::MoveEventWriter;

/// GameSession Handler
pub struct GameSessionHandler {
    registry: Arc<SessionRegistry>,
    event_publisher: Arc<EventPublisher>,
    move_event_repo: Arc<dyn MoveEventRepositoryPort>,
}

impl GameSessionHandler {
    pub fn new(
        registry: Arc<SessionRegistry>,
        event_publisher: Arc<EventPublisher>,
        move_event_repo: Arc<dyn MoveEventRepositoryPort>,
    ) -> Self {
        Self {
            registry,
            event_publisher,
            move_event_repo,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// 连接建立：创建 Idle 会话并推送 initialState
    ///
    /// 调用前连接的出站通道应已在 EventPublisher 注册
    pub async fn connect(&self, connection_id: &ConnectionId) -> Result<Position, ApplicationError> {
        let (move_events, _writer) =
            MoveEventWriter::spawn(connection_id.clone(), self.move_event_repo.clone());

        let handle = self
            .registry
            .register(connection_id, move_events)
            .map_err(|e| match e {
                SessionError::AlreadyRegistered(id) => {
                    ApplicationError::AlreadyRegistered(id.to_string())
                }
            })?;

        let position = handle.lock().await.session().current_position();
        if let Err(e) = self
            .event_publisher
            .publish_initial_state(connection_id, position)
        {
            tracing::debug!(connection_id = %connection_id, error = %e, "Failed to send initialState");
        }

        tracing::info!(connection_id = %connection_id, x = position.x, y = position.y, "Player connected");
        Ok(position)
    }

    /// 处理一条入站消息
    ///
    /// 校验失败时回复 error 且不改变状态、不重置超时；未注册连接的消息静默丢弃
    pub async fn handle_message(
        self: &Arc<Self>,
        connection_id: &ConnectionId,
        raw: &str,
    ) -> Result<Position, ApplicationError> {
        let Some(mut slot) = self.registry.acquire(connection_id).await else {
            tracing::warn!(
                connection_id = %connection_id,
                "Message from unregistered connection dropped"
            );
            return Err(ApplicationError::UnregisteredConnection(
                connection_id.to_string(),
            ));
        };

        let command = match MoveCommand::parse(connection_id, raw) {
            Ok(command) => command,
            Err(e) => {
                tracing::debug!(connection_id = %connection_id, error = %e, "Command rejected");
                if let Err(send_err) = self
                    .event_publisher
                    .publish_error(connection_id, &e.to_string())
                {
                    tracing::debug!(
                        connection_id = %connection_id,
                        error = %send_err,
                        "Failed to send error reply"
                    );
                }
                return Err(e);
            }
        };

        let now = Utc::now();
        let outcome = slot.session_mut().apply(command.direction, now);

        if outcome.started {
            tracing::info!(
                connection_id = %connection_id,
                game_id = %outcome.game_id,
                "Game started"
            );
        }

        // 回复与持久化互不影响：任一失败只记录日志
        if let Err(e) = self
            .event_publisher
            .publish_position_update(connection_id, outcome.position)
        {
            tracing::debug!(connection_id = %connection_id, error = %e, "Failed to send positionUpdate");
        }

        let record = MoveEventRecord {
            session_id: outcome.game_id.clone(),
            connection_id: connection_id.clone(),
            command: command.direction,
            x: outcome.position.x,
            y: outcome.position.y,
            timestamp: now,
        };
        if !slot.record_move(record) {
            tracing::warn!(connection_id = %connection_id, "Move event queue closed, event dropped");
        }

        let handler = Arc::clone(self);
        let deadline_connection = connection_id.clone();
        let version = outcome.deadline_version;
        self.registry.arm_deadline(
            &mut slot,
            Box::pin(async move {
                handler.handle_deadline(&deadline_connection, version).await;
            }),
        );

        Ok(outcome.position)
    }

    /// 处理二进制帧：不解析，直接按格式错误回复，状态与超时均不变
    pub async fn reject_binary(&self, connection_id: &ConnectionId) -> ApplicationError {
        if self.registry.acquire(connection_id).await.is_none() {
            tracing::warn!(
                connection_id = %connection_id,
                "Binary frame from unregistered connection dropped"
            );
            return ApplicationError::UnregisteredConnection(connection_id.to_string());
        }

        let err = ApplicationError::malformed("binary frames are not supported");
        tracing::debug!(connection_id = %connection_id, error = %err, "Command rejected");
        if let Err(send_err) = self.event_publisher.publish_error(connection_id, &err.to_string()) {
            tracing::debug!(
                connection_id = %connection_id,
                error = %send_err,
                "Failed to send error reply"
            );
        }
        err
    }

    /// 超时回调：版本一致时结束游戏并推送 gameOver + positionUpdate {0,0}
    ///
    /// 连接已移除或版本过期时静默返回
    pub async fn handle_deadline(&self, connection_id: &ConnectionId, version: u64) {
        let Some(mut slot) = self.registry.acquire(connection_id).await else {
            tracing::trace!(connection_id = %connection_id, "Deadline fired for removed connection");
            return;
        };

        let Some(summary) = slot.session_mut().expire(version, Utc::now()) else {
            tracing::trace!(connection_id = %connection_id, version = version, "Stale deadline ignored");
            return;
        };
        slot.clear_deadline();

        tracing::info!(
            connection_id = %connection_id,
            game_id = %summary.game_id,
            distance = %format_distance(summary.distance),
            "Game over"
        );

        if let Err(e) = self.event_publisher.publish_game_over(connection_id, &summary) {
            tracing::debug!(connection_id = %connection_id, error = %e, "Failed to send gameOver");
        }
        if let Err(e) = self
            .event_publisher
            .publish_position_update(connection_id, slot.session().current_position())
        {
            tracing::debug!(connection_id = %connection_id, error = %e, "Failed to send positionUpdate");
        }
    }

    /// 连接关闭：取消超时并移除会话，不推送 gameOver
    pub async fn disconnect(&self, connection_id: &ConnectionId) {
        if self.registry.remove(connection_id).await {
            tracing::info!(connection_id = %connection_id, "Player disconnected");
        }
        self.event_publisher.unregister_connection(connection_id);
    }

    /// 连接出错：记录后按关闭处理
    pub async fn disconnect_with_error(
        &self,
        connection_id: &ConnectionId,
        error: &(dyn std::error::Error + Send + Sync),
    ) {
        tracing::warn!(connection_id = %connection_id, error = %error, "Connection error");
        self.disconnect(connection_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::RepositoryError;
    use crate::domain::game::{Direction, SessionStatus};
    use crate::infrastructure::events::WsEvent;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    const TIMEOUT: Duration = Duration::from_secs(10);

    #[derive(Default)]
    struct RecordingRepository {
        records: Mutex<Vec<MoveEventRecord>>,
        fail: bool,
    }

    #[async_trait]
    impl MoveEventRepositoryPort for RecordingRepository {
        async fn append(&self, record: &MoveEventRecord) -> Result<(), RepositoryError> {
            if self.fail {
                return Err(RepositoryError::DatabaseError("sink unavailable".into()));
            }
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn find_by_connection(
            &self,
            connection_id: &ConnectionId,
        ) -> Result<Vec<MoveEventRecord>, RepositoryError> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| &r.connection_id == connection_id)
                .cloned()
                .collect())
        }
    }

    struct Fixture {
        handler: Arc<GameSessionHandler>,
        publisher: Arc<EventPublisher>,
        repo: Arc<RecordingRepository>,
    }

    fn fixture_with(repo: RecordingRepository) -> Fixture {
        let publisher = Arc::new(EventPublisher::new());
        let repo = Arc::new(repo);
        let handler = Arc::new(GameSessionHandler::new(
            Arc::new(SessionRegistry::new(TIMEOUT)),
            publisher.clone(),
            repo.clone(),
        ));
        Fixture {
            handler,
            publisher,
            repo,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(RecordingRepository::default())
    }

    async fn connect(f: &Fixture) -> (ConnectionId, UnboundedReceiver<WsEvent>) {
        let conn = ConnectionId::new();
        let mut rx = f.publisher.register_connection(&conn);
        f.handler.connect(&conn).await.unwrap();
        assert_eq!(rx.recv().await, Some(WsEvent::InitialState { x: 0, y: 0 }));
        (conn, rx)
    }

    fn move_msg(command: &str) -> String {
        format!(r#"{{"command":"{}"}}"#, command)
    }

    /// 暂停时钟下推进 1ms，让已就绪的后台任务先跑完
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    fn drain(rx: &mut UnboundedReceiver<WsEvent>) -> Vec<WsEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn test_moves_without_timeout() {
        let f = fixture();
        let (conn, mut rx) = connect(&f).await;

        for command in ["right", "right", "up"] {
            f.handler.handle_message(&conn, &move_msg(command)).await.unwrap();
        }

        assert_eq!(
            drain(&mut rx),
            vec![
                WsEvent::PositionUpdate { x: 1, y: 0 },
                WsEvent::PositionUpdate { x: 2, y: 0 },
                WsEvent::PositionUpdate { x: 2, y: 1 },
            ]
        );

        // 持久化在独立任务中完成
        settle().await;
        let stored = f.repo.find_by_connection(&conn).await.unwrap();
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[2].command, Direction::Up);
        assert_eq!((stored[2].x, stored[2].y), (2, 1));
        assert!(stored.iter().all(|r| r.session_id == stored[0].session_id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_emits_game_over_then_reset() {
        let f = fixture();
        let (conn, mut rx) = connect(&f).await;

        f.handler.handle_message(&conn, &move_msg("right")).await.unwrap();
        f.handler.handle_message(&conn, &move_msg("up")).await.unwrap();
        tokio::time::sleep(TIMEOUT + Duration::from_millis(10)).await;

        let events = drain(&mut rx);
        assert_eq!(events.len(), 4);
        assert_eq!(events[0], WsEvent::PositionUpdate { x: 1, y: 0 });
        assert_eq!(events[1], WsEvent::PositionUpdate { x: 1, y: 1 });
        match &events[2] {
            WsEvent::GameOver {
                distance,
                start_time,
                end_time,
                ..
            } => {
                assert_eq!(distance, "1.41");
                assert!(end_time >= start_time);
            }
            other => panic!("expected gameOver, got {other:?}"),
        }
        assert_eq!(events[3], WsEvent::PositionUpdate { x: 0, y: 0 });

        let slot = f.handler.registry().acquire(&conn).await.unwrap();
        assert_eq!(slot.session().status(), SessionStatus::Idle);
        assert_eq!(slot.session().current_position(), Position::ORIGIN);
        assert!(!slot.has_pending_deadline());
    }

    #[tokio::test(start_paused = true)]
    async fn test_move_before_deadline_rearms() {
        let f = fixture();
        let (conn, mut rx) = connect(&f).await;

        f.handler.handle_message(&conn, &move_msg("left")).await.unwrap();
        tokio::time::sleep(TIMEOUT - Duration::from_secs(1)).await;
        f.handler.handle_message(&conn, &move_msg("left")).await.unwrap();

        // 第一次超时点已过，不应出现 gameOver
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(
            drain(&mut rx),
            vec![
                WsEvent::PositionUpdate { x: -1, y: 0 },
                WsEvent::PositionUpdate { x: -2, y: 0 },
            ]
        );

        tokio::time::sleep(TIMEOUT).await;
        let events = drain(&mut rx);
        let game_overs = events
            .iter()
            .filter(|e| matches!(e, WsEvent::GameOver { .. }))
            .count();
        assert_eq!(game_overs, 1);
        assert!(matches!(
            &events[0],
            WsEvent::GameOver { distance, .. } if distance == "2.00"
        ));
        assert_eq!(events[1], WsEvent::PositionUpdate { x: 0, y: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_command_is_rejected() {
        let f = fixture();
        let (conn, mut rx) = connect(&f).await;
        f.handler.handle_message(&conn, &move_msg("up")).await.unwrap();
        drain(&mut rx);

        tokio::time::sleep(TIMEOUT - Duration::from_secs(1)).await;
        let err = f
            .handler
            .handle_message(&conn, &move_msg("jump"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::UnknownCommand(_)));
        assert_eq!(
            drain(&mut rx),
            vec![WsEvent::Error {
                message: "Unknown command: jump".into()
            }]
        );

        // 非法命令不重置超时：原定超时点照常触发
        tokio::time::sleep(Duration::from_secs(2)).await;
        let events = drain(&mut rx);
        assert!(matches!(events[0], WsEvent::GameOver { .. }));

        settle().await;
        assert_eq!(f.repo.find_by_connection(&conn).await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_payload_only_replies_error() {
        let f = fixture();
        let (conn, mut rx) = connect(&f).await;

        let err = f.handler.handle_message(&conn, "{not json").await.unwrap_err();
        assert!(matches!(err, ApplicationError::MalformedMessage(_)));

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], WsEvent::Error { .. }));

        let slot = f.handler.registry().acquire(&conn).await.unwrap();
        assert_eq!(slot.session().status(), SessionStatus::Idle);
        assert!(!slot.has_pending_deadline());
        drop(slot);

        tokio::time::sleep(TIMEOUT * 2).await;
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_binary_frame_rejected_without_moving() {
        let f = fixture();
        let (conn, mut rx) = connect(&f).await;
        f.handler.handle_message(&conn, &move_msg("up")).await.unwrap();
        drain(&mut rx);

        tokio::time::sleep(TIMEOUT - Duration::from_secs(1)).await;
        let err = f.handler.reject_binary(&conn).await;
        assert!(matches!(err, ApplicationError::MalformedMessage(_)));
        assert!(err.is_client_visible());
        assert_eq!(
            drain(&mut rx),
            vec![WsEvent::Error {
                message: "Malformed message: binary frames are not supported".into()
            }]
        );

        let slot = f.handler.registry().acquire(&conn).await.unwrap();
        assert_eq!(slot.session().current_position(), Position::new(0, 1));
        drop(slot);

        // 二进制帧不重置超时
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(matches!(drain(&mut rx)[0], WsEvent::GameOver { .. }));

        let stranger = ConnectionId::new();
        let mut stranger_rx = f.publisher.register_connection(&stranger);
        let err = f.handler.reject_binary(&stranger).await;
        assert!(matches!(err, ApplicationError::UnregisteredConnection(_)));
        assert!(drain(&mut stranger_rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_skips_game_over() {
        let f = fixture();
        let (conn, mut rx) = connect(&f).await;

        f.handler.handle_message(&conn, &move_msg("down")).await.unwrap();
        f.handler.disconnect(&conn).await;
        // 幂等
        f.handler.disconnect(&conn).await;

        tokio::time::sleep(TIMEOUT * 2).await;
        let events = drain(&mut rx);
        assert_eq!(events, vec![WsEvent::PositionUpdate { x: 0, y: -1 }]);
        assert!(!f.handler.registry().contains(&conn));
        assert!(!f.publisher.is_registered(&conn));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_deadline_is_noop() {
        let f = fixture();
        let (conn, mut rx) = connect(&f).await;

        f.handler.handle_message(&conn, &move_msg("up")).await.unwrap();
        f.handler.handle_message(&conn, &move_msg("up")).await.unwrap();
        drain(&mut rx);

        // 直接投递旧版本的超时
        f.handler.handle_deadline(&conn, 1).await;
        assert!(drain(&mut rx).is_empty());

        // 已移除连接上的超时同样静默
        f.handler.disconnect(&conn).await;
        f.handler.handle_deadline(&conn, 2).await;
    }

    #[tokio::test]
    async fn test_unregistered_connection_is_dropped_silently() {
        let f = fixture();
        let conn = ConnectionId::new();
        let mut rx = f.publisher.register_connection(&conn);

        let err = f
            .handler
            .handle_message(&conn, &move_msg("up"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::UnregisteredConnection(_)));
        assert!(!err.is_client_visible());
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_connect_rejected() {
        let f = fixture();
        let (conn, _rx) = connect(&f).await;
        assert!(matches!(
            f.handler.connect(&conn).await,
            Err(ApplicationError::AlreadyRegistered(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistence_failure_does_not_block_reply() {
        let f = fixture_with(RecordingRepository {
            fail: true,
            ..Default::default()
        });
        let (conn, mut rx) = connect(&f).await;

        let position = f.handler.handle_message(&conn, &move_msg("right")).await.unwrap();
        assert_eq!(position, Position::new(1, 0));
        assert_eq!(drain(&mut rx), vec![WsEvent::PositionUpdate { x: 1, y: 0 }]);

        settle().await;
        assert!(f.repo.find_by_connection(&conn).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_failure_does_not_block_persistence() {
        let f = fixture();
        let (conn, rx) = connect(&f).await;
        drop(rx);

        f.handler.handle_message(&conn, &move_msg("up")).await.unwrap();
        settle().await;
        assert_eq!(f.repo.find_by_connection(&conn).await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connections_are_independent() {
        let f = fixture();
        let (a, mut rx_a) = connect(&f).await;
        let (b, mut rx_b) = connect(&f).await;

        f.handler.handle_message(&a, &move_msg("right")).await.unwrap();
        tokio::time::sleep(TIMEOUT / 2).await;
        f.handler.handle_message(&b, &move_msg("left")).await.unwrap();

        tokio::time::sleep(TIMEOUT / 2 + Duration::from_millis(10)).await;
        let events_a = drain(&mut rx_a);
        let events_b = drain(&mut rx_b);
        assert!(events_a.iter().any(|e| matches!(e, WsEvent::GameOver { .. })));
        assert_eq!(events_b, vec![WsEvent::PositionUpdate { x: -1, y: 0 }]);
    }
}
