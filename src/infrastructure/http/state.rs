//! Application State

use std::sync::Arc;

use crate::application::{GameSessionHandler, MoveEventRepositoryPort};
use crate::infrastructure::events::EventPublisher;
use crate::infrastructure::memory::SessionRegistry;

/// 应用状态
pub struct AppState {
    pub event_publisher: Arc<EventPublisher>,
    pub game_handler: Arc<GameSessionHandler>,
}

impl AppState {
    /// 创建应用状态
    pub fn new(
        registry: Arc<SessionRegistry>,
        event_publisher: Arc<EventPublisher>,
        move_event_repo: Arc<dyn MoveEventRepositoryPort>,
    ) -> Self {
        Self {
            event_publisher: event_publisher.clone(),
            game_handler: Arc::new(GameSessionHandler::new(
                registry,
                event_publisher,
                move_event_repo,
            )),
        }
    }
}
