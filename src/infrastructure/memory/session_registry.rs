//! In-Memory Session Registry Implementation
//!
//! 连接 -> 游戏会话的并发映射，同时持有每个连接的超时定时器。
//!
//! 每个连接的状态放在独立的 `tokio::sync::Mutex` 中：命令处理与该连接的超时回调
//! 都必须先通过 [`SessionRegistry::acquire`] 取得锁，因此同一连接上的状态迁移严格串行，
//! 不同连接之间互不阻塞。

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;

use crate::application::ports::MoveEventRecord;
use crate::domain::game::{ConnectionId, GameSession};
use crate::infrastructure::worker::MoveEventQueue;

/// Session Registry 错误
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Connection already registered: {0}")]
    AlreadyRegistered(ConnectionId),
}

/// 单个连接的会话槽位
pub struct ConnectionSlot {
    session: GameSession,
    deadline: Option<JoinHandle<()>>,
    move_events: Option<MoveEventQueue>,
    closed: bool,
}

impl ConnectionSlot {
    fn new(connection_id: ConnectionId, move_events: MoveEventQueue) -> Self {
        Self {
            session: GameSession::new(connection_id),
            deadline: None,
            move_events: Some(move_events),
            closed: false,
        }
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut GameSession {
        &mut self.session
    }

    /// 将移动事件放入该连接的写入队列，队列已关闭时返回 false
    pub fn record_move(&self, record: MoveEventRecord) -> bool {
        match &self.move_events {
            Some(queue) => queue.send(record).is_ok(),
            None => false,
        }
    }

    pub fn has_pending_deadline(&self) -> bool {
        self.deadline
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// 超时回调自身完成时调用：释放句柄，不中止
    pub fn clear_deadline(&mut self) {
        self.deadline = None;
    }

    fn cancel_deadline(&mut self) {
        if let Some(handle) = self.deadline.take() {
            handle.abort();
        }
    }
}

/// 会话句柄
pub type SessionHandle = Arc<Mutex<ConnectionSlot>>;

/// 内存会话注册表
pub struct SessionRegistry {
    slots: DashMap<ConnectionId, SessionHandle>,
    inactivity_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(inactivity_timeout: Duration) -> Self {
        Self {
            slots: DashMap::new(),
            inactivity_timeout,
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn inactivity_timeout(&self) -> Duration {
        self.inactivity_timeout
    }

    /// 为新连接创建 Idle 会话
    pub fn register(
        &self,
        connection_id: &ConnectionId,
        move_events: MoveEventQueue,
    ) -> Result<SessionHandle, SessionError> {
        match self.slots.entry(connection_id.clone()) {
            Entry::Occupied(_) => Err(SessionError::AlreadyRegistered(connection_id.clone())),
            Entry::Vacant(entry) => {
                let handle = Arc::new(Mutex::new(ConnectionSlot::new(
                    connection_id.clone(),
                    move_events,
                )));
                entry.insert(handle.clone());
                tracing::info!(connection_id = %connection_id, "Session registered");
                Ok(handle)
            }
        }
    }

    /// 进入连接的串行执行区
    ///
    /// 连接不存在，或在等待锁期间已被移除时返回 None
    pub async fn acquire(
        &self,
        connection_id: &ConnectionId,
    ) -> Option<OwnedMutexGuard<ConnectionSlot>> {
        // 先克隆 Arc 再 await，避免跨 await 持有 DashMap 分片锁
        let handle = self.slots.get(connection_id).map(|entry| entry.value().clone())?;
        let slot = handle.lock_owned().await;
        if slot.closed {
            return None;
        }
        Some(slot)
    }

    /// 取消旧定时器并重新布置超时
    ///
    /// 同一连接任何时刻至多一个待触发的定时器
    pub fn arm_deadline(&self, slot: &mut ConnectionSlot, on_deadline: BoxFuture<'static, ()>) {
        slot.cancel_deadline();
        let timeout = self.inactivity_timeout;
        slot.deadline = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            on_deadline.await;
        }));
    }

    /// 移除连接：取消定时器、关闭写入队列、丢弃进行中的游戏（不产生摘要）
    ///
    /// 幂等，已移除的连接返回 false
    pub async fn remove(&self, connection_id: &ConnectionId) -> bool {
        let Some((_, handle)) = self.slots.remove(connection_id) else {
            return false;
        };

        let mut slot = handle.lock().await;
        slot.closed = true;
        slot.cancel_deadline();
        slot.move_events = None;
        let abandoned = slot.session.abandon();

        tracing::info!(
            connection_id = %connection_id,
            abandoned_game = ?abandoned.as_ref().map(|id| id.as_str()),
            "Session removed"
        );
        true
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.slots.contains_key(connection_id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
