//! Move Event Writer - Per-Connection Persistence Worker

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::application::ports::{MoveEventRecord, MoveEventRepositoryPort};
use crate::domain::game::ConnectionId;

/// 移动事件写入队列的发送端
pub type MoveEventQueue = mpsc::UnboundedSender<MoveEventRecord>;

/// 移动事件写入 Worker
///
/// 每个连接一个实例，按入队顺序逐条追加到持久化端口。
/// 写入与客户端回复解耦：发送端入队后立即返回，连接之间互不阻塞。
pub struct MoveEventWriter {
    connection_id: ConnectionId,
    queue_receiver: mpsc::UnboundedReceiver<MoveEventRecord>,
    repository: Arc<dyn MoveEventRepositoryPort>,
}

impl MoveEventWriter {
    pub fn new(
        connection_id: ConnectionId,
        queue_receiver: mpsc::UnboundedReceiver<MoveEventRecord>,
        repository: Arc<dyn MoveEventRepositoryPort>,
    ) -> Self {
        Self {
            connection_id,
            queue_receiver,
            repository,
        }
    }

    /// 创建队列并启动 Worker
    pub fn spawn(
        connection_id: ConnectionId,
        repository: Arc<dyn MoveEventRepositoryPort>,
    ) -> (MoveEventQueue, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Self::new(connection_id, rx, repository);
        (tx, tokio::spawn(worker.run()))
    }

    /// 启动 Worker，发送端全部释放且队列排空后退出
    pub async fn run(mut self) {
        tracing::debug!(connection_id = %self.connection_id, "MoveEventWriter started");

        let mut written = 0usize;
        while let Some(record) = self.queue_receiver.recv().await {
            match self.repository.append(&record).await {
                Ok(()) => written += 1,
                Err(e) => {
                    tracing::warn!(
                        connection_id = %self.connection_id,
                        game_id = %record.session_id,
                        command = %record.command,
                        error = %e,
                        "Failed to persist move event"
                    );
                }
            }
        }

        tracing::debug!(
            connection_id = %self.connection_id,
            written = written,
            "MoveEventWriter stopped"
        );
    }
}
