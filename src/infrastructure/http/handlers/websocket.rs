//! WebSocket Handler - 游戏连接传输层

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;

use crate::domain::game::ConnectionId;
use crate::infrastructure::http::state::AppState;

/// 游戏 WebSocket 连接处理
pub async fn game_websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_game_socket(socket, state))
}

async fn handle_game_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let connection_id = ConnectionId::new();

    // 先注册出站通道，initialState 才能送达
    let mut event_rx = state.event_publisher.register_connection(&connection_id);

    if let Err(e) = state.game_handler.connect(&connection_id).await {
        tracing::error!(connection_id = %connection_id, error = %e, "Failed to register connection");
        state.event_publisher.unregister_connection(&connection_id);
        let _ = sender.close().await;
        return;
    }

    tracing::info!(connection_id = %connection_id, "WebSocket connected");

    // 事件转发任务
    let connection_id_for_forward = connection_id.clone();
    let mut forward_task = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let msg = match serde_json::to_string(&event) {
                Ok(json) => Message::Text(json),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize event");
                    continue;
                }
            };

            if let Err(e) = sender.send(msg).await {
                tracing::debug!(
                    connection_id = %connection_id_for_forward,
                    error = %e,
                    "Failed to send WebSocket message"
                );
                break;
            }
        }
    });

    // 接收客户端消息，返回导致断开的错误（如有）
    let handler = state.game_handler.clone();
    let connection_id_for_receive = connection_id.clone();
    let mut receive_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let result = match msg {
                Ok(Message::Text(text)) => handler
                    .handle_message(&connection_id_for_receive, &text)
                    .await
                    .map(|_| ()),
                Ok(Message::Binary(_)) => Err(handler.reject_binary(&connection_id_for_receive).await),
                Ok(Message::Close(_)) => {
                    tracing::info!(connection_id = %connection_id_for_receive, "WebSocket closed by client");
                    break;
                }
                // ping/pong 由 axum 处理
                Ok(_) => Ok(()),
                Err(e) => return Some(e),
            };

            // 错误已在 handler 内回复或记录，此处只区分日志级别
            if let Err(e) = result {
                if e.is_client_visible() {
                    tracing::trace!(connection_id = %connection_id_for_receive, error = %e, "Client message rejected");
                } else {
                    tracing::debug!(connection_id = %connection_id_for_receive, error = %e, "Client message dropped");
                }
            }
        }
        None
    });

    // 等待任一任务完成
    let receive_error = tokio::select! {
        _ = &mut forward_task => None,
        result = &mut receive_task => result.ok().flatten(),
    };
    forward_task.abort();
    receive_task.abort();

    // 清理
    match receive_error {
        Some(e) => {
            state
                .game_handler
                .disconnect_with_error(&connection_id, &e)
                .await
        }
        None => state.game_handler.disconnect(&connection_id).await,
    }
    tracing::info!(connection_id = %connection_id, "WebSocket disconnected");
}
