//! Events - WebSocket 出站事件

mod publisher;

pub use publisher::{EventPublisher, PublishError, WsEvent};
