//! HTTP Layer - WebSocket 传输 + 健康检查

pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;

pub use routes::create_routes;
pub use server::{HttpServer, ServerConfig};
pub use state::AppState;
