//! HTTP Handlers

mod ping;
mod websocket;

pub use ping::*;
pub use websocket::*;
