//! Command Handlers 实现

mod game_session_handlers;

pub use game_session_handlers::*;
