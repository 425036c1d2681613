//! Game Context - Errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GameError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
}
