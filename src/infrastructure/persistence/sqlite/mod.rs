//! SQLite Persistence - SQLite 数据库持久化实现

mod database;
mod move_event_repo;

pub use database::*;
pub use move_event_repo::*;
