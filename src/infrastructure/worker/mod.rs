//! Worker Layer - Background Task Processing
//!
//! 实现 MoveEventWriter，按连接顺序持久化移动事件

mod move_event_writer;

pub use move_event_writer::{MoveEventQueue, MoveEventWriter};
