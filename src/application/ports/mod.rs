//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod move_events;

pub use move_events::{MoveEventRecord, MoveEventRepositoryPort, RepositoryError};
