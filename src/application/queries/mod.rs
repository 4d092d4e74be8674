//! 应用层 - 查询（读操作）
//!
//! CQRS 查询侧：音频完整性校验

mod verify_queries;

pub mod handlers;

pub use verify_queries::*;
