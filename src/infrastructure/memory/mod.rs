//! Memory Layer - In-Memory State Management
//!
//! 实现 RunTracker，记录一次分发运行中片段状态与在途会话数

mod run_tracker;

pub use run_tracker::InMemoryRunTracker;
