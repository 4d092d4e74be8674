//! 应用层 - 命令（写操作）
//!
//! CQRS 命令侧：分段、合成、重置音频

mod reset_commands;
mod split_commands;
mod synthesize_commands;

pub mod handlers;

pub use reset_commands::*;
pub use split_commands::*;
pub use synthesize_commands::*;
