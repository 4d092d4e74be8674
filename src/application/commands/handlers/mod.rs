//! Command Handlers 实现

mod reset_handlers;
mod split_handlers;
mod synthesize_handlers;

pub use reset_handlers::*;
pub use split_handlers::*;
pub use synthesize_handlers::*;
