//! Query Handlers 实现

mod assembly_handlers;

pub use assembly_handlers::*;
