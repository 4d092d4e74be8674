//! Worker Layer - Segment Synthesis
//!
//! 实现 StreamingAdapter（单片段流式合成）与 SessionPoolDispatcher（会话池分发）

mod session_pool;
mod streaming_adapter;

pub use session_pool::{SessionPoolConfig, SessionPoolDispatcher, DEFAULT_POOL_SIZE};
pub use streaming_adapter::{StreamingAdapter, StreamingAdapterConfig, SynthesisFailure};
