//! Synthesis Adapter - 实时语音合成客户端实现

mod fake_client;
mod live_client;

pub use fake_client::{FakeFailure, FakeSynthesisConfig, FakeSynthesisService};
pub use live_client::*;
