//! Synthesis Port - 实时语音合成会话抽象
//!
//! 外部服务为会话式流协议：每个会话发送一次请求，服务端推送音频帧，
//! 最后以显式的完成或错误信号结束。具体实现在 infrastructure/adapters 层。

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// 合成错误
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("Failed to open session: {0}")]
    SessionOpen(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Timed out after {}ms without progress", .0.as_millis())]
    Timeout(Duration),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl SynthesisError {
    /// 短标签，用于日志与报告
    pub fn kind(&self) -> &'static str {
        match self {
            SynthesisError::SessionOpen(_) => "session_open",
            SynthesisError::StreamInterrupted(_) => "stream_interrupted",
            SynthesisError::MalformedFrame(_) => "malformed_frame",
            SynthesisError::Timeout(_) => "timeout",
            SynthesisError::Storage(_) => "storage",
        }
    }
}

/// 服务端推送的一帧音频
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    /// 原始 PCM 数据（16 位小端）
    pub data: Vec<u8>,
    /// 服务端声明的采样率
    pub sample_rate: Option<u32>,
}

impl AudioFrame {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            sample_rate: None,
        }
    }
}

/// 一个打开的合成会话
///
/// 只处理一个片段；`next_frame` 返回 `None` 表示本轮结束。
#[async_trait]
pub trait SynthesisSession: Send {
    /// 会话标识（用于日志）
    fn id(&self) -> &str;

    /// 发送合成请求
    async fn send(&mut self, text: &str) -> Result<(), SynthesisError>;

    /// 拉取下一帧，`Ok(None)` 表示服务端发出了结束信号
    async fn next_frame(&mut self) -> Result<Option<AudioFrame>, SynthesisError>;

    /// 关闭会话
    async fn close(&mut self);
}

/// Synthesis Service Port
#[async_trait]
pub trait SynthesisServicePort: Send + Sync {
    /// 建立新会话
    async fn open_session(&self) -> Result<Box<dyn SynthesisSession>, SynthesisError>;

    /// 检查服务是否可用
    async fn health_check(&self) -> bool {
        true // 默认实现
    }
}
