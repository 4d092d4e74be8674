//! Streaming Adapter - 单个片段的流式合成
//!
//! 为一个片段打开会话、发送朗读请求、收集音频帧并写入产物。
//! 失败时关闭会话并丢弃部分输出，重试由分发器决定。

use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::application::ports::{
    ArtifactStatus, ArtifactStorePort, AudioArtifact, SynthesisError, SynthesisServicePort,
    SynthesisSession,
};
use crate::domain::chapter::Segment;
use crate::infrastructure::adapters::{encode_pcm16_wav, PcmFormat};

/// 适配器配置
#[derive(Debug, Clone)]
pub struct StreamingAdapterConfig {
    /// 请求文本前缀
    pub instruction_prefix: String,
    /// 发送前按顺序替换的字面量（例如缩写展开）
    pub replacements: Vec<(String, String)>,
    /// 请求超过该长度时告警
    pub max_request_chars: usize,
    /// 建连与相邻两帧之间的最长等待
    pub idle_timeout: Duration,
    /// 单个片段的总时限
    pub segment_timeout: Duration,
    /// 关闭会话的宽限期
    pub close_grace: Duration,
    /// 服务未声明采样率时使用
    pub sample_rate: u32,
}

impl Default for StreamingAdapterConfig {
    fn default() -> Self {
        Self {
            instruction_prefix: "Read aloud: ".to_string(),
            replacements: Vec::new(),
            max_request_chars: 5000,
            idle_timeout: Duration::from_secs(30),
            segment_timeout: Duration::from_secs(120),
            close_grace: Duration::from_millis(2000),
            sample_rate: 24000,
        }
    }
}

/// 单次合成失败
#[derive(Debug)]
pub struct SynthesisFailure {
    pub error: SynthesisError,
    /// 失败前已收到的音频字节数（已丢弃）
    pub received_bytes: usize,
}

impl SynthesisFailure {
    fn new(error: SynthesisError, received_bytes: usize) -> Self {
        Self {
            error,
            received_bytes,
        }
    }

    pub fn status(&self) -> ArtifactStatus {
        if self.received_bytes > 0 {
            ArtifactStatus::Partial
        } else {
            ArtifactStatus::Failed
        }
    }
}

impl std::fmt::Display for SynthesisFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

/// 已接收的音频
#[derive(Default)]
struct Received {
    pcm: Vec<u8>,
    sample_rate: Option<u32>,
}

/// 流式合成适配器
pub struct StreamingAdapter {
    config: StreamingAdapterConfig,
    service: Arc<dyn SynthesisServicePort>,
    artifact_store: Arc<dyn ArtifactStorePort>,
}

impl StreamingAdapter {
    pub fn new(
        config: StreamingAdapterConfig,
        service: Arc<dyn SynthesisServicePort>,
        artifact_store: Arc<dyn ArtifactStorePort>,
    ) -> Self {
        Self {
            config,
            service,
            artifact_store,
        }
    }

    /// 构建朗读请求
    pub fn build_request(&self, text: &str) -> String {
        let text = self
            .config
            .replacements
            .iter()
            .filter(|(from, _)| !from.is_empty())
            .fold(text.to_string(), |acc, (from, to)| acc.replace(from.as_str(), to));
        format!("{}{}", self.config.instruction_prefix, text)
    }

    /// 合成单个片段并写入产物
    pub async fn synthesize(&self, segment: &Segment) -> Result<AudioArtifact, SynthesisFailure> {
        let key = segment.key();
        let request = self.build_request(segment.content());
        let request_chars = request.chars().count();
        if request_chars > self.config.max_request_chars {
            tracing::warn!(
                segment = %key,
                request_chars = request_chars,
                max_request_chars = self.config.max_request_chars,
                "Request exceeds recommended length"
            );
        }

        let mut session = match timeout(self.config.idle_timeout, self.service.open_session()).await
        {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => return Err(SynthesisFailure::new(e, 0)),
            Err(_) => {
                return Err(SynthesisFailure::new(
                    SynthesisError::SessionOpen(format!(
                        "no session within {}ms",
                        self.config.idle_timeout.as_millis()
                    )),
                    0,
                ))
            }
        };

        tracing::debug!(segment = %key, session_id = %session.id(), "Session opened");

        let mut received = Received::default();
        let streamed = timeout(
            self.config.segment_timeout,
            self.stream(&mut *session, &request, &mut received),
        )
        .await
        .unwrap_or_else(|_| Err(SynthesisError::Timeout(self.config.segment_timeout)));

        let result = match streamed {
            Ok(()) if received.pcm.is_empty() => Err(SynthesisError::StreamInterrupted(
                "turn completed without audio".to_string(),
            )),
            other => other,
        };

        if let Err(error) = result {
            self.close_session(&mut *session).await;
            drop(session);
            let failure = SynthesisFailure::new(error, received.pcm.len());
            if let Err(e) = self.artifact_store.discard_partial(&key).await {
                tracing::warn!(segment = %key, error = %e, "Failed to discard partial output");
            }
            tracing::warn!(
                segment = %key,
                status = failure.status().as_str(),
                kind = failure.error.kind(),
                error = %failure.error,
                "Segment synthesis failed"
            );
            return Err(failure);
        }

        self.close_session(&mut *session).await;
        drop(session);

        let sample_rate = received.sample_rate.unwrap_or(self.config.sample_rate);
        let wav = encode_pcm16_wav(&received.pcm, PcmFormat::mono16(sample_rate));

        match self.artifact_store.save(&key, &wav).await {
            Ok(artifact) => {
                tracing::debug!(
                    segment = %key,
                    pcm_bytes = received.pcm.len(),
                    sample_rate = sample_rate,
                    "Segment synthesized"
                );
                Ok(artifact)
            }
            Err(e) => {
                if let Err(discard) = self.artifact_store.discard_partial(&key).await {
                    tracing::warn!(segment = %key, error = %discard, "Failed to discard partial output");
                }
                Err(SynthesisFailure::new(
                    SynthesisError::Storage(e.to_string()),
                    received.pcm.len(),
                ))
            }
        }
    }

    async fn stream(
        &self,
        session: &mut dyn SynthesisSession,
        request: &str,
        received: &mut Received,
    ) -> Result<(), SynthesisError> {
        session.send(request).await?;

        loop {
            let frame = timeout(self.config.idle_timeout, session.next_frame())
                .await
                .map_err(|_| SynthesisError::Timeout(self.config.idle_timeout))??;

            match frame {
                Some(frame) => {
                    if received.sample_rate.is_none() {
                        received.sample_rate = frame.sample_rate;
                    }
                    received.pcm.extend_from_slice(&frame.data);
                }
                None => return Ok(()),
            }
        }
    }

    async fn close_session(&self, session: &mut dyn SynthesisSession) {
        let id = session.id().to_string();
        if timeout(self.config.close_grace, session.close()).await.is_err() {
            tracing::warn!(session_id = %id, "Session close exceeded grace period");
        }
    }
}
