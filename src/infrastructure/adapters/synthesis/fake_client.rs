//! Fake Synthesis Service - 不调用外部服务的合成实现
//!
//! 返回固定长度的静音帧；可按请求文本注入失败、记录并发会话数，
//! 用于试运行和分发器测试

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::application::ports::{AudioFrame, SynthesisError, SynthesisServicePort, SynthesisSession};

/// Fake 合成服务配置
#[derive(Debug, Clone)]
pub struct FakeSynthesisConfig {
    /// 每个片段返回的帧数
    pub frames_per_segment: usize,
    /// 每帧字节数
    pub frame_bytes: usize,
    /// 每帧之间的模拟延迟（毫秒）
    pub frame_delay_ms: u64,
    /// 声明的采样率
    pub sample_rate: u32,
}

impl Default for FakeSynthesisConfig {
    fn default() -> Self {
        Self {
            frames_per_segment: 4,
            frame_bytes: 960,
            frame_delay_ms: 20,
            sample_rate: 24000,
        }
    }
}

/// 注入的失败方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeFailure {
    /// 发送一帧后断开
    Interrupt,
    /// 发送一帧后不再有任何进展
    Stall,
    /// 不发送任何音频就结束本轮
    Empty,
}

#[derive(Default)]
struct FakeState {
    /// 请求文本片段 -> (失败方式, 剩余失败次数)
    plan: DashMap<String, (FakeFailure, usize)>,
    /// 剩余的建连失败次数
    refused_opens: AtomicUsize,
    opened: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    /// 收到的请求文本（按到达顺序）
    requests: std::sync::Mutex<Vec<String>>,
}

impl FakeState {
    /// 命中计划则消耗一次失败
    fn take_failure(&self, text: &str) -> Option<FakeFailure> {
        for mut entry in self.plan.iter_mut() {
            if !text.contains(entry.key().as_str()) {
                continue;
            }
            let (failure, remaining) = entry.value_mut();
            if *remaining > 0 {
                *remaining -= 1;
                return Some(*failure);
            }
        }
        None
    }
}

/// Fake 合成服务
#[derive(Clone)]
pub struct FakeSynthesisService {
    config: FakeSynthesisConfig,
    state: Arc<FakeState>,
}

impl FakeSynthesisService {
    pub fn new(config: FakeSynthesisConfig) -> Self {
        tracing::info!(
            frames_per_segment = config.frames_per_segment,
            frame_delay_ms = config.frame_delay_ms,
            "FakeSynthesisService initialized"
        );
        Self {
            config,
            state: Arc::new(FakeState::default()),
        }
    }

    /// 使用默认配置创建
    pub fn with_defaults() -> Self {
        Self::new(FakeSynthesisConfig::default())
    }

    /// 请求文本包含 `needle` 的会话前 `times` 次以 `failure` 方式失败
    pub fn fail_when(&self, needle: impl Into<String>, failure: FakeFailure, times: usize) {
        self.state.plan.insert(needle.into(), (failure, times));
    }

    /// 接下来 `times` 次建连被拒绝
    pub fn refuse_opens(&self, times: usize) {
        self.state.refused_opens.store(times, Ordering::SeqCst);
    }

    pub fn opened_sessions(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.state.in_flight.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.state.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<String> {
        self.state
            .requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SynthesisServicePort for FakeSynthesisService {
    async fn open_session(&self) -> Result<Box<dyn SynthesisSession>, SynthesisError> {
        let refused = self
            .state
            .refused_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(SynthesisError::SessionOpen("fake: connection refused".to_string()));
        }

        let number = self.state.opened.fetch_add(1, Ordering::SeqCst) + 1;
        let current = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        Ok(Box::new(FakeSession {
            id: format!("fake-{}", number),
            config: self.config.clone(),
            state: self.state.clone(),
            failure: None,
            sent: false,
            emitted: 0,
        }))
    }
}

struct FakeSession {
    id: String,
    config: FakeSynthesisConfig,
    state: Arc<FakeState>,
    failure: Option<FakeFailure>,
    sent: bool,
    emitted: usize,
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SynthesisSession for FakeSession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send(&mut self, text: &str) -> Result<(), SynthesisError> {
        if let Ok(mut requests) = self.state.requests.lock() {
            requests.push(text.to_string());
        }
        self.failure = self.state.take_failure(text);
        self.sent = true;
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Option<AudioFrame>, SynthesisError> {
        if !self.sent {
            return Err(SynthesisError::StreamInterrupted("fake: no request sent".to_string()));
        }

        tokio::time::sleep(Duration::from_millis(self.config.frame_delay_ms)).await;

        match self.failure {
            Some(FakeFailure::Empty) => return Ok(None),
            Some(FakeFailure::Interrupt) if self.emitted >= 1 => {
                return Err(SynthesisError::StreamInterrupted("fake: connection reset".to_string()));
            }
            Some(FakeFailure::Stall) if self.emitted >= 1 => {
                std::future::pending::<()>().await;
            }
            _ => {}
        }

        if self.emitted >= self.config.frames_per_segment {
            return Ok(None);
        }

        self.emitted += 1;
        Ok(Some(AudioFrame {
            data: vec![0u8; self.config.frame_bytes],
            sample_rate: Some(self.config.sample_rate),
        }))
    }

    async fn close(&mut self) {
        tracing::trace!(session_id = %self.id, "Fake session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_session_streams_configured_frames() {
        let service = FakeSynthesisService::new(FakeSynthesisConfig {
            frames_per_segment: 3,
            frame_bytes: 10,
            frame_delay_ms: 0,
            sample_rate: 24000,
        });

        let mut session = service.open_session().await.unwrap();
        session.send("Read aloud: Amen.").await.unwrap();

        let mut total = 0;
        while let Some(frame) = session.next_frame().await.unwrap() {
            total += frame.data.len();
        }
        assert_eq!(total, 30);
        assert_eq!(service.in_flight(), 1);

        drop(session);
        assert_eq!(service.in_flight(), 0);
        assert_eq!(service.requests(), vec!["Read aloud: Amen.".to_string()]);
    }

    #[tokio::test]
    async fn test_failure_plan_is_consumed() {
        let service = FakeSynthesisService::new(FakeSynthesisConfig {
            frame_delay_ms: 0,
            ..Default::default()
        });
        service.fail_when("Amen", FakeFailure::Interrupt, 1);

        let mut session = service.open_session().await.unwrap();
        session.send("Amen").await.unwrap();
        assert!(session.next_frame().await.unwrap().is_some());
        assert!(matches!(
            session.next_frame().await,
            Err(SynthesisError::StreamInterrupted(_))
        ));

        let mut session = service.open_session().await.unwrap();
        session.send("Amen").await.unwrap();
        while session.next_frame().await.unwrap().is_some() {}
    }

    #[tokio::test]
    async fn test_refused_opens() {
        let service = FakeSynthesisService::with_defaults();
        service.refuse_opens(1);
        assert!(matches!(
            service.open_session().await,
            Err(SynthesisError::SessionOpen(_))
        ));
        assert!(service.open_session().await.is_ok());
        assert_eq!(service.opened_sessions(), 1);
    }
}
