//! Live Synthesis Client - 通过 WebSocket 调用实时语音合成服务
//!
//! 实现 SynthesisServicePort trait
//!
//! 协议（双向流式）:
//! 1. 客户端发送 `setup`（模型、AUDIO 响应模态、音色与语言）
//! 2. 服务端回复 `setupComplete`
//! 3. 客户端发送 `clientContent`（一轮完整文本）
//! 4. 服务端推送 `serverContent.modelTurn.parts[].inlineData`（base64 PCM）
//! 5. 服务端以 `serverContent.turnComplete` 结束本轮

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::application::ports::{AudioFrame, SynthesisError, SynthesisServicePort, SynthesisSession};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// 实时合成客户端配置
#[derive(Debug, Clone)]
pub struct LiveClientConfig {
    /// WebSocket 端点
    pub url: String,
    /// API Key（作为 `key` 查询参数）
    pub api_key: Option<String>,
    /// 模型名称
    pub model: String,
    /// 预置音色
    pub voice_name: String,
    /// 语言代码
    pub language_code: String,
    /// 建立会话超时（秒）
    pub connect_timeout_secs: u64,
}

impl Default for LiveClientConfig {
    fn default() -> Self {
        Self {
            url: "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent".to_string(),
            api_key: None,
            model: "models/gemini-2.5-flash-live-preview".to_string(),
            voice_name: "Charon".to_string(),
            language_code: "de-DE".to_string(),
            connect_timeout_secs: 30,
        }
    }
}

impl LiveClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// 带鉴权参数的连接地址
    fn endpoint(&self) -> String {
        match &self.api_key {
            Some(key) => {
                let sep = if self.url.contains('?') { '&' } else { '?' };
                format!("{}{}key={}", self.url, sep, key)
            }
            None => self.url.clone(),
        }
    }
}

// ============================================================================
// 协议消息
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SetupMessage<'a> {
    setup: Setup<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Setup<'a> {
    model: &'a str,
    generation_config: GenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_modalities: [&'static str; 1],
    speech_config: SpeechConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig<'a> {
    language_code: &'a str,
    voice_config: VoiceConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig<'a> {
    prebuilt_voice_config: PrebuiltVoiceConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig<'a> {
    voice_name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientContentMessage<'a> {
    client_content: ClientContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientContent<'a> {
    turns: [Turn<'a>; 1],
    turn_complete: bool,
}

#[derive(Debug, Serialize)]
struct Turn<'a> {
    role: &'static str,
    parts: [TextPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerMessage {
    setup_complete: Option<serde_json::Value>,
    server_content: Option<ServerContent>,
    go_away: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerContent {
    model_turn: Option<ModelTurn>,
    #[serde(default)]
    turn_complete: bool,
    #[serde(default)]
    interrupted: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ModelTurn {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: String,
    data: String,
}

/// 解析后的服务端事件
#[derive(Debug, Default, PartialEq, Eq)]
struct ServerEvent {
    setup_complete: bool,
    frames: Vec<AudioFrame>,
    turn_complete: bool,
    go_away: bool,
    interrupted: bool,
}

/// 从 `audio/pcm;rate=24000` 中提取采样率
fn sample_rate_from_mime(mime: &str) -> Option<u32> {
    mime.split(';')
        .filter_map(|param| param.trim().strip_prefix("rate="))
        .find_map(|rate| rate.parse().ok())
}

/// 解析一条服务端消息（文本帧与二进制帧均为 JSON）
fn decode_server_message(payload: &[u8]) -> Result<ServerEvent, SynthesisError> {
    let message: ServerMessage = serde_json::from_slice(payload)
        .map_err(|e| SynthesisError::MalformedFrame(format!("invalid JSON: {}", e)))?;

    let mut event = ServerEvent {
        setup_complete: message.setup_complete.is_some(),
        go_away: message.go_away.is_some(),
        ..Default::default()
    };

    if let Some(content) = message.server_content {
        event.turn_complete = content.turn_complete;
        event.interrupted = content.interrupted;

        let parts = content.model_turn.map(|t| t.parts).unwrap_or_default();
        for inline in parts.into_iter().filter_map(|p| p.inline_data) {
            if !inline.mime_type.is_empty() && !inline.mime_type.starts_with("audio/") {
                continue;
            }
            let data = BASE64
                .decode(inline.data.as_bytes())
                .map_err(|e| SynthesisError::MalformedFrame(format!("invalid base64 audio: {}", e)))?;
            event.frames.push(AudioFrame {
                data,
                sample_rate: sample_rate_from_mime(&inline.mime_type),
            });
        }
    }

    Ok(event)
}

/// 从 WebSocket 消息中取出 JSON 负载；控制帧返回 None
fn message_payload(message: &Message) -> Result<Option<&[u8]>, SynthesisError> {
    match message {
        Message::Text(text) => Ok(Some(text.as_str().as_bytes())),
        Message::Binary(data) => Ok(Some(&data[..])),
        Message::Close(frame) => Err(SynthesisError::StreamInterrupted(format!(
            "server closed connection: {}",
            frame
                .as_ref()
                .map(|f| format!("{} {}", u16::from(f.code), f.reason.as_str()))
                .unwrap_or_else(|| "no close frame".to_string())
        ))),
        _ => Ok(None),
    }
}

// ============================================================================
// 客户端与会话
// ============================================================================

/// 实时合成客户端
pub struct LiveSynthesisClient {
    config: LiveClientConfig,
}

impl LiveSynthesisClient {
    pub fn new(config: LiveClientConfig) -> Result<Self, SynthesisError> {
        if config.url.is_empty() {
            return Err(SynthesisError::SessionOpen("empty service URL".to_string()));
        }
        if config.api_key.is_none() {
            tracing::warn!("No API key configured for live synthesis client");
        }
        Ok(Self { config })
    }

    fn setup_message(&self) -> Result<String, SynthesisError> {
        let setup = SetupMessage {
            setup: Setup {
                model: &self.config.model,
                generation_config: GenerationConfig {
                    response_modalities: ["AUDIO"],
                    speech_config: SpeechConfig {
                        language_code: &self.config.language_code,
                        voice_config: VoiceConfig {
                            prebuilt_voice_config: PrebuiltVoiceConfig {
                                voice_name: &self.config.voice_name,
                            },
                        },
                    },
                },
            },
        };
        serde_json::to_string(&setup).map_err(|e| SynthesisError::SessionOpen(e.to_string()))
    }

    async fn connect(&self) -> Result<WsStream, SynthesisError> {
        let (mut ws, _) = connect_async(self.config.endpoint())
            .await
            .map_err(|e| SynthesisError::SessionOpen(format!("Cannot connect to synthesis service: {}", e)))?;

        ws.send(Message::text(self.setup_message()?))
            .await
            .map_err(|e| SynthesisError::SessionOpen(e.to_string()))?;

        // 等待 setupComplete
        while let Some(message) = ws.next().await {
            let message = message.map_err(|e| SynthesisError::SessionOpen(e.to_string()))?;
            let payload = match message_payload(&message) {
                Ok(Some(payload)) => payload,
                Ok(None) => continue,
                Err(e) => return Err(SynthesisError::SessionOpen(e.to_string())),
            };
            let event = decode_server_message(payload)
                .map_err(|e| SynthesisError::SessionOpen(e.to_string()))?;
            if event.setup_complete {
                return Ok(ws);
            }
        }

        Err(SynthesisError::SessionOpen(
            "connection closed before setup completed".to_string(),
        ))
    }
}

#[async_trait]
impl SynthesisServicePort for LiveSynthesisClient {
    async fn open_session(&self) -> Result<Box<dyn SynthesisSession>, SynthesisError> {
        let timeout = Duration::from_secs(self.config.connect_timeout_secs);
        let ws = tokio::time::timeout(timeout, self.connect())
            .await
            .map_err(|_| SynthesisError::SessionOpen(format!(
                "setup not completed within {}s",
                self.config.connect_timeout_secs
            )))??;

        let id = format!("live-{}", uuid::Uuid::new_v4());
        tracing::debug!(session_id = %id, model = %self.config.model, "Synthesis session opened");

        Ok(Box::new(LiveSession {
            id,
            ws,
            queued: VecDeque::new(),
            turn_complete: false,
        }))
    }
}

/// 一个 WebSocket 合成会话
struct LiveSession {
    id: String,
    ws: WsStream,
    /// 同一条消息中携带的多个音频帧
    queued: VecDeque<AudioFrame>,
    turn_complete: bool,
}

#[async_trait]
impl SynthesisSession for LiveSession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send(&mut self, text: &str) -> Result<(), SynthesisError> {
        let message = ClientContentMessage {
            client_content: ClientContent {
                turns: [Turn {
                    role: "user",
                    parts: [TextPart { text }],
                }],
                turn_complete: true,
            },
        };
        let json = serde_json::to_string(&message)
            .map_err(|e| SynthesisError::StreamInterrupted(e.to_string()))?;

        tracing::debug!(session_id = %self.id, text_len = text.len(), "Sending synthesis request");

        self.ws
            .send(Message::text(json))
            .await
            .map_err(|e| SynthesisError::StreamInterrupted(e.to_string()))
    }

    async fn next_frame(&mut self) -> Result<Option<AudioFrame>, SynthesisError> {
        loop {
            if let Some(frame) = self.queued.pop_front() {
                return Ok(Some(frame));
            }
            if self.turn_complete {
                return Ok(None);
            }

            let message = match self.ws.next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => return Err(SynthesisError::StreamInterrupted(e.to_string())),
                None => {
                    return Err(SynthesisError::StreamInterrupted(
                        "connection closed before turn complete".to_string(),
                    ))
                }
            };

            let Some(payload) = message_payload(&message)? else {
                continue;
            };
            let event = decode_server_message(payload)?;

            if event.go_away {
                return Err(SynthesisError::StreamInterrupted("server sent goAway".to_string()));
            }
            if event.interrupted {
                return Err(SynthesisError::StreamInterrupted("generation interrupted".to_string()));
            }

            self.queued.extend(event.frames);
            self.turn_complete = event.turn_complete;
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.ws.close(None).await {
            tracing::debug!(session_id = %self.id, error = %e, "Error while closing session");
        }
    }
}
