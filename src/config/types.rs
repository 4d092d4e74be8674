//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::ChunkerConfig;
use crate::infrastructure::adapters::{FakeSynthesisConfig, LiveClientConfig};
use crate::infrastructure::worker::{SessionPoolConfig, StreamingAdapterConfig};

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 目录配置
    #[serde(default)]
    pub paths: PathsConfig,

    /// 分段配置
    #[serde(default)]
    pub chunker: ChunkerSection,

    /// 分发配置
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// 合成服务配置
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// 校验配置
    #[serde(default)]
    pub assembly: AssemblyConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

impl AppConfig {
    pub fn adapter_config(&self) -> StreamingAdapterConfig {
        StreamingAdapterConfig {
            instruction_prefix: self.synthesis.instruction_prefix.clone(),
            replacements: self
                .synthesis
                .replacements
                .iter()
                .map(|r| (r.from.clone(), r.to.clone()))
                .collect(),
            max_request_chars: self.synthesis.max_request_chars,
            idle_timeout: Duration::from_secs(self.dispatch.idle_timeout_secs),
            segment_timeout: Duration::from_secs(self.dispatch.segment_timeout_secs),
            close_grace: Duration::from_millis(self.dispatch.close_grace_ms),
            sample_rate: self.synthesis.sample_rate,
        }
    }
}

/// 目录配置
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// 章节源文件目录（`<chapter>.txt`）
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,

    /// 片段文本目录
    #[serde(default = "default_segments_dir")]
    pub segments_dir: PathBuf,

    /// 音频输出目录
    #[serde(default = "default_audio_dir")]
    pub audio_dir: PathBuf,
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("txt")
}

fn default_segments_dir() -> PathBuf {
    PathBuf::from("chapters")
}

fn default_audio_dir() -> PathBuf {
    PathBuf::from("wav")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            segments_dir: default_segments_dir(),
            audio_dir: default_audio_dir(),
        }
    }
}

/// 分段配置
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkerSection {
    /// 达到该长度后在句末截断
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,

    /// 片段最大长度
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

fn default_min_chars() -> usize {
    50
}

fn default_max_chars() -> usize {
    100
}

impl Default for ChunkerSection {
    fn default() -> Self {
        Self {
            min_chars: default_min_chars(),
            max_chars: default_max_chars(),
        }
    }
}

impl ChunkerSection {
    pub fn chunker_config(&self) -> ChunkerConfig {
        ChunkerConfig::new(self.min_chars, self.max_chars)
    }
}

/// 分发配置
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// 同时在途的会话数
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// 失败片段的重试次数
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// 单个片段的总时限（秒）
    #[serde(default = "default_segment_timeout")]
    pub segment_timeout_secs: u64,

    /// 两帧之间的最长等待（秒）
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// 出错后关闭会话的宽限期（毫秒）
    #[serde(default = "default_close_grace")]
    pub close_grace_ms: u64,
}

fn default_pool_size() -> usize {
    40
}

fn default_max_retries() -> u32 {
    1
}

fn default_segment_timeout() -> u64 {
    120
}

fn default_idle_timeout() -> u64 {
    30
}

fn default_close_grace() -> u64 {
    2000
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            max_retries: default_max_retries(),
            segment_timeout_secs: default_segment_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            close_grace_ms: default_close_grace(),
        }
    }
}

impl DispatchConfig {
    pub fn pool_config(&self) -> SessionPoolConfig {
        SessionPoolConfig {
            pool_size: self.pool_size,
            max_retries: self.max_retries,
        }
    }
}

/// 合成服务实现
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisProvider {
    /// 实时流式服务
    #[default]
    Live,
    /// 本地静音输出（试运行）
    Fake,
}

/// 合成服务配置
#[derive(Debug, Clone, Deserialize)]
pub struct SynthesisConfig {
    #[serde(default)]
    pub provider: SynthesisProvider,

    /// WebSocket 端点
    #[serde(default = "default_synthesis_url")]
    pub url: String,

    /// API Key，未设置时读取 `GEMINI_API_KEY`
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_voice_name")]
    pub voice_name: String,

    #[serde(default = "default_language_code")]
    pub language_code: String,

    /// 请求前缀
    #[serde(default = "default_instruction_prefix")]
    pub instruction_prefix: String,

    /// 服务未声明采样率时使用
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// 请求长度告警阈值
    #[serde(default = "default_max_request_chars")]
    pub max_request_chars: usize,

    /// 建立会话超时（秒）
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// 发送前替换的字面量，按配置顺序应用
    ///
    /// 使用数组而不是表：配置库会把表的键转成小写，也不保留顺序
    #[serde(default)]
    pub replacements: Vec<Replacement>,
}

/// 单条字面量替换（区分大小写）
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Replacement {
    pub from: String,
    pub to: String,
}

impl Replacement {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

fn default_synthesis_url() -> String {
    LiveClientConfig::default().url
}

fn default_model() -> String {
    LiveClientConfig::default().model
}

fn default_voice_name() -> String {
    "Charon".to_string()
}

fn default_language_code() -> String {
    "de-DE".to_string()
}

fn default_instruction_prefix() -> String {
    "Read aloud: ".to_string()
}

fn default_sample_rate() -> u32 {
    24000
}

fn default_max_request_chars() -> usize {
    5000
}

fn default_connect_timeout() -> u64 {
    30
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            provider: SynthesisProvider::default(),
            url: default_synthesis_url(),
            api_key: None,
            model: default_model(),
            voice_name: default_voice_name(),
            language_code: default_language_code(),
            instruction_prefix: default_instruction_prefix(),
            sample_rate: default_sample_rate(),
            max_request_chars: default_max_request_chars(),
            connect_timeout_secs: default_connect_timeout(),
            replacements: Vec::new(),
        }
    }
}

impl SynthesisConfig {
    pub fn live_client_config(&self) -> LiveClientConfig {
        LiveClientConfig {
            url: self.url.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            voice_name: self.voice_name.clone(),
            language_code: self.language_code.clone(),
            connect_timeout_secs: self.connect_timeout_secs,
        }
    }

    pub fn fake_config(&self) -> FakeSynthesisConfig {
        FakeSynthesisConfig {
            sample_rate: self.sample_rate,
            ..Default::default()
        }
    }
}

/// 校验配置
#[derive(Debug, Clone, Deserialize)]
pub struct AssemblyConfig {
    /// 章节齐全时写入 `order.txt`
    #[serde(default = "default_write_order_list")]
    pub write_order_list: bool,
}

fn default_write_order_list() -> bool {
    true
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            write_order_list: default_write_order_list(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
