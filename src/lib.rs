//! versevox - 章节语音合成
//!
//! 架构设计: DDD + CQRS + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Chapter Context: 章节、经文、片段与分段规则
//!
//! 应用层 (application/):
//! - Ports: 端口定义（ChapterSource, SegmentStore, ArtifactStore, Synthesis, SegmentDispatch）
//! - Commands: CQRS 命令处理器（分段、合成、重置）
//! - Queries: CQRS 查询处理器（完整性校验）
//!
//! 基础设施层 (infrastructure/):
//! - Adapters: 章节源文件、文件存储、实时合成客户端、WAV 封装
//! - Memory: 运行期片段状态跟踪
//! - Worker: 流式合成适配器与会话池分发器

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
