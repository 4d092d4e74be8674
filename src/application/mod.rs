//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（章节源、片段存储、音频存储、合成服务、分发器）
//! - commands: CQRS 命令及处理器（分段、合成、重置）
//! - queries: CQRS 查询及处理器（完整性校验）
//! - error: 应用层错误定义

pub mod commands;
pub mod error;
pub mod ports;
pub mod queries;

// Re-exports
pub use commands::{
    handlers::{ResetArtifactsHandler, SplitChaptersHandler, SynthesizeSegmentsHandler},
    ChapterSplit, ResetArtifacts, ResetArtifactsResponse, SplitChapters, SplitChaptersResponse,
    SynthesizeSegments, SynthesizeSegmentsResponse,
};

pub use error::{ApplicationError, ChapterFailure};

pub use ports::{
    ArtifactStatus, ArtifactStoreError, ArtifactStorePort, AudioArtifact, AudioFrame,
    ChapterSourcePort, ChapterSummary, DispatchReport, ManifestEntry, SegmentDispatchPort,
    SegmentManifest, SegmentOutcome, SegmentState, SegmentStoreError, SegmentStorePort,
    SynthesisError, SynthesisServicePort, SynthesisSession,
};

pub use queries::{handlers::VerifyChaptersHandler, AssemblyReport, VerifyChapters, VerifyChaptersResponse};
