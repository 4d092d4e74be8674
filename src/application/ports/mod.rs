//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod artifact_store;
mod chapter_source;
mod segment_dispatch;
mod segment_store;
mod synthesis;

pub use artifact_store::{ArtifactStatus, ArtifactStoreError, ArtifactStorePort, AudioArtifact};
pub use chapter_source::ChapterSourcePort;
pub use segment_dispatch::{
    ChapterSummary, DispatchReport, SegmentDispatchPort, SegmentOutcome, SegmentState,
};
pub use segment_store::{ManifestEntry, SegmentManifest, SegmentStoreError, SegmentStorePort};
pub use synthesis::{AudioFrame, SynthesisError, SynthesisServicePort, SynthesisSession};
