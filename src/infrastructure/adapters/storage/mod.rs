//! Storage Adapter - 片段与音频的文件系统存储

mod file_artifact_store;
mod file_segment_store;

pub use file_artifact_store::FileArtifactStore;
pub use file_segment_store::FileSegmentStore;
