//! Artifact Store Port - 音频产物存储
//!
//! 每个片段对应一个音频文件，只有完整写入的产物才可见

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::domain::chapter::{ChapterId, SegmentKey};

/// 音频存储错误
#[derive(Debug, Error)]
pub enum ArtifactStoreError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// 产物完成状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    /// 已完整写入
    Complete,
    /// 流式接收中断，部分输出已丢弃
    Partial,
    /// 合成失败
    Failed,
}

impl ArtifactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactStatus::Complete => "complete",
            ArtifactStatus::Partial => "partial",
            ArtifactStatus::Failed => "failed",
        }
    }
}

/// 单个片段的音频产物
#[derive(Debug, Clone)]
pub struct AudioArtifact {
    pub key: SegmentKey,
    pub path: PathBuf,
    pub bytes: u64,
    pub status: ArtifactStatus,
}

/// Artifact Store Port
#[async_trait]
pub trait ArtifactStorePort: Send + Sync {
    /// 章节的音频目录
    fn chapter_dir(&self, chapter: &ChapterId) -> PathBuf;

    /// 片段音频路径
    fn artifact_path(&self, key: &SegmentKey) -> PathBuf;

    /// 原子写入完整音频（先写临时文件再重命名）
    async fn save(&self, key: &SegmentKey, data: &[u8]) -> Result<AudioArtifact, ArtifactStoreError>;

    /// 是否存在完整音频
    async fn exists(&self, key: &SegmentKey) -> bool;

    /// 章节已完成的片段索引（升序）
    async fn list_indices(&self, chapter: &ChapterId) -> Result<Vec<usize>, ArtifactStoreError>;

    /// 删除单个音频，返回是否实际删除
    async fn delete(&self, key: &SegmentKey) -> Result<bool, ArtifactStoreError>;

    /// 删除临时文件等残留输出
    async fn discard_partial(&self, key: &SegmentKey) -> Result<(), ArtifactStoreError>;

    /// 写入顺序清单（供后续拼接使用）
    async fn write_order_list(
        &self,
        chapter: &ChapterId,
        count: usize,
    ) -> Result<PathBuf, ArtifactStoreError>;
}
