//! 应用层错误定义
//!
//! 统一的命令/查询错误类型

use thiserror::Error;

use crate::application::ports::{ArtifactStoreError, SegmentStoreError};
use crate::domain::chapter::ChapterError;

/// 应用层错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 资源未找到
    #[error("{resource_type} not found: {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// 验证错误
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// 章节错误（只影响该章节）
    #[error("Chapter error: {0}")]
    ChapterError(#[from] ChapterError),

    /// 片段存储错误
    #[error("Segment store error: {0}")]
    SegmentStoreError(String),

    /// 音频存储错误
    #[error("Artifact store error: {0}")]
    ArtifactStoreError(String),
}

impl ApplicationError {
    /// 创建 NotFound 错误
    pub fn not_found(resource_type: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource_type,
            id: id.to_string(),
        }
    }

    /// 创建验证错误
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }
}

impl From<SegmentStoreError> for ApplicationError {
    fn from(err: SegmentStoreError) -> Self {
        match err {
            SegmentStoreError::ChapterNotFound(id) => Self::not_found("Chapter", id),
            other => Self::SegmentStoreError(other.to_string()),
        }
    }
}

impl From<ArtifactStoreError> for ApplicationError {
    fn from(err: ArtifactStoreError) -> Self {
        Self::ArtifactStoreError(err.to_string())
    }
}

/// 单个章节的失败记录
///
/// 章节级错误只影响该章节，处理器收集后继续处理其它章节
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterFailure {
    pub chapter: String,
    pub error: String,
}

impl ChapterFailure {
    pub fn new(chapter: impl ToString, error: impl ToString) -> Self {
        Self {
            chapter: chapter.to_string(),
            error: error.to_string(),
        }
    }
}
