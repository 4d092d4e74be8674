//! Chapter Context - Errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChapterError {
    #[error("无效的章节标识: {0}")]
    InvalidIdentifier(String),

    #[error("章节文本编码无效: {chapter}: {reason}")]
    InvalidEncoding { chapter: String, reason: String },

    #[error("文件读取错误: {0}")]
    FileRead(String),
}
