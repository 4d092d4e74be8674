//! Chapter Source Port - 章节源文本读取
//!
//! 每次运行从源文件重新构建章节，不做持久化

use async_trait::async_trait;

use crate::domain::chapter::{Chapter, ChapterError, ChapterId};

/// Chapter Source Port
#[async_trait]
pub trait ChapterSourcePort: Send + Sync {
    /// 列出所有可用章节（按文件名排序）
    async fn list_chapters(&self) -> Result<Vec<ChapterId>, ChapterError>;

    /// 读取并解析单个章节
    async fn load(&self, chapter: &ChapterId) -> Result<Chapter, ChapterError>;
}
