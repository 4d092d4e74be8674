//! Split Commands - 章节分段命令

use crate::application::error::ChapterFailure;
use crate::domain::chapter::ChapterId;

/// 对源章节分段并写入片段存储
#[derive(Debug, Clone, Default)]
pub struct SplitChapters {
    /// 仅处理这些章节；为空时处理全部源章节
    pub chapters: Vec<ChapterId>,
}

/// 单个章节的分段结果
#[derive(Debug, Clone)]
pub struct ChapterSplit {
    pub chapter: ChapterId,
    pub verses: usize,
    pub segments: usize,
    /// 因片段内容变化而删除的旧音频索引
    pub stale: Vec<usize>,
}

/// 分段响应
#[derive(Debug, Clone, Default)]
pub struct SplitChaptersResponse {
    pub split: Vec<ChapterSplit>,
    pub failed: Vec<ChapterFailure>,
}

impl SplitChaptersResponse {
    pub fn total_segments(&self) -> usize {
        self.split.iter().map(|c| c.segments).sum()
    }
}
