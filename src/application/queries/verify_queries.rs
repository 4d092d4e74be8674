//! Verify Queries - 音频完整性查询

use serde::Serialize;

use crate::application::error::ChapterFailure;
use crate::domain::chapter::ChapterId;

/// 校验章节音频是否齐全
#[derive(Debug, Clone, Default)]
pub struct VerifyChapters {
    /// 仅校验这些章节；为空时校验全部已分段章节
    pub chapters: Vec<ChapterId>,
}

/// 单个章节的校验结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssemblyReport {
    pub chapter: ChapterId,
    /// 清单中的期望片段数
    pub expected: usize,
    /// 已有完整音频的片段数（0..expected 范围内）
    pub present: usize,
    /// 缺失的片段索引
    pub missing: Vec<usize>,
    /// 超出当前分段范围的残留音频索引
    pub orphaned: Vec<usize>,
}

impl AssemblyReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// 校验响应
#[derive(Debug, Clone, Default)]
pub struct VerifyChaptersResponse {
    pub reports: Vec<AssemblyReport>,
    /// 无法校验的章节（未分段、清单损坏、音频目录不可读）
    pub failed: Vec<ChapterFailure>,
}

impl VerifyChaptersResponse {
    /// 所有章节均可校验且齐全
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.reports.iter().all(AssemblyReport::is_complete)
    }
}
