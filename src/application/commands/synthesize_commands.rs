//! Synthesize Commands - 片段合成命令

use crate::application::error::ChapterFailure;
use crate::application::ports::DispatchReport;
use crate::domain::chapter::ChapterId;

/// 为所有缺少音频的片段合成音频
#[derive(Debug, Clone, Default)]
pub struct SynthesizeSegments {
    /// 仅处理这些章节；为空时处理全部已分段章节
    pub chapters: Vec<ChapterId>,
}

/// 合成响应
#[derive(Debug, Clone, Default)]
pub struct SynthesizeSegmentsResponse {
    pub report: DispatchReport,
    /// 无法收集待合成片段的章节（清单缺失或损坏）
    pub failed: Vec<ChapterFailure>,
}

impl SynthesizeSegmentsResponse {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty() || self.report.has_failures()
    }
}
