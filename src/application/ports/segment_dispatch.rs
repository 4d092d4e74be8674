//! Segment Dispatch Port - 片段并发分发
//!
//! 定义分发契约与运行报告，具体实现在 infrastructure/worker 层

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::domain::chapter::{ChapterId, Segment, SegmentKey};

/// 片段在本次运行中的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentState {
    /// 等待分配
    Pending,
    /// 已分配到会话
    InFlight,
    /// 失败后等待重试
    Retrying,
    /// 首次尝试即完成
    Complete,
    /// 重试后完成
    Recovered,
    /// 重试耗尽
    PermanentlyFailed,
    /// 运行被取消，未处理
    Cancelled,
}

impl SegmentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentState::Pending => "pending",
            SegmentState::InFlight => "in_flight",
            SegmentState::Retrying => "retrying",
            SegmentState::Complete => "complete",
            SegmentState::Recovered => "recovered",
            SegmentState::PermanentlyFailed => "permanently_failed",
            SegmentState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SegmentState::Complete
                | SegmentState::Recovered
                | SegmentState::PermanentlyFailed
                | SegmentState::Cancelled
        )
    }

    /// 是否已有完整音频
    pub fn is_success(&self) -> bool {
        matches!(self, SegmentState::Complete | SegmentState::Recovered)
    }
}

/// 单个片段的最终结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentOutcome {
    pub key: SegmentKey,
    pub state: SegmentState,
    pub attempts: u32,
    pub last_error: Option<String>,
}

/// 章节汇总
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterSummary {
    pub completed: usize,
    pub recovered: usize,
    pub permanently_failed: Vec<usize>,
    pub cancelled: usize,
}

/// 一次分发运行的报告
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchReport {
    pub outcomes: Vec<SegmentOutcome>,
    /// 运行期间同时在途的最大会话数
    pub peak_in_flight: usize,
}

impl DispatchReport {
    pub fn outcome(&self, key: &SegmentKey) -> Option<&SegmentOutcome> {
        self.outcomes.iter().find(|o| &o.key == key)
    }

    pub fn count(&self, state: SegmentState) -> usize {
        self.outcomes.iter().filter(|o| o.state == state).count()
    }

    pub fn permanently_failed(&self) -> Vec<&SegmentKey> {
        self.outcomes
            .iter()
            .filter(|o| o.state == SegmentState::PermanentlyFailed)
            .map(|o| &o.key)
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| o.state == SegmentState::PermanentlyFailed)
    }

    /// 按章节汇总（章节按首次出现顺序）
    pub fn by_chapter(&self) -> Vec<(ChapterId, ChapterSummary)> {
        let mut summaries: Vec<(ChapterId, ChapterSummary)> = Vec::new();
        for outcome in &self.outcomes {
            let position = summaries
                .iter()
                .position(|(c, _)| c == &outcome.key.chapter)
                .unwrap_or_else(|| {
                    summaries.push((outcome.key.chapter.clone(), ChapterSummary::default()));
                    summaries.len() - 1
                });
            let summary = &mut summaries[position].1;
            match outcome.state {
                SegmentState::Complete => summary.completed += 1,
                SegmentState::Recovered => summary.recovered += 1,
                SegmentState::PermanentlyFailed => {
                    summary.permanently_failed.push(outcome.key.index)
                }
                SegmentState::Cancelled => summary.cancelled += 1,
                _ => {}
            }
        }
        for (_, summary) in summaries.iter_mut() {
            summary.permanently_failed.sort_unstable();
        }
        summaries
    }
}

/// Segment Dispatch Port
///
/// 在固定大小的会话池上处理全部待合成片段；
/// 只有当每个片段都进入终态后才返回。
#[async_trait]
pub trait SegmentDispatchPort: Send + Sync {
    async fn dispatch(&self, worklist: Vec<Segment>, cancel: CancellationToken) -> DispatchReport;
}
