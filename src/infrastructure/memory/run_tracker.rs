//! In-Memory Run Tracker Implementation

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::application::ports::{DispatchReport, SegmentOutcome, SegmentState};
use crate::domain::chapter::{Segment, SegmentKey};

/// 单个片段的运行记录
#[derive(Debug, Clone)]
struct TrackedSegment {
    state: SegmentState,
    attempts: u32,
    last_error: Option<String>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl TrackedSegment {
    fn pending() -> Self {
        Self {
            state: SegmentState::Pending,
            attempts: 0,
            last_error: None,
            started_at: None,
            completed_at: None,
        }
    }
}

/// 内存运行跟踪器
///
/// 记录一次分发运行中每个片段的状态与尝试次数，以及在途会话数。
/// 只在单次运行内有效，运行结束后通过 `report` 导出。
pub struct InMemoryRunTracker {
    /// SegmentKey -> 运行记录
    segments: DashMap<SegmentKey, TrackedSegment>,
    /// 注册顺序，报告按此输出
    order: std::sync::Mutex<Vec<SegmentKey>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl InMemoryRunTracker {
    pub fn new() -> Self {
        Self {
            segments: DashMap::new(),
            order: std::sync::Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 登记待处理片段，重复登记的片段被忽略
    pub fn register(&self, worklist: &[Segment]) {
        let mut order = match self.order.lock() {
            Ok(order) => order,
            Err(poisoned) => poisoned.into_inner(),
        };
        for segment in worklist {
            let key = segment.key();
            if self.segments.contains_key(&key) {
                continue;
            }
            self.segments.insert(key.clone(), TrackedSegment::pending());
            order.push(key);
        }
        tracing::debug!(count = order.len(), "Segments registered");
    }

    /// 开始一次尝试，返回本次尝试序号（从 1 开始）
    pub fn begin_attempt(&self, key: &SegmentKey) -> u32 {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        let mut entry = self
            .segments
            .entry(key.clone())
            .or_insert_with(TrackedSegment::pending);
        entry.attempts += 1;
        entry.state = SegmentState::InFlight;
        if entry.started_at.is_none() {
            entry.started_at = Some(Utc::now());
        }
        entry.attempts
    }

    /// 会话已关闭，释放在途计数
    pub fn end_attempt(&self) {
        let _ = self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    pub fn mark_succeeded(&self, key: &SegmentKey) -> Option<SegmentState> {
        let mut entry = self.segments.get_mut(key)?;
        let state = if entry.attempts > 1 {
            SegmentState::Recovered
        } else {
            SegmentState::Complete
        };
        entry.state = state;
        entry.completed_at = Some(Utc::now());
        Some(state)
    }

    pub fn mark_retrying(&self, key: &SegmentKey, error: String) {
        if let Some(mut entry) = self.segments.get_mut(key) {
            entry.state = SegmentState::Retrying;
            entry.last_error = Some(error);
        }
    }

    pub fn mark_failed(&self, key: &SegmentKey, error: String) {
        if let Some(mut entry) = self.segments.get_mut(key) {
            entry.state = SegmentState::PermanentlyFailed;
            entry.last_error = Some(error);
            entry.completed_at = Some(Utc::now());
        }
    }

    /// 取消所有尚未进入终态的片段，返回取消数量
    pub fn cancel_unfinished(&self) -> usize {
        let mut cancelled_count = 0;
        for mut entry in self.segments.iter_mut() {
            if !entry.state.is_terminal() {
                entry.state = SegmentState::Cancelled;
                entry.completed_at = Some(Utc::now());
                cancelled_count += 1;
            }
        }
        tracing::debug!(cancelled_count = cancelled_count, "Unfinished segments cancelled");
        cancelled_count
    }

    pub fn state(&self, key: &SegmentKey) -> Option<SegmentState> {
        self.segments.get(key).map(|t| t.state)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// 导出报告（按登记顺序）
    pub fn report(&self) -> DispatchReport {
        let order = match self.order.lock() {
            Ok(order) => order.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        let outcomes = order
            .into_iter()
            .filter_map(|key| {
                self.segments.get(&key).map(|t| SegmentOutcome {
                    key: key.clone(),
                    state: t.state,
                    attempts: t.attempts,
                    last_error: t.last_error.clone(),
                })
            })
            .collect();

        DispatchReport {
            outcomes,
            peak_in_flight: self.peak_in_flight(),
        }
    }
}

impl Default for InMemoryRunTracker {
    fn default() -> Self {
        Self::new()
    }
}
