//! Session Pool Dispatcher - 固定大小会话池上的片段分发

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};
use tokio_util::sync::CancellationToken;

use super::streaming_adapter::{StreamingAdapter, SynthesisFailure};
use crate::application::ports::{AudioArtifact, DispatchReport, SegmentDispatchPort, SegmentState};
use crate::domain::chapter::{Segment, SegmentKey};
use crate::infrastructure::memory::InMemoryRunTracker;

/// 默认会话池大小
pub const DEFAULT_POOL_SIZE: usize = 40;

/// 分发器配置
#[derive(Debug, Clone)]
pub struct SessionPoolConfig {
    /// 同时在途的最大会话数
    pub pool_size: usize,
    /// 每个片段失败后的最大重试次数
    pub max_retries: u32,
}

impl Default for SessionPoolConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            max_retries: 1,
        }
    }
}

type AttemptResult = (Segment, u32, Result<AudioArtifact, SynthesisFailure>);

/// 会话池分发器
///
/// 用 semaphore 限制在途会话数，任一会话结束后立即补位。
/// 分配顺序即工作列表顺序，失败的片段排到队尾重试。
pub struct SessionPoolDispatcher {
    config: SessionPoolConfig,
    adapter: Arc<StreamingAdapter>,
}

impl SessionPoolDispatcher {
    pub fn new(config: SessionPoolConfig, adapter: Arc<StreamingAdapter>) -> Self {
        Self {
            config: SessionPoolConfig {
                pool_size: config.pool_size.max(1),
                ..config
            },
            adapter,
        }
    }

    /// 尝试次数用尽前重新排队
    fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.config.max_retries
    }

    fn handle_result(
        &self,
        tracker: &InMemoryRunTracker,
        queue: &mut VecDeque<Segment>,
        (segment, attempt, result): AttemptResult,
    ) {
        let key = segment.key();
        match result {
            Ok(_) => {
                if tracker.mark_succeeded(&key) == Some(SegmentState::Recovered) {
                    tracing::info!(
                        chapter = %key.chapter,
                        segment_index = key.index,
                        attempt = attempt,
                        "Segment recovered after retry"
                    );
                }
            }
            Err(failure) if self.should_retry(attempt) => {
                tracing::warn!(
                    chapter = %key.chapter,
                    segment_index = key.index,
                    attempt = attempt,
                    error = %failure,
                    "Segment failed, re-queued for retry"
                );
                tracker.mark_retrying(&key, failure.to_string());
                queue.push_back(segment);
            }
            Err(failure) => {
                tracing::error!(
                    chapter = %key.chapter,
                    segment_index = key.index,
                    attempt = attempt,
                    error = %failure,
                    "Segment permanently failed"
                );
                tracker.mark_failed(&key, failure.to_string());
            }
        }
    }
}

#[async_trait]
impl SegmentDispatchPort for SessionPoolDispatcher {
    async fn dispatch(&self, worklist: Vec<Segment>, cancel: CancellationToken) -> DispatchReport {
        let tracker = InMemoryRunTracker::new().arc();
        tracker.register(&worklist);

        tracing::info!(
            segments = worklist.len(),
            pool_size = self.config.pool_size,
            max_retries = self.config.max_retries,
            "Dispatch started"
        );

        // 使用 semaphore 控制并发
        let semaphore = Arc::new(Semaphore::new(self.config.pool_size));
        let mut queue: VecDeque<Segment> = worklist.into();
        let mut running: JoinSet<AttemptResult> = JoinSet::new();
        let mut running_keys: HashMap<Id, SegmentKey> = HashMap::new();
        let mut aborted = false;

        loop {
            // 补满空闲槽位
            while !cancel.is_cancelled() && !queue.is_empty() {
                let permit = match semaphore.clone().try_acquire_owned() {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let Some(segment) = queue.pop_front() else {
                    break;
                };

                let key = segment.key();
                let attempt = tracker.begin_attempt(&key);
                tracing::debug!(
                    chapter = %key.chapter,
                    segment_index = key.index,
                    attempt = attempt,
                    "Segment assigned"
                );

                let adapter = self.adapter.clone();
                let task_tracker = tracker.clone();
                let handle = running.spawn(async move {
                    let result = adapter.synthesize(&segment).await;
                    task_tracker.end_attempt();
                    drop(permit); // 计数先于槽位释放
                    (segment, attempt, result)
                });
                running_keys.insert(handle.id(), key);
            }

            if running.is_empty() {
                break;
            }

            let joined = tokio::select! {
                _ = cancel.cancelled(), if !aborted => {
                    tracing::warn!(in_flight = running.len(), "Dispatch cancelled, aborting in-flight sessions");
                    running.abort_all();
                    aborted = true;
                    continue;
                }
                joined = running.join_next_with_id() => joined,
            };

            match joined {
                Some(Ok((id, result))) => {
                    running_keys.remove(&id);
                    self.handle_result(&tracker, &mut queue, result);
                }
                Some(Err(e)) => {
                    // 被中止或 panic 的任务没有机会释放计数
                    tracker.end_attempt();
                    let key = running_keys.remove(&e.id());
                    if let (true, Some(key)) = (e.is_panic(), key) {
                        tracing::error!(
                            chapter = %key.chapter,
                            segment_index = key.index,
                            error = %e,
                            "Segment task panicked"
                        );
                        tracker.mark_failed(&key, format!("task panicked: {}", e));
                    }
                }
                None => break,
            }
        }

        if cancel.is_cancelled() {
            tracker.cancel_unfinished();
        }

        let report = tracker.report();
        tracing::info!(
            complete = report.count(SegmentState::Complete),
            recovered = report.count(SegmentState::Recovered),
            permanently_failed = report.count(SegmentState::PermanentlyFailed),
            cancelled = report.count(SegmentState::Cancelled),
            peak_in_flight = report.peak_in_flight,
            "Dispatch finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{ArtifactStorePort, SegmentStorePort};
    use crate::application::queries::{handlers::VerifyChaptersHandler, VerifyChapters};
    use crate::domain::chapter::{ChapterId, VerseSpan};
    use crate::infrastructure::adapters::{
        FakeFailure, FakeSynthesisConfig, FakeSynthesisService, FileArtifactStore,
        FileSegmentStore,
    };
    use crate::infrastructure::worker::StreamingAdapterConfig;
    use std::time::Duration;
    use tempfile::tempdir;

    fn chapter() -> ChapterId {
        "Mk4".parse().unwrap()
    }

    fn worklist(n: usize) -> Vec<Segment> {
        (0..n)
            .map(|i| {
                Segment::new(
                    chapter(),
                    i,
                    format!("Gleichnis Nummer {}.", i),
                    VerseSpan::single(i as u32 + 1),
                )
                .unwrap()
            })
            .collect()
    }

    fn service(frame_delay_ms: u64) -> FakeSynthesisService {
        FakeSynthesisService::new(FakeSynthesisConfig {
            frames_per_segment: 2,
            frame_bytes: 64,
            frame_delay_ms,
            sample_rate: 24000,
        })
    }

    fn dispatcher(
        service: &FakeSynthesisService,
        store: Arc<FileArtifactStore>,
        pool_size: usize,
        max_retries: u32,
    ) -> SessionPoolDispatcher {
        let adapter = StreamingAdapter::new(
            StreamingAdapterConfig {
                idle_timeout: Duration::from_millis(200),
                segment_timeout: Duration::from_secs(5),
                close_grace: Duration::from_millis(100),
                ..Default::default()
            },
            Arc::new(service.clone()),
            store,
        );
        SessionPoolDispatcher::new(
            SessionPoolConfig {
                pool_size,
                max_retries,
            },
            Arc::new(adapter),
        )
    }

    #[tokio::test]
    async fn test_in_flight_never_exceeds_pool_size() {
        let service = service(5);
        let dir = tempdir().unwrap();
        let store = Arc::new(FileArtifactStore::new(dir.path()));
        let dispatcher = dispatcher(&service, store.clone(), 4, 1);

        let report = dispatcher
            .dispatch(worklist(20), CancellationToken::new())
            .await;

        assert_eq!(report.count(SegmentState::Complete), 20);
        assert!(report.peak_in_flight <= 4);
        assert!(service.peak_in_flight() <= 4);
        assert_eq!(service.in_flight(), 0);
        assert_eq!(store.list_indices(&chapter()).await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_assignment_follows_worklist_order() {
        let service = service(0);
        let dir = tempdir().unwrap();
        let store = Arc::new(FileArtifactStore::new(dir.path()));
        let dispatcher = dispatcher(&service, store, 1, 0);

        dispatcher.dispatch(worklist(3), CancellationToken::new()).await;

        assert_eq!(
            service.requests(),
            vec![
                "Read aloud: Gleichnis Nummer 0.".to_string(),
                "Read aloud: Gleichnis Nummer 1.".to_string(),
                "Read aloud: Gleichnis Nummer 2.".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_then_success_is_recovered() {
        let service = service(1);
        service.fail_when("Nummer 1.", FakeFailure::Interrupt, 1);
        let dir = tempdir().unwrap();
        let store = Arc::new(FileArtifactStore::new(dir.path()));
        let dispatcher = dispatcher(&service, store.clone(), 2, 1);

        let report = dispatcher.dispatch(worklist(3), CancellationToken::new()).await;

        let outcome = report.outcome(&SegmentKey::new(chapter(), 1)).unwrap();
        assert_eq!(outcome.state, SegmentState::Recovered);
        assert_eq!(outcome.attempts, 2);
        assert!(!report.has_failures());
        assert_eq!(store.list_indices(&chapter()).await.unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_retry_is_queued_behind_pending_segments() {
        let service = service(0);
        service.fail_when("Nummer 0.", FakeFailure::Empty, 1);
        let dir = tempdir().unwrap();
        let store = Arc::new(FileArtifactStore::new(dir.path()));
        let dispatcher = dispatcher(&service, store, 1, 1);

        dispatcher.dispatch(worklist(3), CancellationToken::new()).await;

        let requests = service.requests();
        assert_eq!(requests.len(), 4);
        assert_eq!(requests[3], "Read aloud: Gleichnis Nummer 0.");
    }

    #[tokio::test]
    async fn test_failing_segment_is_reported_as_gap() {
        let service = service(1);
        service.fail_when("Nummer 3.", FakeFailure::Interrupt, 2);
        let dir = tempdir().unwrap();
        let audio = Arc::new(FileArtifactStore::new(dir.path().join("wav")));
        let segments = Arc::new(FileSegmentStore::new(dir.path().join("chapters")));
        let work = worklist(5);
        segments.write(&chapter(), &work).await.unwrap();

        let dispatcher = dispatcher(&service, audio.clone(), 2, 1);
        let report = dispatcher.dispatch(work, CancellationToken::new()).await;

        assert_eq!(report.permanently_failed(), vec![&SegmentKey::new(chapter(), 3)]);
        assert_eq!(report.count(SegmentState::Complete), 4);
        let outcome = report.outcome(&SegmentKey::new(chapter(), 3)).unwrap();
        assert_eq!(outcome.attempts, 2);
        assert!(outcome.last_error.is_some());

        let summaries = report.by_chapter();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].1.permanently_failed, vec![3]);

        let verify = VerifyChaptersHandler::new(segments, audio, false);
        let response = verify
            .handle(VerifyChapters { chapters: vec![] })
            .await
            .unwrap();
        assert!(response.failed.is_empty());
        assert_eq!(response.reports.len(), 1);
        assert_eq!(response.reports[0].missing, vec![3]);
    }

    #[tokio::test]
    async fn test_stalled_session_releases_slot() {
        let service = service(1);
        service.fail_when("Nummer 0.", FakeFailure::Stall, 5);
        let dir = tempdir().unwrap();
        let store = Arc::new(FileArtifactStore::new(dir.path()));
        let dispatcher = dispatcher(&service, store, 1, 0);

        let report = dispatcher.dispatch(worklist(3), CancellationToken::new()).await;

        assert_eq!(
            report.outcome(&SegmentKey::new(chapter(), 0)).unwrap().state,
            SegmentState::PermanentlyFailed
        );
        assert_eq!(report.count(SegmentState::Complete), 2);
        assert_eq!(service.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_cancellation_marks_unstarted_segments() {
        let service = service(50);
        let dir = tempdir().unwrap();
        let store = Arc::new(FileArtifactStore::new(dir.path()));
        let dispatcher = dispatcher(&service, store, 2, 1);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            trigger.cancel();
        });

        let report = dispatcher.dispatch(worklist(10), cancel).await;

        assert_eq!(report.outcomes.len(), 10);
        assert!(report.count(SegmentState::Cancelled) >= 8);
        assert!(report
            .outcomes
            .iter()
            .all(|o| o.state.is_terminal()));
        assert_eq!(service.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_empty_worklist() {
        let service = service(0);
        let dir = tempdir().unwrap();
        let store = Arc::new(FileArtifactStore::new(dir.path()));
        let dispatcher = dispatcher(&service, store, 3, 1);

        let report = dispatcher.dispatch(Vec::new(), CancellationToken::new()).await;
        assert!(report.outcomes.is_empty());
        assert_eq!(service.opened_sessions(), 0);
    }
}
