//! Synthesize Command Handlers

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::application::commands::{SynthesizeSegments, SynthesizeSegmentsResponse};
use crate::application::error::{ApplicationError, ChapterFailure};
use crate::application::ports::{ArtifactStorePort, SegmentDispatchPort, SegmentStorePort};
use crate::domain::chapter::Segment;

/// SynthesizeSegments Handler
///
/// 按章节顺序收集缺少音频的片段，交给分发器处理。
/// 某章节无法收集（未分段、清单损坏）时记录该章节并继续其它章节。
pub struct SynthesizeSegmentsHandler {
    segment_store: Arc<dyn SegmentStorePort>,
    artifact_store: Arc<dyn ArtifactStorePort>,
    dispatcher: Arc<dyn SegmentDispatchPort>,
}

impl SynthesizeSegmentsHandler {
    pub fn new(
        segment_store: Arc<dyn SegmentStorePort>,
        artifact_store: Arc<dyn ArtifactStorePort>,
        dispatcher: Arc<dyn SegmentDispatchPort>,
    ) -> Self {
        Self {
            segment_store,
            artifact_store,
            dispatcher,
        }
    }

    pub async fn handle(
        &self,
        command: SynthesizeSegments,
        cancel: CancellationToken,
    ) -> Result<SynthesizeSegmentsResponse, ApplicationError> {
        let chapters = if command.chapters.is_empty() {
            self.segment_store.list_chapters().await?
        } else {
            command.chapters
        };

        let mut response = SynthesizeSegmentsResponse::default();
        let mut worklist: Vec<Segment> = Vec::new();
        for chapter in &chapters {
            match self
                .segment_store
                .list_pending(chapter, self.artifact_store.as_ref())
                .await
            {
                Ok(pending) => {
                    tracing::debug!(chapter = %chapter, pending = pending.len(), "Pending segments collected");
                    worklist.extend(pending);
                }
                Err(e) => {
                    let e = ApplicationError::from(e);
                    tracing::error!(chapter = %chapter, error = %e, "Failed to collect pending segments, skipping chapter");
                    response.failed.push(ChapterFailure::new(chapter, e));
                }
            }
        }

        if worklist.is_empty() {
            tracing::info!(chapters = chapters.len(), "No pending segments to dispatch");
            return Ok(response);
        }

        tracing::info!(
            chapters = chapters.len(),
            segments = worklist.len(),
            "Dispatching pending segments"
        );

        response.report = self.dispatcher.dispatch(worklist, cancel).await;
        Ok(response)
    }
}
