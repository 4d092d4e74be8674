//! Assembly Query Handlers - 结果汇总校验
//!
//! 只报告缺口，不触发重新生成

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::application::error::{ApplicationError, ChapterFailure};
use crate::application::ports::{ArtifactStorePort, SegmentStorePort};
use crate::application::queries::{AssemblyReport, VerifyChapters, VerifyChaptersResponse};
use crate::domain::chapter::ChapterId;

/// VerifyChapters Handler
///
/// 单个章节无法校验时记录该章节并继续其它章节
pub struct VerifyChaptersHandler {
    segment_store: Arc<dyn SegmentStorePort>,
    artifact_store: Arc<dyn ArtifactStorePort>,
    /// 章节齐全时写入拼接顺序清单
    write_order_list: bool,
}

impl VerifyChaptersHandler {
    pub fn new(
        segment_store: Arc<dyn SegmentStorePort>,
        artifact_store: Arc<dyn ArtifactStorePort>,
        write_order_list: bool,
    ) -> Self {
        Self {
            segment_store,
            artifact_store,
            write_order_list,
        }
    }

    pub async fn handle(&self, query: VerifyChapters) -> Result<VerifyChaptersResponse, ApplicationError> {
        let chapters = if query.chapters.is_empty() {
            self.segment_store.list_chapters().await?
        } else {
            query.chapters
        };

        let mut response = VerifyChaptersResponse::default();
        for chapter in chapters {
            match self.verify_one(&chapter).await {
                Ok(report) => response.reports.push(report),
                Err(e) => {
                    tracing::error!(chapter = %chapter, error = %e, "Failed to verify chapter, skipping");
                    response.failed.push(ChapterFailure::new(&chapter, e));
                }
            }
        }
        Ok(response)
    }

    async fn verify_one(&self, chapter: &ChapterId) -> Result<AssemblyReport, ApplicationError> {
        let expected = self.segment_store.expected_count(chapter).await?;
        self.verify_chapter(chapter.clone(), expected).await
    }

    /// 校验单个章节：0..expected 内的每个索引都必须有完整音频
    pub async fn verify_chapter(
        &self,
        chapter: ChapterId,
        expected: usize,
    ) -> Result<AssemblyReport, ApplicationError> {
        let existing: BTreeSet<usize> = self
            .artifact_store
            .list_indices(&chapter)
            .await?
            .into_iter()
            .collect();

        let missing: Vec<usize> = (0..expected).filter(|i| !existing.contains(i)).collect();
        let orphaned: Vec<usize> = existing.range(expected..).copied().collect();
        let present = expected - missing.len();

        if missing.is_empty() {
            if self.write_order_list && expected > 0 {
                let path = self.artifact_store.write_order_list(&chapter, expected).await?;
                tracing::debug!(chapter = %chapter, path = %path.display(), "Order list written");
            }
            tracing::info!(chapter = %chapter, segments = expected, "Chapter audio complete");
        } else {
            tracing::warn!(
                chapter = %chapter,
                expected = expected,
                missing = ?missing,
                "Chapter audio incomplete"
            );
        }

        if !orphaned.is_empty() {
            tracing::warn!(chapter = %chapter, orphaned = ?orphaned, "Stale artifacts beyond segment range");
        }

        Ok(AssemblyReport {
            chapter,
            expected,
            present,
            missing,
            orphaned,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chapter::SegmentKey;
    use crate::infrastructure::adapters::{FileArtifactStore, FileSegmentStore};
    use tempfile::tempdir;

    fn handler(audio: &std::path::Path, segments: &std::path::Path, order: bool) -> (VerifyChaptersHandler, Arc<FileArtifactStore>) {
        let artifacts = Arc::new(FileArtifactStore::new(audio));
        let handler = VerifyChaptersHandler::new(
            Arc::new(FileSegmentStore::new(segments)),
            artifacts.clone(),
            order,
        );
        (handler, artifacts)
    }

    #[tokio::test]
    async fn test_reports_gaps_and_orphans() {
        let audio = tempdir().unwrap();
        let segments = tempdir().unwrap();
        let (handler, artifacts) = handler(audio.path(), segments.path(), true);
        let chapter: ChapterId = "Mk1".parse().unwrap();

        for i in [0, 1, 3, 5] {
            artifacts.save(&SegmentKey::new(chapter.clone(), i), b"wav").await.unwrap();
        }

        let report = handler.verify_chapter(chapter.clone(), 5).await.unwrap();
        assert_eq!(report.missing, vec![2, 4]);
        assert_eq!(report.orphaned, vec![5]);
        assert_eq!(report.present, 3);
        assert!(!report.is_complete());
        assert!(!artifacts.chapter_dir(&chapter).join("order.txt").exists());
    }

    #[tokio::test]
    async fn test_complete_chapter_writes_order_list() {
        let audio = tempdir().unwrap();
        let segments = tempdir().unwrap();
        let (handler, artifacts) = handler(audio.path(), segments.path(), true);
        let chapter: ChapterId = "Mk2".parse().unwrap();

        for i in 0..2 {
            artifacts.save(&SegmentKey::new(chapter.clone(), i), b"wav").await.unwrap();
        }

        let report = handler.verify_chapter(chapter.clone(), 2).await.unwrap();
        assert!(report.is_complete());

        let order = std::fs::read_to_string(artifacts.chapter_dir(&chapter).join("order.txt")).unwrap();
        assert_eq!(order, "file '000.wav'\nfile '001.wav'\n");
    }

    #[tokio::test]
    async fn test_empty_chapter_is_complete() {
        let audio = tempdir().unwrap();
        let segments = tempdir().unwrap();
        let (handler, _) = handler(audio.path(), segments.path(), true);

        let report = handler.verify_chapter("Obd1".parse().unwrap(), 0).await.unwrap();
        assert!(report.is_complete());
        assert_eq!(report.present, 0);
    }

    #[tokio::test]
    async fn test_unreadable_chapter_does_not_stop_others() {
        let audio = tempdir().unwrap();
        let segments = tempdir().unwrap();
        let (handler, artifacts) = handler(audio.path(), segments.path(), false);
        let store = FileSegmentStore::new(segments.path());

        let good: ChapterId = "Mk3".parse().unwrap();
        let chapter = crate::domain::chapter::Chapter::from_text(good.clone(), "Und er ging wieder.");
        let written = chapter.segments(&crate::domain::ChunkerConfig::default());
        store.write(&good, &written).await.unwrap();
        artifacts.save(&written[0].key(), b"wav").await.unwrap();

        std::fs::create_dir_all(segments.path().join("Mk4")).unwrap();
        std::fs::write(segments.path().join("Mk4").join("manifest.json"), "{").unwrap();

        let response = handler.handle(VerifyChapters::default()).await.unwrap();

        assert_eq!(response.reports.len(), 1);
        assert_eq!(response.reports[0].chapter, good);
        assert!(response.reports[0].is_complete());
        assert_eq!(response.failed.len(), 1);
        assert_eq!(response.failed[0].chapter, "Mk4");
        assert!(!response.is_complete());

        let query = VerifyChapters {
            chapters: vec!["Mk9".parse().unwrap(), good],
        };
        let response = handler.handle(query).await.unwrap();
        assert_eq!(response.reports.len(), 1);
        assert_eq!(response.failed[0].chapter, "Mk9");
    }
}
