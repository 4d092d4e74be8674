//! Split Command Handlers

use std::sync::Arc;

use crate::application::commands::{ChapterSplit, SplitChapters, SplitChaptersResponse};
use crate::application::error::{ApplicationError, ChapterFailure};
use crate::application::ports::{
    ArtifactStorePort, ChapterSourcePort, SegmentManifest, SegmentStoreError, SegmentStorePort,
};
use crate::domain::chapter::{ChapterId, SegmentKey, SORTABLE_SEGMENT_LIMIT};
use crate::domain::ChunkerConfig;

/// SplitChapters Handler
///
/// 章节级错误（编码无效、文件缺失）只跳过该章节并记录，不中断其它章节。
/// 重新分段后文本发生变化的片段，其旧音频会被删除，以便下次合成时重新生成。
pub struct SplitChaptersHandler {
    source: Arc<dyn ChapterSourcePort>,
    segment_store: Arc<dyn SegmentStorePort>,
    artifact_store: Arc<dyn ArtifactStorePort>,
    config: ChunkerConfig,
}

impl SplitChaptersHandler {
    pub fn new(
        source: Arc<dyn ChapterSourcePort>,
        segment_store: Arc<dyn SegmentStorePort>,
        artifact_store: Arc<dyn ArtifactStorePort>,
        config: ChunkerConfig,
    ) -> Self {
        Self {
            source,
            segment_store,
            artifact_store,
            config,
        }
    }

    pub async fn handle(
        &self,
        command: SplitChapters,
    ) -> Result<SplitChaptersResponse, ApplicationError> {
        self.config
            .validate()
            .map_err(ApplicationError::validation)?;

        let chapters = if command.chapters.is_empty() {
            self.source.list_chapters().await?
        } else {
            command.chapters
        };

        let mut response = SplitChaptersResponse::default();

        for chapter_id in chapters {
            match self.split_one(&chapter_id).await {
                Ok(split) => {
                    tracing::info!(
                        chapter = %split.chapter,
                        verses = split.verses,
                        segments = split.segments,
                        stale = split.stale.len(),
                        "Chapter split"
                    );
                    response.split.push(split);
                }
                Err(e) => {
                    tracing::error!(chapter = %chapter_id, error = %e, "Failed to split chapter, skipping");
                    response.failed.push(ChapterFailure::new(&chapter_id, e));
                }
            }
        }

        Ok(response)
    }

    async fn split_one(&self, chapter_id: &ChapterId) -> Result<ChapterSplit, ApplicationError> {
        let chapter = self.source.load(chapter_id).await?;
        let segments = chapter.segments(&self.config);

        if segments.len() > SORTABLE_SEGMENT_LIMIT {
            tracing::warn!(
                chapter = %chapter_id,
                segments = segments.len(),
                limit = SORTABLE_SEGMENT_LIMIT,
                "Segment file names no longer sort lexically, use the order list for concatenation"
            );
        }

        let previous = self.previous_manifest(chapter_id).await;
        self.segment_store.write(chapter_id, &segments).await?;

        let mut stale = Vec::new();
        if let Some(previous) = previous {
            let next = SegmentManifest::from_segments(chapter_id, &segments);
            for index in previous.changed_indices(&next) {
                let key = SegmentKey::new(chapter_id.clone(), index);
                if self.artifact_store.delete(&key).await? {
                    tracing::info!(segment = %key, "Segment text changed, stale audio removed");
                    stale.push(index);
                }
            }
        }

        Ok(ChapterSplit {
            chapter: chapter_id.clone(),
            verses: chapter.verses().len(),
            segments: segments.len(),
            stale,
        })
    }

    /// 上一次分段的清单；不可读时按首次分段处理
    async fn previous_manifest(&self, chapter_id: &ChapterId) -> Option<SegmentManifest> {
        match self.segment_store.manifest(chapter_id).await {
            Ok(manifest) => Some(manifest),
            Err(SegmentStoreError::ChapterNotFound(_)) => None,
            Err(e) => {
                tracing::warn!(
                    chapter = %chapter_id,
                    error = %e,
                    "Previous manifest unreadable, existing audio is kept as is"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::{FileArtifactStore, FileChapterSource, FileSegmentStore};
    use std::path::Path;
    use tempfile::tempdir;

    fn handler_at(input: &Path, output: &Path, audio: &Path, config: ChunkerConfig) -> SplitChaptersHandler {
        SplitChaptersHandler::new(
            Arc::new(FileChapterSource::new(input)),
            Arc::new(FileSegmentStore::new(output)),
            Arc::new(FileArtifactStore::new(audio)),
            config,
        )
    }

    #[tokio::test]
    async fn test_split_skips_bad_chapter_and_continues() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        std::fs::write(input.path().join("Gen1.txt"), "Im Anfang schuf Gott Himmel und Erde.\n").unwrap();
        std::fs::write(input.path().join("Gen2.txt"), [0xffu8, 0xfe, 0x00]).unwrap();
        std::fs::write(input.path().join("Gen3.txt"), "").unwrap();

        let audio = tempdir().unwrap();
        let store = FileSegmentStore::new(output.path());
        let handler = handler_at(input.path(), output.path(), audio.path(), ChunkerConfig::default());

        let response = handler.handle(SplitChapters::default()).await.unwrap();

        assert_eq!(response.split.len(), 2);
        assert_eq!(response.failed.len(), 1);
        assert_eq!(response.failed[0].chapter, "Gen2");
        assert_eq!(response.total_segments(), 1);

        let gen3: ChapterId = "Gen3".parse().unwrap();
        assert_eq!(store.expected_count(&gen3).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_split_missing_chapter_is_reported() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();

        let handler = handler_at(input.path(), output.path(), output.path(), ChunkerConfig::default());

        let command = SplitChapters {
            chapters: vec!["Offb22".parse().unwrap()],
        };
        let response = handler.handle(command).await.unwrap();
        assert!(response.split.is_empty());
        assert_eq!(response.failed[0].chapter, "Offb22");
    }

    #[tokio::test]
    async fn test_split_rejects_invalid_config() {
        let dir = tempdir().unwrap();
        let handler = handler_at(dir.path(), dir.path(), dir.path(), ChunkerConfig::new(200, 100));

        let result = handler.handle(SplitChapters::default()).await;
        assert!(matches!(result, Err(ApplicationError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_resplit_removes_audio_of_changed_segments() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let audio = tempdir().unwrap();
        let artifacts = FileArtifactStore::new(audio.path());
        let handler = handler_at(input.path(), output.path(), audio.path(), ChunkerConfig::new(1, 30));
        let id: ChapterId = "Joh1".parse().unwrap();

        std::fs::write(
            input.path().join("Joh1.txt"),
            "Im Anfang war das Wort.\nUnd das Wort war bei Gott.\n",
        )
        .unwrap();
        let first = handler.handle(SplitChapters::default()).await.unwrap();
        assert_eq!(first.split[0].segments, 2);
        assert!(first.split[0].stale.is_empty());

        for index in 0..2 {
            artifacts
                .save(&SegmentKey::new(id.clone(), index), b"RIFF")
                .await
                .unwrap();
        }

        std::fs::write(
            input.path().join("Joh1.txt"),
            "Im Anfang war das Wort.\nUnd das Wort war Gott.\n",
        )
        .unwrap();
        let second = handler.handle(SplitChapters::default()).await.unwrap();

        assert_eq!(second.split[0].stale, vec![1]);
        assert!(artifacts.exists(&SegmentKey::new(id.clone(), 0)).await);
        assert!(!artifacts.exists(&SegmentKey::new(id, 1)).await);
    }

    #[tokio::test]
    async fn test_resplit_with_corrupt_manifest_keeps_audio() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let audio = tempdir().unwrap();
        let artifacts = FileArtifactStore::new(audio.path());
        let handler = handler_at(input.path(), output.path(), audio.path(), ChunkerConfig::new(1, 30));
        let key = SegmentKey::new("Joh2".parse().unwrap(), 0);

        std::fs::write(input.path().join("Joh2.txt"), "Und am dritten Tage.\n").unwrap();
        std::fs::create_dir_all(output.path().join("Joh2")).unwrap();
        std::fs::write(output.path().join("Joh2").join("manifest.json"), "{").unwrap();
        artifacts.save(&key, b"RIFF").await.unwrap();

        let response = handler.handle(SplitChapters::default()).await.unwrap();

        assert!(response.failed.is_empty());
        assert!(response.split[0].stale.is_empty());
        assert!(artifacts.exists(&key).await);
    }
}
