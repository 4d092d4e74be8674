//! Segment Store Port - 片段持久化
//!
//! 每个片段按 (chapter, index) 独立寻址；写入时整章替换

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ArtifactStorePort;
use crate::domain::chapter::{ChapterId, Segment, VerseSpan};

/// 片段存储错误
#[derive(Debug, Error)]
pub enum SegmentStoreError {
    #[error("Chapter not found: {0}")]
    ChapterNotFound(String),

    #[error("Segment not found: {0}")]
    SegmentNotFound(String),

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// 章节清单中的单个片段条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub index: usize,
    pub verses: VerseSpan,
    pub char_count: usize,
    /// 片段文本的 md5（十六进制）；旧清单中可能缺失
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

/// 章节片段清单（记录期望片段数与经文来源）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentManifest {
    pub chapter: ChapterId,
    pub segment_count: usize,
    pub segments: Vec<ManifestEntry>,
}

impl SegmentManifest {
    pub fn from_segments(chapter: &ChapterId, segments: &[Segment]) -> Self {
        Self {
            chapter: chapter.clone(),
            segment_count: segments.len(),
            segments: segments
                .iter()
                .map(|s| ManifestEntry {
                    index: s.index(),
                    verses: s.verses(),
                    char_count: s.char_count(),
                    content_hash: Some(content_hash(s.content())),
                })
                .collect(),
        }
    }

    /// 与新清单相比，文本发生变化的片段索引
    ///
    /// 旧清单没有记录哈希的条目无法比较，视为未变化；
    /// 旧清单中不存在的索引视为变化（该位置若有音频必然来自更早的分段）
    pub fn changed_indices(&self, next: &SegmentManifest) -> Vec<usize> {
        next.segments
            .iter()
            .filter(|entry| {
                match self.segments.iter().find(|old| old.index == entry.index) {
                    Some(old) => old.content_hash.is_some() && old.content_hash != entry.content_hash,
                    None => true,
                }
            })
            .map(|entry| entry.index)
            .collect()
    }
}

/// 片段文本的内容哈希
pub fn content_hash(content: &str) -> String {
    format!("{:x}", md5::compute(content.as_bytes()))
}

/// Segment Store Port
#[async_trait]
pub trait SegmentStorePort: Send + Sync {
    /// 写入章节的全部片段，替换该章节已有的所有片段
    async fn write(&self, chapter: &ChapterId, segments: &[Segment]) -> Result<(), SegmentStoreError>;

    /// 读取单个片段文本
    async fn read(&self, chapter: &ChapterId, index: usize) -> Result<String, SegmentStoreError>;

    /// 读取章节清单
    async fn manifest(&self, chapter: &ChapterId) -> Result<SegmentManifest, SegmentStoreError>;

    /// 按顺序加载章节的全部片段
    async fn load(&self, chapter: &ChapterId) -> Result<Vec<Segment>, SegmentStoreError>;

    /// 列出已分段的章节
    async fn list_chapters(&self) -> Result<Vec<ChapterId>, SegmentStoreError>;

    /// 章节的期望片段数
    async fn expected_count(&self, chapter: &ChapterId) -> Result<usize, SegmentStoreError> {
        Ok(self.manifest(chapter).await?.segment_count)
    }

    /// 尚无完整音频的片段
    async fn list_pending(
        &self,
        chapter: &ChapterId,
        artifacts: &dyn ArtifactStorePort,
    ) -> Result<Vec<Segment>, SegmentStoreError> {
        let mut pending = Vec::new();
        for segment in self.load(chapter).await? {
            if !artifacts.exists(&segment.key()).await {
                pending.push(segment);
            }
        }
        Ok(pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chapter::Chapter;
    use crate::domain::ChunkerConfig;

    fn manifest(text: &str) -> SegmentManifest {
        let id: ChapterId = "Joh1".parse().unwrap();
        let segments = Chapter::from_text(id.clone(), text).segments(&ChunkerConfig::new(1, 30));
        SegmentManifest::from_segments(&id, &segments)
    }

    #[test]
    fn test_changed_indices_detects_edited_text() {
        let before = manifest("Im Anfang war das Wort.\nUnd das Wort war bei Gott.");
        let after = manifest("Im Anfang war das Wort.\nUnd das Wort war Gott.");
        assert_eq!(before.segment_count, 2);
        assert_eq!(after.segment_count, 2);

        assert_eq!(before.changed_indices(&after), vec![1]);
        assert!(before.changed_indices(&before).is_empty());
    }

    #[test]
    fn test_changed_indices_without_hashes() {
        let mut before = manifest("Im Anfang war das Wort.\nUnd das Wort war bei Gott.");
        for entry in &mut before.segments {
            entry.content_hash = None;
        }
        let after = manifest("Im Anfang war das Wort.\nUnd das Wort war Gott.\nDasselbe war im Anfang.");

        assert_eq!(before.changed_indices(&after), vec![2]);
    }

    #[test]
    fn test_manifest_without_hash_deserializes() {
        let json = r#"{"chapter":"Joh1","segment_count":1,"segments":[{"index":0,"verses":{"first":1,"last":1},"char_count":5}]}"#;
        let parsed: SegmentManifest = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.segments[0].content_hash, None);
    }
}
