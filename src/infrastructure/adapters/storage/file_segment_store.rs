//! File Segment Store - 文件系统片段存储
//!
//! 目录布局：`<base_dir>/<chapter>/<index:03>.txt` + `manifest.json`

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::application::ports::{SegmentManifest, SegmentStoreError, SegmentStorePort};
use crate::domain::chapter::{ChapterId, Segment, SegmentKey};

const MANIFEST_FILE: &str = "manifest.json";

/// 文件系统片段存储
pub struct FileSegmentStore {
    /// 存储根目录
    base_dir: PathBuf,
}

impl FileSegmentStore {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    /// 获取存储根目录
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn chapter_dir(&self, chapter: &ChapterId) -> PathBuf {
        self.base_dir.join(chapter.to_string())
    }

    fn segment_path(&self, key: &SegmentKey) -> PathBuf {
        self.chapter_dir(&key.chapter)
            .join(format!("{}.txt", key.file_stem()))
    }

    fn manifest_path(&self, chapter: &ChapterId) -> PathBuf {
        self.chapter_dir(chapter).join(MANIFEST_FILE)
    }
}

fn io_error(e: std::io::Error) -> SegmentStoreError {
    SegmentStoreError::IoError(e.to_string())
}

#[async_trait]
impl SegmentStorePort for FileSegmentStore {
    async fn write(&self, chapter: &ChapterId, segments: &[Segment]) -> Result<(), SegmentStoreError> {
        let chapter_dir = self.chapter_dir(chapter);

        // 整章替换，避免分段参数变化后残留旧片段
        if fs::try_exists(&chapter_dir).await.map_err(io_error)? {
            fs::remove_dir_all(&chapter_dir).await.map_err(io_error)?;
        }
        fs::create_dir_all(&chapter_dir).await.map_err(io_error)?;

        for segment in segments {
            fs::write(self.segment_path(&segment.key()), segment.content())
                .await
                .map_err(io_error)?;
        }

        let manifest = SegmentManifest::from_segments(chapter, segments);
        let json = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| SegmentStoreError::InvalidManifest(e.to_string()))?;
        fs::write(self.manifest_path(chapter), json)
            .await
            .map_err(io_error)?;

        tracing::debug!(
            chapter = %chapter,
            segments = segments.len(),
            dir = %chapter_dir.display(),
            "Segments written"
        );

        Ok(())
    }

    async fn read(&self, chapter: &ChapterId, index: usize) -> Result<String, SegmentStoreError> {
        let key = SegmentKey::new(chapter.clone(), index);
        let path = self.segment_path(&key);
        match fs::read_to_string(&path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SegmentStoreError::SegmentNotFound(key.to_string()))
            }
            Err(e) => Err(io_error(e)),
        }
    }

    async fn manifest(&self, chapter: &ChapterId) -> Result<SegmentManifest, SegmentStoreError> {
        let path = self.manifest_path(chapter);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SegmentStoreError::ChapterNotFound(chapter.to_string()))
            }
            Err(e) => return Err(io_error(e)),
        };

        let manifest: SegmentManifest = serde_json::from_slice(&bytes)
            .map_err(|e| SegmentStoreError::InvalidManifest(format!("{}: {}", path.display(), e)))?;

        if &manifest.chapter != chapter || manifest.segments.len() != manifest.segment_count {
            return Err(SegmentStoreError::InvalidManifest(format!(
                "{}: inconsistent manifest",
                path.display()
            )));
        }

        Ok(manifest)
    }

    async fn load(&self, chapter: &ChapterId) -> Result<Vec<Segment>, SegmentStoreError> {
        let manifest = self.manifest(chapter).await?;

        let mut segments = Vec::with_capacity(manifest.segment_count);
        for (position, entry) in manifest.segments.iter().enumerate() {
            if entry.index != position {
                return Err(SegmentStoreError::InvalidManifest(format!(
                    "{}: index {} at position {}",
                    chapter, entry.index, position
                )));
            }
            let content = self.read(chapter, entry.index).await?;
            let segment = Segment::new(chapter.clone(), entry.index, content, entry.verses)
                .map_err(|e| SegmentStoreError::InvalidManifest(format!("{}: {}", chapter, e)))?;
            segments.push(segment);
        }

        Ok(segments)
    }

    async fn list_chapters(&self) -> Result<Vec<ChapterId>, SegmentStoreError> {
        if !fs::try_exists(&self.base_dir).await.map_err(io_error)? {
            return Ok(Vec::new());
        }

        let mut chapters = Vec::new();
        let mut entries = fs::read_dir(&self.base_dir).await.map_err(io_error)?;
        while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
            let path = entry.path();
            if !path.join(MANIFEST_FILE).is_file() {
                continue;
            }
            if let Some(id) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.parse::<ChapterId>().ok())
            {
                chapters.push(id);
            }
        }

        chapters.sort();
        Ok(chapters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::ArtifactStorePort;
    use crate::domain::chapter::Chapter;
    use crate::domain::ChunkerConfig;
    use crate::infrastructure::adapters::FileArtifactStore;
    use tempfile::tempdir;

    fn chapter_segments(id: &str, text: &str, max: usize) -> (ChapterId, Vec<Segment>) {
        let id: ChapterId = id.parse().unwrap();
        let chapter = Chapter::from_text(id.clone(), text);
        let segments = chapter.segments(&ChunkerConfig::new(1, max));
        (id, segments)
    }

    #[tokio::test]
    async fn test_write_and_read_segments() {
        let dir = tempdir().unwrap();
        let store = FileSegmentStore::new(dir.path());
        let (id, segments) = chapter_segments("Gen1", "Im Anfang schuf Gott. Himmel und Erde.", 100);

        store.write(&id, &segments).await.unwrap();

        assert!(dir.path().join("Gen1").join("000.txt").exists());
        assert_eq!(store.read(&id, 0).await.unwrap(), "Im Anfang schuf Gott.");
        assert_eq!(store.expected_count(&id).await.unwrap(), 2);
        assert_eq!(store.load(&id).await.unwrap(), segments);
        assert_eq!(store.list_chapters().await.unwrap(), vec![id]);
    }

    #[tokio::test]
    async fn test_rewrite_replaces_stale_segments() {
        let dir = tempdir().unwrap();
        let store = FileSegmentStore::new(dir.path());
        let text = "eins zwei drei vier fünf sechs sieben acht";

        let (id, many) = chapter_segments("Ex3", text, 10);
        store.write(&id, &many).await.unwrap();
        assert!(many.len() > 2);

        let (_, few) = chapter_segments("Ex3", text, 100);
        store.write(&id, &few).await.unwrap();

        assert_eq!(store.expected_count(&id).await.unwrap(), 1);
        assert!(!dir.path().join("Ex3").join("001.txt").exists());
        assert!(matches!(
            store.read(&id, 1).await,
            Err(SegmentStoreError::SegmentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_pending_skips_completed() {
        let dir = tempdir().unwrap();
        let audio = tempdir().unwrap();
        let store = FileSegmentStore::new(dir.path());
        let artifacts = FileArtifactStore::new(audio.path());
        let (id, segments) = chapter_segments("Lk2", "a. b. c.", 100);
        store.write(&id, &segments).await.unwrap();
        assert_eq!(segments.len(), 3);

        artifacts.save(&segments[1].key(), b"wav").await.unwrap();

        let pending: Vec<usize> = store
            .list_pending(&id, &artifacts)
            .await
            .unwrap()
            .iter()
            .map(|s| s.index())
            .collect();
        assert_eq!(pending, vec![0, 2]);
    }

    #[tokio::test]
    async fn test_missing_chapter() {
        let dir = tempdir().unwrap();
        let store = FileSegmentStore::new(dir.path().join("nope"));
        let id: ChapterId = "Gen50".parse().unwrap();
        assert!(matches!(
            store.manifest(&id).await,
            Err(SegmentStoreError::ChapterNotFound(_))
        ));
        assert!(store.list_chapters().await.unwrap().is_empty());
    }
}
