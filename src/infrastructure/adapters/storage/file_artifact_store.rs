//! File Artifact Store - 文件系统音频存储
//!
//! 实现 ArtifactStorePort trait；目录布局 `<base_dir>/<chapter>/<index:03>.wav`

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::application::ports::{
    ArtifactStatus, ArtifactStoreError, ArtifactStorePort, AudioArtifact,
};
use crate::domain::chapter::{ChapterId, SegmentKey};

const AUDIO_EXTENSION: &str = "wav";
const PARTIAL_EXTENSION: &str = "wav.part";
const ORDER_LIST_FILE: &str = "order.txt";

/// 文件系统音频存储
pub struct FileArtifactStore {
    /// 存储根目录
    base_dir: PathBuf,
}

impl FileArtifactStore {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    /// 获取存储根目录
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn partial_path(&self, key: &SegmentKey) -> PathBuf {
        self.chapter_dir(&key.chapter)
            .join(format!("{}.{}", key.file_stem(), PARTIAL_EXTENSION))
    }
}

fn io_error(e: std::io::Error) -> ArtifactStoreError {
    ArtifactStoreError::IoError(e.to_string())
}

#[async_trait]
impl ArtifactStorePort for FileArtifactStore {
    fn chapter_dir(&self, chapter: &ChapterId) -> PathBuf {
        self.base_dir.join(chapter.to_string())
    }

    fn artifact_path(&self, key: &SegmentKey) -> PathBuf {
        self.chapter_dir(&key.chapter)
            .join(format!("{}.{}", key.file_stem(), AUDIO_EXTENSION))
    }

    async fn save(&self, key: &SegmentKey, data: &[u8]) -> Result<AudioArtifact, ArtifactStoreError> {
        fs::create_dir_all(self.chapter_dir(&key.chapter))
            .await
            .map_err(io_error)?;

        let partial = self.partial_path(key);
        let path = self.artifact_path(key);

        fs::write(&partial, data).await.map_err(io_error)?;
        fs::rename(&partial, &path).await.map_err(io_error)?;

        tracing::debug!(
            segment = %key,
            size = data.len(),
            "Saved audio artifact"
        );

        Ok(AudioArtifact {
            key: key.clone(),
            path,
            bytes: data.len() as u64,
            status: ArtifactStatus::Complete,
        })
    }

    async fn exists(&self, key: &SegmentKey) -> bool {
        fs::try_exists(self.artifact_path(key)).await.unwrap_or(false)
    }

    async fn list_indices(&self, chapter: &ChapterId) -> Result<Vec<usize>, ArtifactStoreError> {
        let chapter_dir = self.chapter_dir(chapter);
        if !fs::try_exists(&chapter_dir).await.map_err(io_error)? {
            return Ok(Vec::new());
        }

        let mut indices = Vec::new();
        let mut entries = fs::read_dir(&chapter_dir).await.map_err(io_error)?;
        while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != AUDIO_EXTENSION) {
                continue;
            }
            if let Some(index) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<usize>().ok())
            {
                indices.push(index);
            }
        }

        indices.sort_unstable();
        Ok(indices)
    }

    async fn delete(&self, key: &SegmentKey) -> Result<bool, ArtifactStoreError> {
        let path = self.artifact_path(key);
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(segment = %key, "Deleted audio artifact");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(e)),
        }
    }

    async fn discard_partial(&self, key: &SegmentKey) -> Result<(), ArtifactStoreError> {
        match fs::remove_file(self.partial_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(e)),
        }
    }

    async fn write_order_list(
        &self,
        chapter: &ChapterId,
        count: usize,
    ) -> Result<PathBuf, ArtifactStoreError> {
        let chapter_dir = self.chapter_dir(chapter);
        fs::create_dir_all(&chapter_dir).await.map_err(io_error)?;

        // ffmpeg concat 格式
        let list: String = (0..count)
            .map(|index| {
                let key = SegmentKey::new(chapter.clone(), index);
                format!("file '{}.{}'\n", key.file_stem(), AUDIO_EXTENSION)
            })
            .collect();

        let path = chapter_dir.join(ORDER_LIST_FILE);
        fs::write(&path, list).await.map_err(io_error)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn key(chapter: &str, index: usize) -> SegmentKey {
        SegmentKey::new(chapter.parse().unwrap(), index)
    }

    #[tokio::test]
    async fn test_save_and_exists() {
        let temp_dir = tempdir().unwrap();
        let store = FileArtifactStore::new(temp_dir.path());
        let key = key("Gen1", 4);

        assert!(!store.exists(&key).await);
        let artifact = store.save(&key, b"fake wav data").await.unwrap();

        assert_eq!(artifact.status, ArtifactStatus::Complete);
        assert_eq!(artifact.bytes, 13);
        assert_eq!(artifact.path, temp_dir.path().join("Gen1").join("004.wav"));
        assert!(store.exists(&key).await);
        assert!(!store.partial_path(&key).exists());
    }

    #[tokio::test]
    async fn test_list_indices_ignores_partials_and_other_files() {
        let temp_dir = tempdir().unwrap();
        let store = FileArtifactStore::new(temp_dir.path());

        for i in [2, 0, 11] {
            store.save(&key("Ps90", i), b"data").await.unwrap();
        }
        let dir = temp_dir.path().join("Ps90");
        std::fs::write(dir.join("003.wav.part"), b"half").unwrap();
        std::fs::write(dir.join("order.txt"), b"").unwrap();

        let indices = store.list_indices(&"Ps90".parse().unwrap()).await.unwrap();
        assert_eq!(indices, vec![0, 2, 11]);
    }

    #[tokio::test]
    async fn test_delete_and_discard_partial() {
        let temp_dir = tempdir().unwrap();
        let store = FileArtifactStore::new(temp_dir.path());
        let key = key("Rut1", 0);

        store.save(&key, b"data").await.unwrap();
        assert!(store.delete(&key).await.unwrap());
        assert!(!store.delete(&key).await.unwrap());

        std::fs::write(store.partial_path(&key), b"half").unwrap();
        store.discard_partial(&key).await.unwrap();
        assert!(!store.partial_path(&key).exists());
        store.discard_partial(&key).await.unwrap();
    }
}
