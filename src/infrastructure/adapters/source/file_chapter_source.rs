//! File Chapter Source - 从目录读取 `*.txt` 章节文件
//!
//! 实现 ChapterSourcePort trait；文件名主干即章节标识（如 `Gen1.txt`）

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::application::ports::ChapterSourcePort;
use crate::domain::chapter::{Chapter, ChapterError, ChapterId};

/// 文件系统章节源
pub struct FileChapterSource {
    /// 输入目录
    input_dir: PathBuf,
}

impl FileChapterSource {
    pub fn new(input_dir: impl AsRef<Path>) -> Self {
        Self {
            input_dir: input_dir.as_ref().to_path_buf(),
        }
    }

    fn chapter_path(&self, chapter: &ChapterId) -> PathBuf {
        self.input_dir.join(format!("{}.txt", chapter))
    }
}

#[async_trait]
impl ChapterSourcePort for FileChapterSource {
    async fn list_chapters(&self) -> Result<Vec<ChapterId>, ChapterError> {
        let mut entries = fs::read_dir(&self.input_dir).await.map_err(|e| {
            ChapterError::FileRead(format!("{}: {}", self.input_dir.display(), e))
        })?;

        let mut chapters = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ChapterError::FileRead(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != "txt") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match stem.parse::<ChapterId>() {
                Ok(id) => chapters.push(id),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping file with invalid chapter name");
                }
            }
        }

        chapters.sort();
        tracing::debug!(dir = %self.input_dir.display(), count = chapters.len(), "Chapters found");
        Ok(chapters)
    }

    async fn load(&self, chapter: &ChapterId) -> Result<Chapter, ChapterError> {
        let path = self.chapter_path(chapter);
        let bytes = fs::read(&path)
            .await
            .map_err(|e| ChapterError::FileRead(format!("{}: {}", path.display(), e)))?;

        Chapter::from_bytes(chapter.clone(), bytes)
    }
}
