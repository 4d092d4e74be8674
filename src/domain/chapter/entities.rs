//! Chapter Context - Entities

use serde::{Deserialize, Serialize};

use super::{ChapterId, SegmentKey, VerseSpan};

/// 经文 - 章节内的一行
///
/// 不变量:
/// - number 在章节内唯一且递增（从 1 开始，跳过空行）
/// - text 已去除首尾空白且不为空
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verse {
    number: u32,
    text: String,
}

impl Verse {
    pub fn new(number: u32, text: impl Into<String>) -> Result<Self, &'static str> {
        let text = text.into().trim().to_string();
        if text.is_empty() {
            return Err("经文内容不能为空");
        }
        Ok(Self { number, text })
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// 朗读片段 - 最小合成单位
///
/// 不变量:
/// - index 在章节内从 0 开始连续
/// - content 不可为空，只在空白处切分
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    chapter: ChapterId,
    index: usize,
    content: String,
    verses: VerseSpan,
}

impl Segment {
    pub fn new(
        chapter: ChapterId,
        index: usize,
        content: String,
        verses: VerseSpan,
    ) -> Result<Self, &'static str> {
        if content.is_empty() {
            return Err("片段内容不能为空");
        }
        Ok(Self {
            chapter,
            index,
            content,
            verses,
        })
    }

    pub fn chapter(&self) -> &ChapterId {
        &self.chapter
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn verses(&self) -> VerseSpan {
        self.verses
    }

    pub fn char_count(&self) -> usize {
        self.content.chars().count()
    }

    pub fn key(&self) -> SegmentKey {
        SegmentKey::new(self.chapter.clone(), self.index)
    }
}
