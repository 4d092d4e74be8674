//! Chapter Context - Aggregate Root

use super::{ChapterError, ChapterId, Segment, Verse};
use crate::domain::text_segmenter::{segment_chapter, ChunkerConfig};

/// Chapter 聚合根
///
/// 不变量:
/// - 经文顺序与源文件行序一致
/// - 每次运行从源文本重新构建，不做修改
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    id: ChapterId,
    verses: Vec<Verse>,
}

impl Chapter {
    pub fn new(id: ChapterId, verses: Vec<Verse>) -> Self {
        Self { id, verses }
    }

    /// 从"每行一节"的文本构建章节，空行被忽略
    pub fn from_text(id: ChapterId, text: &str) -> Self {
        let verses = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .zip(1u32..)
            .filter_map(|(line, number)| Verse::new(number, line).ok())
            .collect();

        Self { id, verses }
    }

    /// 从原始字节构建章节，非 UTF-8 内容视为分段错误
    pub fn from_bytes(id: ChapterId, bytes: Vec<u8>) -> Result<Self, ChapterError> {
        let text = String::from_utf8(bytes).map_err(|e| ChapterError::InvalidEncoding {
            chapter: id.to_string(),
            reason: e.to_string(),
        })?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
        Ok(Self::from_text(id, text))
    }

    pub fn id(&self) -> &ChapterId {
        &self.id
    }

    pub fn verses(&self) -> &[Verse] {
        &self.verses
    }

    pub fn is_empty(&self) -> bool {
        self.verses.is_empty()
    }

    /// 规范化全文：所有经文的空白分隔词以单个空格连接
    pub fn normalized_text(&self) -> String {
        self.verses
            .iter()
            .flat_map(|v| v.text().split_whitespace())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// 对章节分段
    pub fn segments(&self, config: &ChunkerConfig) -> Vec<Segment> {
        segment_chapter(self, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gen1() -> ChapterId {
        "Gen1".parse().unwrap()
    }

    #[test]
    fn test_from_text_skips_blank_lines() {
        let chapter = Chapter::from_text(gen1(), "Im Anfang.\n\n  Und die Erde.  \r\n");
        assert_eq!(chapter.verses().len(), 2);
        assert_eq!(chapter.verses()[0].number(), 1);
        assert_eq!(chapter.verses()[1].number(), 2);
        assert_eq!(chapter.verses()[1].text(), "Und die Erde.");
    }

    #[test]
    fn test_from_bytes_rejects_invalid_utf8() {
        let result = Chapter::from_bytes(gen1(), vec![0x49, 0x6d, 0xff, 0xfe]);
        assert!(matches!(result, Err(ChapterError::InvalidEncoding { .. })));
    }

    #[test]
    fn test_from_bytes_strips_bom() {
        let mut bytes = "\u{feff}Vers eins.".as_bytes().to_vec();
        bytes.extend_from_slice(b"\nVers zwei.");
        let chapter = Chapter::from_bytes(gen1(), bytes).unwrap();
        assert_eq!(chapter.verses()[0].text(), "Vers eins.");
    }

    #[test]
    fn test_normalized_text_collapses_whitespace() {
        let chapter = Chapter::from_text(gen1(), "a  b\tc\nd   e");
        assert_eq!(chapter.normalized_text(), "a b c d e");
    }
}
