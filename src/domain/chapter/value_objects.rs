//! Chapter Context - Value Objects

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ChapterError;

/// 章节标识：书卷缩写 + 章号
///
/// 由文件名主干解析，例如 `Gen1`、`1Kor13`、`Offb22`。
/// 显示形式与文件名主干一致。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChapterId {
    book: String,
    number: u32,
}

impl ChapterId {
    pub fn new(book: impl Into<String>, number: u32) -> Result<Self, ChapterError> {
        let book = book.into();
        let id = format!("{}{}", book, number);
        if number == 0 || !is_valid_book(&book) {
            return Err(ChapterError::InvalidIdentifier(id));
        }
        Ok(Self { book, number })
    }

    pub fn book(&self) -> &str {
        &self.book
    }

    pub fn number(&self) -> u32 {
        self.number
    }
}

/// 书卷缩写：可选的前导数字，后接至少一个 ASCII 字母
fn is_valid_book(book: &str) -> bool {
    let letters = book.trim_start_matches(|c: char| c.is_ascii_digit());
    !letters.is_empty() && letters.chars().all(|c| c.is_ascii_alphabetic())
}

impl FromStr for ChapterId {
    type Err = ChapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ChapterError::InvalidIdentifier(s.to_string());

        let split_at = s
            .char_indices()
            .rev()
            .take_while(|(_, c)| c.is_ascii_digit())
            .last()
            .map(|(i, _)| i)
            .ok_or_else(invalid)?;

        let (book, number) = s.split_at(split_at);
        // 前导零会让显示形式与文件名主干不一致（Gen01 -> Gen1）
        if number.starts_with('0') {
            return Err(invalid());
        }
        let number: u32 = number.parse().map_err(|_| invalid())?;
        Self::new(book, number).map_err(|_| invalid())
    }
}

impl TryFrom<String> for ChapterId {
    type Error = ChapterError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChapterId> for String {
    fn from(id: ChapterId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for ChapterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.book, self.number)
    }
}

/// 三位补零文件名可容纳的片段数；超出后目录列表的字典序不再等于索引顺序
pub const SORTABLE_SEGMENT_LIMIT: usize = 1000;

/// 片段寻址键
///
/// 片段文本文件与音频文件共享同一个键，便于下游（成本估算等）配对。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentKey {
    pub chapter: ChapterId,
    pub index: usize,
}

impl SegmentKey {
    pub fn new(chapter: ChapterId, index: usize) -> Self {
        Self { chapter, index }
    }

    /// 可排序的文件名主干（`000`、`001` ...）
    pub fn file_stem(&self) -> String {
        format!("{:03}", self.index)
    }

    /// 文件名按字典序排列与按索引排列一致
    pub fn sorts_lexically(&self) -> bool {
        self.index < SORTABLE_SEGMENT_LIMIT
    }
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:03}", self.chapter, self.index)
    }
}

/// 片段来源的经文范围（闭区间）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerseSpan {
    pub first: u32,
    pub last: u32,
}

impl VerseSpan {
    pub fn single(verse: u32) -> Self {
        Self {
            first: verse,
            last: verse,
        }
    }

    pub fn extend_to(&mut self, verse: u32) {
        self.last = self.last.max(verse);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_id() {
        let id: ChapterId = "Gen1".parse().unwrap();
        assert_eq!(id.book(), "Gen");
        assert_eq!(id.number(), 1);
        assert_eq!(id.to_string(), "Gen1");
    }

    #[test]
    fn test_parse_numbered_book() {
        let id: ChapterId = "1Kor13".parse().unwrap();
        assert_eq!(id.book(), "1Kor");
        assert_eq!(id.number(), 13);
        assert_eq!(id.to_string(), "1Kor13");
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert!("Gen".parse::<ChapterId>().is_err());
        assert!("42".parse::<ChapterId>().is_err());
        assert!("Gen0".parse::<ChapterId>().is_err());
        assert!("Ge n1".parse::<ChapterId>().is_err());
        assert!("".parse::<ChapterId>().is_err());
    }

    #[test]
    fn test_parse_rejects_leading_zero_number() {
        assert!("Gen01".parse::<ChapterId>().is_err());
        assert!("1Kor013".parse::<ChapterId>().is_err());
        assert_eq!("Gen10".parse::<ChapterId>().unwrap().to_string(), "Gen10");
    }

    #[test]
    fn test_segment_key_file_stem_sorts() {
        let chapter: ChapterId = "Ps119".parse().unwrap();
        let a = SegmentKey::new(chapter.clone(), 9).file_stem();
        let b = SegmentKey::new(chapter, 10).file_stem();
        assert_eq!(a, "009");
        assert!(a < b);
    }

    #[test]
    fn test_segment_key_sortable_limit() {
        let chapter: ChapterId = "Ps119".parse().unwrap();
        let last = SegmentKey::new(chapter.clone(), SORTABLE_SEGMENT_LIMIT - 1);
        let beyond = SegmentKey::new(chapter, SORTABLE_SEGMENT_LIMIT);

        assert_eq!(last.file_stem(), "999");
        assert!(last.sorts_lexically());
        assert_eq!(beyond.file_stem(), "1000");
        assert!(!beyond.sorts_lexically());
        assert!(beyond.file_stem() < last.file_stem());
    }

    #[test]
    fn test_chapter_id_serde_as_string() {
        let id: ChapterId = "Mt5".parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"Mt5\"");
        let back: ChapterId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
