//! 文本分割器
//!
//! 将章节经文切分为适合朗读的短片段：按空白分词后贪心累积，
//! 超过最大长度前截断，达到最小长度后优先在句末截断。

use super::chapter::{Chapter, Segment, VerseSpan};

/// 默认最小字符数（达到后句末标点触发分割）
pub const DEFAULT_MIN_CHARS: usize = 50;

/// 默认最大字符数
pub const DEFAULT_MAX_CHARS: usize = 100;

/// 分段配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkerConfig {
    /// 最小字符数（句末优先分割的下限）
    pub min_chars: usize,
    /// 最大字符数（单个词超长时例外）
    pub max_chars: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            min_chars: DEFAULT_MIN_CHARS,
            max_chars: DEFAULT_MAX_CHARS,
        }
    }
}

impl ChunkerConfig {
    pub fn new(min_chars: usize, max_chars: usize) -> Self {
        Self {
            min_chars,
            max_chars,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_chars == 0 {
            return Err("max_chars must be greater than 0".to_string());
        }
        if self.min_chars > self.max_chars {
            return Err(format!(
                "min_chars ({}) must not exceed max_chars ({})",
                self.min_chars, self.max_chars
            ));
        }
        Ok(())
    }
}

/// 检查词是否以句末标点结尾（允许后跟引号或括号）
#[inline]
fn ends_sentence(token: &str) -> bool {
    token
        .trim_end_matches(|c: char| {
            matches!(
                c,
                '"' | '\'' | ')' | ']' | '»' | '«' | '\u{201C}' | '\u{201D}' | '\u{2019}'
            )
        })
        .ends_with(['.', '!', '?', ';', ':'])
}

/// 正在累积的片段
struct PendingSegment {
    content: String,
    char_count: usize,
    verses: Option<VerseSpan>,
}

impl PendingSegment {
    fn new() -> Self {
        Self {
            content: String::new(),
            char_count: 0,
            verses: None,
        }
    }

    fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// 追加该词后的长度
    fn len_with(&self, token_chars: usize) -> usize {
        if self.is_empty() {
            token_chars
        } else {
            self.char_count + 1 + token_chars
        }
    }

    fn push(&mut self, token: &str, token_chars: usize, verse: u32) {
        self.char_count = self.len_with(token_chars);
        if !self.content.is_empty() {
            self.content.push(' ');
        }
        self.content.push_str(token);
        match self.verses.as_mut() {
            Some(span) => span.extend_to(verse),
            None => self.verses = Some(VerseSpan::single(verse)),
        }
    }
}

/// 对章节分段
///
/// 分段策略：
/// 1. 每节经文按空白分词，词保留所属经文编号
/// 2. 贪心累积，追加下一个词会超过 max_chars 时先截断
/// 3. 长度达到 min_chars 且当前词以句末标点结尾时截断
/// 4. 单个超长词独立成段（不拆词）
/// 5. 最后一段可以短于 min_chars
pub fn segment_chapter(chapter: &Chapter, config: &ChunkerConfig) -> Vec<Segment> {
    let tokens = chapter
        .verses()
        .iter()
        .flat_map(|v| v.text().split_whitespace().map(move |t| (v.number(), t)));

    let mut segments: Vec<Segment> = Vec::new();
    let mut current = PendingSegment::new();

    let flush = |current: &mut PendingSegment, segments: &mut Vec<Segment>| {
        let done = std::mem::replace(current, PendingSegment::new());
        if let Some(verses) = done.verses {
            let index = segments.len();
            if let Ok(segment) = Segment::new(chapter.id().clone(), index, done.content, verses) {
                segments.push(segment);
            }
        }
    };

    for (verse, token) in tokens {
        let token_chars = token.chars().count();

        if !current.is_empty() && current.len_with(token_chars) > config.max_chars {
            flush(&mut current, &mut segments);
        }

        current.push(token, token_chars, verse);

        if current.char_count >= config.min_chars && ends_sentence(token) {
            flush(&mut current, &mut segments);
        }
    }

    if !current.is_empty() {
        flush(&mut current, &mut segments);
    }

    tracing::debug!(
        chapter = %chapter.id(),
        verses = chapter.verses().len(),
        segments = segments.len(),
        "Chapter segmented"
    );

    segments
}

/// 使用默认配置分段（便捷方法）
pub fn segment_chapter_default(chapter: &Chapter) -> Vec<Segment> {
    segment_chapter(chapter, &ChunkerConfig::default())
}
