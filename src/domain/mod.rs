//! Domain Layer - 领域层
//!
//! 限界上下文:
//! - Chapter Context: 章节、经文与朗读片段

pub mod chapter;

// 章节分段器
mod text_segmenter;

pub use text_segmenter::{segment_chapter, segment_chapter_default, ChunkerConfig};
