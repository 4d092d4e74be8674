//! Chapter Context - 章节限界上下文
//!
//! 职责:
//! - 章节聚合（经文按行有序）
//! - 朗读片段实体
//! - 片段寻址键 (chapter, index)

mod aggregate;
mod entities;
mod errors;
mod value_objects;

pub use aggregate::Chapter;
pub use entities::{Segment, Verse};
pub use errors::ChapterError;
pub use value_objects::{ChapterId, SegmentKey, VerseSpan, SORTABLE_SEGMENT_LIMIT};
