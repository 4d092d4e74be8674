//! Source Adapter - 章节源文件读取

mod file_chapter_source;

pub use file_chapter_source::FileChapterSource;
