//! Command-line interface for versevox
//!
//! 使用 clap derive 解析命令行参数

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::domain::chapter::ChapterId;

/// Chapter-wise speech synthesis
#[derive(Parser, Debug)]
#[command(
    name = "versevox",
    version,
    about = "Split scripture chapters into segments and synthesize them over a streaming speech service"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Verbose output (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// 章节过滤
#[derive(Args, Debug, Clone, Default)]
pub struct ChapterFilter {
    /// Only process these chapters (e.g. Gen1); repeatable
    #[arg(long = "chapter", value_name = "CHAPTER")]
    pub chapters: Vec<ChapterId>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Split chapter text files into segment files
    Split(ChapterFilter),

    /// Synthesize every segment that has no audio yet
    Synthesize(ChapterFilter),

    /// Check audio completeness per chapter
    Verify(ChapterFilter),

    /// Split, synthesize and verify in one go
    Run(ChapterFilter),

    /// Delete audio for a chapter so it is regenerated on the next run
    Reset {
        /// Chapter whose audio is deleted
        #[arg(value_name = "CHAPTER")]
        chapter: ChapterId,

        /// Only delete these segment indices; repeatable
        #[arg(long = "index", value_name = "INDEX")]
        indices: Vec<usize>,
    },
}

impl Cli {
    /// 由 -v 推导日志级别，未指定时返回 None
    pub fn log_level_override(&self) -> Option<&'static str> {
        match self.verbose {
            0 => None,
            1 => Some("debug"),
            _ => Some("trace"),
        }
    }
}
