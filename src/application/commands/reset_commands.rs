//! Reset Commands - 删除音频以便重新生成

use crate::domain::chapter::ChapterId;

/// 删除指定片段的音频；indices 为空时删除整章音频
#[derive(Debug, Clone)]
pub struct ResetArtifacts {
    pub chapter: ChapterId,
    pub indices: Vec<usize>,
}

/// 重置响应
#[derive(Debug, Clone)]
pub struct ResetArtifactsResponse {
    pub chapter: ChapterId,
    pub deleted: Vec<usize>,
}
