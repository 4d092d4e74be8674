//! Reset Command Handlers

use std::sync::Arc;

use crate::application::commands::{ResetArtifacts, ResetArtifactsResponse};
use crate::application::error::ApplicationError;
use crate::application::ports::ArtifactStorePort;
use crate::domain::chapter::SegmentKey;

/// ResetArtifacts Handler - 删除音频，下次合成时只重新生成这些片段
pub struct ResetArtifactsHandler {
    artifact_store: Arc<dyn ArtifactStorePort>,
}

impl ResetArtifactsHandler {
    pub fn new(artifact_store: Arc<dyn ArtifactStorePort>) -> Self {
        Self { artifact_store }
    }

    pub async fn handle(
        &self,
        command: ResetArtifacts,
    ) -> Result<ResetArtifactsResponse, ApplicationError> {
        let indices = if command.indices.is_empty() {
            self.artifact_store.list_indices(&command.chapter).await?
        } else {
            command.indices
        };

        let mut deleted = Vec::new();
        for index in indices {
            let key = SegmentKey::new(command.chapter.clone(), index);
            if self.artifact_store.delete(&key).await? {
                deleted.push(index);
            }
        }

        tracing::info!(
            chapter = %command.chapter,
            deleted = deleted.len(),
            "Artifacts reset"
        );

        Ok(ResetArtifactsResponse {
            chapter: command.chapter,
            deleted,
        })
    }
}
