use std::sync::Arc;

use tracing::info;

use crate::application::editor::types::WriteError;
use crate::application::repos::{FieldFilter, PostDocuments};

/// Removes every document carrying a post id.
#[derive(Clone)]
pub struct DeleteWorkflow {
    documents: Arc<dyn PostDocuments>,
    collection: String,
}

impl DeleteWorkflow {
    pub fn new(documents: Arc<dyn PostDocuments>, collection: impl Into<String>) -> Self {
        Self {
            documents,
            collection: collection.into(),
        }
    }

    /// Delete all documents whose `id` equals `id` and return how many were removed.
    /// Deletion stops at the first failure; earlier deletions are not rolled back.
    pub async fn delete_matching(&self, id: &str) -> Result<usize, WriteError> {
        let handles = self
            .documents
            .query(&self.collection, &FieldFilter::id_eq(id))
            .await
            .map_err(|source| WriteError::Query {
                id: id.to_string(),
                source,
            })?;

        let mut removed = 0;
        for handle in handles {
            self.documents
                .delete(&handle)
                .await
                .map_err(|source| WriteError::Delete {
                    handle: handle.clone(),
                    source,
                })?;
            removed += 1;
        }

        info!(
            target = "postdesk::editor::delete",
            post_id = %id,
            removed,
            "post deleted"
        );
        Ok(removed)
    }
}
