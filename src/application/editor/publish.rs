//! The publish workflow: verification and the create/update branches.

use std::fmt;
use std::sync::Arc;

use subtle::ConstantTimeEq;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::editor::state::PublishOutcome;
use crate::application::editor::types::WriteError;
use crate::application::repos::{FieldFilter, PostDocuments};
use crate::domain::posts::{NewPostDocument, PostFields, PostMergeUpdate};

const MAX_ID_ATTEMPTS: usize = 4;

/// The deployment-configured code that gates every publish.
#[derive(Clone)]
pub struct VerificationCode(String);

impl VerificationCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Exact, constant-time comparison against the configured code.
    pub fn matches(&self, candidate: &str) -> bool {
        candidate.as_bytes().ct_eq(self.0.as_bytes()).into()
    }
}

impl fmt::Debug for VerificationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VerificationCode(..)")
    }
}

#[derive(Clone)]
pub struct PublishWorkflow {
    documents: Arc<dyn PostDocuments>,
    collection: String,
}

impl PublishWorkflow {
    pub fn new(documents: Arc<dyn PostDocuments>, collection: impl Into<String>) -> Self {
        Self {
            documents,
            collection: collection.into(),
        }
    }

    /// Write `fields` as a published post: merged onto the first document matching
    /// `edit_id` in edit mode, created under a fresh id otherwise.
    pub async fn publish(
        &self,
        edit_id: Option<&str>,
        fields: &PostFields,
    ) -> Result<PublishOutcome, WriteError> {
        match edit_id {
            Some(id) => self.update(id, fields).await,
            None => self.create(fields).await,
        }
    }

    async fn update(&self, id: &str, fields: &PostFields) -> Result<PublishOutcome, WriteError> {
        let handles = self
            .documents
            .query(&self.collection, &FieldFilter::id_eq(id))
            .await
            .map_err(|source| WriteError::Query {
                id: id.to_string(),
                source,
            })?;

        if handles.len() > 1 {
            warn!(
                target = "postdesk::editor::publish",
                post_id = %id,
                matches = handles.len(),
                "several documents share this id; updating the first"
            );
        }
        let handle = handles
            .into_iter()
            .next()
            .ok_or_else(|| WriteError::MissingTarget { id: id.to_string() })?;

        self.documents
            .merge_update(&handle, PostMergeUpdate::publish(fields))
            .await
            .map_err(|source| WriteError::Update {
                handle: handle.clone(),
                source,
            })?;

        info!(
            target = "postdesk::editor::publish",
            post_id = %id,
            document = %handle,
            "post updated"
        );
        Ok(PublishOutcome::Updated { id: id.to_string() })
    }

    async fn create(&self, fields: &PostFields) -> Result<PublishOutcome, WriteError> {
        let id = self.allocate_id().await?;
        let handle = self
            .documents
            .create(&self.collection, NewPostDocument::publish(id.clone(), fields))
            .await
            .map_err(|source| WriteError::Create { source })?;

        info!(
            target = "postdesk::editor::publish",
            post_id = %id,
            document = %handle,
            slug = %fields.slug,
            "post created"
        );
        Ok(PublishOutcome::Created { id })
    }

    async fn allocate_id(&self) -> Result<String, WriteError> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let candidate = Uuid::new_v4().to_string();
            let taken = self
                .documents
                .query(&self.collection, &FieldFilter::id_eq(candidate.clone()))
                .await
                .map_err(|source| WriteError::Query {
                    id: candidate.clone(),
                    source,
                })?;
            if taken.is_empty() {
                return Ok(candidate);
            }
        }
        Err(WriteError::IdExhausted)
    }
}
