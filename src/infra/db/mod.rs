//! Document store adapters behind [`PostDocuments`](crate::application::repos::PostDocuments).

mod memory;
mod postgres;

pub use memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;

use serde_json::{Map, Value};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::warn;

use crate::application::repos::{DocumentHandle, RepoError, StoredPost};
use crate::domain::{error::DomainError, posts::Post};

pub(crate) const CREATED_AT: &str = "createdAt";
pub(crate) const UPDATED_AT: &str = "updatedAt";

/// Serialize a typed write payload into a JSON object.
pub(crate) fn to_document<T: serde::Serialize>(payload: &T) -> Result<Map<String, Value>, RepoError> {
    match serde_json::to_value(payload).map_err(RepoError::from_persistence)? {
        Value::Object(map) => Ok(map),
        other => Err(RepoError::InvalidInput {
            message: format!("document payload must be an object, got `{other}`"),
        }),
    }
}

pub(crate) fn timestamp_value(at: OffsetDateTime) -> Result<Value, RepoError> {
    at.format(&Rfc3339)
        .map(Value::String)
        .map_err(RepoError::from_persistence)
}

/// Decode stored documents into posts, skipping (and logging) any that do not fit the
/// post shape.
pub(crate) fn decode_snapshot(
    documents: impl IntoIterator<Item = (DocumentHandle, Value)>,
) -> Vec<StoredPost> {
    documents
        .into_iter()
        .filter_map(|(handle, document)| match decode_post(&handle, document) {
            Ok(post) => Some(StoredPost { handle, post }),
            Err(err) => {
                warn!(
                    target = "postdesk::infra::db",
                    document = %handle,
                    error = %err,
                    "skipping malformed document"
                );
                None
            }
        })
        .collect()
}

fn decode_post(handle: &DocumentHandle, document: Value) -> Result<Post, DomainError> {
    serde_json::from_value(document)
        .map_err(|err| DomainError::malformed(handle.to_string(), err.to_string()))
}
