//! Collaborator contracts: the document database, object storage and auth state.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use thiserror::Error;
use tokio::sync::watch;

use crate::domain::posts::{NewPostDocument, Post, PostMergeUpdate};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("document not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("subscription closed: {0}")]
    Subscription(String),
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// The backing store's own reference to a stored document.
///
/// Handles are resolved by querying on a field and are never cached by callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentHandle {
    pub collection: String,
    pub key: String,
}

impl DocumentHandle {
    pub fn new(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for DocumentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.key)
    }
}

/// Queryable post fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostField {
    Id,
}

impl PostField {
    pub fn as_str(self) -> &'static str {
        match self {
            PostField::Id => "id",
        }
    }
}

/// Equality filter applied by [`PostDocuments::query`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFilter {
    pub field: PostField,
    pub value: String,
}

impl FieldFilter {
    pub fn id_eq(value: impl Into<String>) -> Self {
        Self {
            field: PostField::Id,
            value: value.into(),
        }
    }
}

/// A post together with the handle of the document it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPost {
    pub handle: DocumentHandle,
    pub post: Post,
}

/// Full-collection snapshots delivered by a live subscription.
pub type SnapshotStream = BoxStream<'static, Result<Vec<StoredPost>, RepoError>>;

/// Document database holding blog posts.
///
/// Writes are typed; `createdAt` and `updatedAt` are assigned by the store at write time.
#[async_trait]
pub trait PostDocuments: Send + Sync {
    /// Open a live subscription. The first item is the current collection, every later
    /// item is the full collection after a change.
    async fn subscribe_collection(&self, collection: &str) -> Result<SnapshotStream, RepoError>;

    /// Handles of every document in `collection` matching `filter`, in store order.
    async fn query(
        &self,
        collection: &str,
        filter: &FieldFilter,
    ) -> Result<Vec<DocumentHandle>, RepoError>;

    async fn create(
        &self,
        collection: &str,
        document: NewPostDocument,
    ) -> Result<DocumentHandle, RepoError>;

    async fn merge_update(
        &self,
        handle: &DocumentHandle,
        update: PostMergeUpdate,
    ) -> Result<(), RepoError>;

    async fn delete(&self, handle: &DocumentHandle) -> Result<(), RepoError>;

    async fn health_check(&self) -> Result<(), RepoError>;
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid object path `{0}`")]
    InvalidPath(String),
    #[error("object payload is empty")]
    EmptyPayload,
    #[error("object `{0}` not found")]
    NotFound(String),
    #[error("public url could not be built: {0}")]
    PublicUrl(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Reference to an uploaded object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHandle {
    pub path: String,
}

/// Binary object storage with publicly reachable URLs.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(&self, path: &str, bytes: Bytes) -> Result<ObjectHandle, StorageError>;

    async fn public_url(&self, handle: &ObjectHandle) -> Result<String, StorageError>;
}

/// Authentication state published by the auth collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// The collaborator has not resolved the session yet.
    Pending,
    SignedOut,
    SignedIn { token: String },
}

/// Source of auth-state change events.
pub trait AuthStateSource: Send + Sync {
    fn subscribe(&self) -> watch::Receiver<AuthState>;
}
