use std::collections::HashMap;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_stream::stream;
use async_trait::async_trait;
use serde_json::{Map, Value};
use time::OffsetDateTime;
use tokio::sync::{RwLock, broadcast};
use tracing::debug;

use crate::application::repos::{
    DocumentHandle, FieldFilter, PostDocuments, RepoError, SnapshotStream,
};
use crate::domain::posts::{NewPostDocument, PostMergeUpdate};

use super::{CREATED_AT, UPDATED_AT, decode_snapshot, timestamp_value, to_document};

const CHANGE_CAPACITY: usize = 64;

#[derive(Debug, Default)]
struct Collections {
    next_key: u64,
    /// Documents per collection, in insertion order.
    documents: HashMap<String, Vec<(String, Map<String, Value>)>>,
}

impl Collections {
    fn snapshot(&self, collection: &str) -> Vec<(DocumentHandle, Value)> {
        self.documents
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .map(|(key, document)| {
                        (
                            DocumentHandle::new(collection, key.clone()),
                            Value::Object(document.clone()),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn find_mut(&mut self, handle: &DocumentHandle) -> Option<&mut Map<String, Value>> {
        self.documents
            .get_mut(&handle.collection)?
            .iter_mut()
            .find(|(key, _)| *key == handle.key)
            .map(|(_, document)| document)
    }
}

/// Process-local document store with change broadcast.
#[derive(Clone)]
pub struct InMemoryDocumentStore {
    collections: Arc<RwLock<Collections>>,
    changes: broadcast::Sender<String>,
    open_streams: Arc<AtomicUsize>,
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            collections: Arc::new(RwLock::new(Collections::default())),
            changes,
            open_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of live collection subscriptions.
    pub fn open_subscriptions(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    /// Insert an arbitrary document as-is, bypassing the typed write path.
    pub async fn insert_document(
        &self,
        collection: &str,
        document: Value,
    ) -> Result<DocumentHandle, RepoError> {
        let Value::Object(document) = document else {
            return Err(RepoError::InvalidInput {
                message: "document must be a JSON object".to_string(),
            });
        };
        Ok(self.insert(collection, document).await)
    }

    async fn insert(&self, collection: &str, document: Map<String, Value>) -> DocumentHandle {
        let handle = {
            let mut collections = self.collections.write().await;
            collections.next_key += 1;
            let key = format!("doc-{:06}", collections.next_key);
            collections
                .documents
                .entry(collection.to_string())
                .or_default()
                .push((key.clone(), document));
            DocumentHandle::new(collection, key)
        };
        self.notify(collection);
        handle
    }

    fn notify(&self, collection: &str) {
        // No receivers simply means nobody is subscribed.
        let _ = self.changes.send(collection.to_string());
    }
}

struct StreamGuard(Arc<AtomicUsize>);

impl StreamGuard {
    fn open(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PostDocuments for InMemoryDocumentStore {
    async fn subscribe_collection(&self, collection: &str) -> Result<SnapshotStream, RepoError> {
        let mut changes = self.changes.subscribe();
        let collections = self.collections.clone();
        let collection = collection.to_string();
        let guard = StreamGuard::open(&self.open_streams);

        let stream = stream! {
            let _guard = guard;
            let initial = collections.read().await.snapshot(&collection);
            yield Ok(decode_snapshot(initial));

            loop {
                match changes.recv().await {
                    Ok(changed) if changed != collection => continue,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        let current = collections.read().await.snapshot(&collection);
                        yield Ok(decode_snapshot(current));
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        };

        Ok(Box::pin(stream))
    }

    async fn query(
        &self,
        collection: &str,
        filter: &FieldFilter,
    ) -> Result<Vec<DocumentHandle>, RepoError> {
        let collections = self.collections.read().await;
        let expected = Value::String(filter.value.clone());
        Ok(collections
            .documents
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|(_, document)| document.get(filter.field.as_str()) == Some(&expected))
                    .map(|(key, _)| DocumentHandle::new(collection, key.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create(
        &self,
        collection: &str,
        document: NewPostDocument,
    ) -> Result<DocumentHandle, RepoError> {
        let mut document = to_document(&document)?;
        let now = timestamp_value(OffsetDateTime::now_utc())?;
        document.insert(CREATED_AT.to_string(), now.clone());
        document.insert(UPDATED_AT.to_string(), now);

        let handle = self.insert(collection, document).await;
        debug!(target = "postdesk::infra::db::memory", document = %handle, "document created");
        Ok(handle)
    }

    async fn merge_update(
        &self,
        handle: &DocumentHandle,
        update: PostMergeUpdate,
    ) -> Result<(), RepoError> {
        let fields = to_document(&update)?;
        let now = timestamp_value(OffsetDateTime::now_utc())?;
        {
            let mut collections = self.collections.write().await;
            let document = collections.find_mut(handle).ok_or(RepoError::NotFound)?;
            document.extend(fields);
            document.insert(UPDATED_AT.to_string(), now);
        }
        self.notify(&handle.collection);
        Ok(())
    }

    async fn delete(&self, handle: &DocumentHandle) -> Result<(), RepoError> {
        let removed = {
            let mut collections = self.collections.write().await;
            match collections.documents.get_mut(&handle.collection) {
                Some(documents) => {
                    let before = documents.len();
                    documents.retain(|(key, _)| *key != handle.key);
                    before != documents.len()
                }
                None => false,
            }
        };
        if removed {
            self.notify(&handle.collection);
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}
