//! In-memory post collection fed by a single live subscription.

use std::sync::Arc;

use futures::StreamExt;
use metrics::counter;
use tokio::{
    sync::{Mutex, watch},
    task::JoinHandle,
};
use tracing::{info, warn};

use crate::application::repos::{PostDocuments, RepoError, SnapshotStream};
use crate::domain::posts::Post;

/// The collection as last delivered by the subscription.
#[derive(Debug, Clone, Default)]
pub struct PostSnapshot {
    pub posts: Arc<Vec<Post>>,
    /// Becomes true with the first delivered snapshot.
    pub loaded: bool,
}

impl PostSnapshot {
    pub fn find(&self, id: &str) -> Option<&Post> {
        self.posts.iter().find(|post| post.id == id)
    }
}

/// Read side handed to consumers of the store.
#[derive(Debug, Clone)]
pub struct PostStoreHandle {
    receiver: watch::Receiver<PostSnapshot>,
}

impl PostStoreHandle {
    pub fn current(&self) -> PostSnapshot {
        self.receiver.borrow().clone()
    }

    /// Wait for the next replacement of the collection. Returns `None` once the store is
    /// gone.
    pub async fn changed(&mut self) -> Option<PostSnapshot> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }
}

struct ActiveSubscription {
    task: JoinHandle<()>,
}

/// Owner of the one process-wide collection subscription.
pub struct PostStore {
    documents: Arc<dyn PostDocuments>,
    collection: String,
    snapshot: Arc<watch::Sender<PostSnapshot>>,
    subscription: Mutex<Option<ActiveSubscription>>,
}

impl PostStore {
    pub fn new(documents: Arc<dyn PostDocuments>, collection: impl Into<String>) -> Self {
        let (sender, _) = watch::channel(PostSnapshot::default());
        Self {
            documents,
            collection: collection.into(),
            snapshot: Arc::new(sender),
            subscription: Mutex::new(None),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Establish the live subscription unless one is already running.
    ///
    /// Calling this again while subscribed does not open a second stream; it only hands
    /// out another read handle.
    pub async fn subscribe(&self) -> Result<PostStoreHandle, RepoError> {
        let mut active = self.subscription.lock().await;

        let running = active
            .as_ref()
            .is_some_and(|subscription| !subscription.task.is_finished());
        if !running {
            let stream = self
                .documents
                .subscribe_collection(&self.collection)
                .await?;
            let task = tokio::spawn(pump_snapshots(
                stream,
                self.snapshot.clone(),
                self.collection.clone(),
            ));
            *active = Some(ActiveSubscription { task });
            info!(
                target = "postdesk::post_store",
                collection = %self.collection,
                "collection subscription established"
            );
        }

        Ok(self.handle())
    }

    /// Stop receiving updates. The last delivered collection stays readable.
    pub async fn unsubscribe(&self) {
        if let Some(subscription) = self.subscription.lock().await.take() {
            subscription.task.abort();
            info!(
                target = "postdesk::post_store",
                collection = %self.collection,
                "collection subscription released"
            );
        }
    }

    pub async fn is_subscribed(&self) -> bool {
        self.subscription
            .lock()
            .await
            .as_ref()
            .is_some_and(|subscription| !subscription.task.is_finished())
    }

    pub fn handle(&self) -> PostStoreHandle {
        PostStoreHandle {
            receiver: self.snapshot.subscribe(),
        }
    }

    pub fn snapshot(&self) -> PostSnapshot {
        self.snapshot.borrow().clone()
    }
}

impl Drop for PostStore {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.get_mut().take() {
            subscription.task.abort();
        }
    }
}

async fn pump_snapshots(
    mut stream: SnapshotStream,
    snapshot: Arc<watch::Sender<PostSnapshot>>,
    collection: String,
) {
    while let Some(item) = stream.next().await {
        match item {
            Ok(documents) => {
                let posts = documents
                    .into_iter()
                    .map(|stored| stored.post)
                    .collect::<Vec<_>>();
                counter!("postdesk_store_snapshot_total").increment(1);
                snapshot.send_replace(PostSnapshot {
                    posts: Arc::new(posts),
                    loaded: true,
                });
            }
            Err(err) => {
                warn!(
                    target = "postdesk::post_store",
                    collection = %collection,
                    error = %err,
                    "snapshot delivery failed; keeping previous collection"
                );
            }
        }
    }

    info!(
        target = "postdesk::post_store",
        collection = %collection,
        "collection subscription ended"
    );
}
