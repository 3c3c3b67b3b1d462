use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::application::{
    assets::{AssetUploader, UploadedAsset},
    auth::current_user_token,
    deferred::DeferredTask,
    editor::{
        delete::DeleteWorkflow,
        publish::{PublishWorkflow, VerificationCode},
        state::{EditorState, FieldsInput, PublishOutcome},
        types::EditorError,
    },
    post_store::{PostSnapshot, PostStore, PostStoreHandle},
    repos::{AuthStateSource, PostDocuments, RepoError},
};
use crate::domain::uploads::AssetFolder;

/// Auto-reset delays of the transient indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditorTimings {
    pub success_reset: Duration,
    pub copied_reset: Duration,
}

impl Default for EditorTimings {
    fn default() -> Self {
        Self {
            success_reset: Duration::from_secs(3),
            copied_reset: Duration::from_secs(2),
        }
    }
}

/// The process-wide editor: one operator, one state.
pub struct EditorService {
    state: Arc<Mutex<EditorState>>,
    store: Arc<PostStore>,
    publisher: PublishWorkflow,
    deleter: DeleteWorkflow,
    uploader: AssetUploader,
    auth: Arc<dyn AuthStateSource>,
    code: VerificationCode,
    timings: EditorTimings,
    success_reset: DeferredTask,
    copied_reset: DeferredTask,
}

impl EditorService {
    pub fn new(
        documents: Arc<dyn PostDocuments>,
        store: Arc<PostStore>,
        uploader: AssetUploader,
        auth: Arc<dyn AuthStateSource>,
        code: VerificationCode,
        timings: EditorTimings,
    ) -> Self {
        let collection = store.collection().to_string();
        Self {
            state: Arc::new(Mutex::new(EditorState::default())),
            publisher: PublishWorkflow::new(documents.clone(), collection.clone()),
            deleter: DeleteWorkflow::new(documents, collection),
            store,
            uploader,
            auth,
            code,
            timings,
            success_reset: DeferredTask::new(),
            copied_reset: DeferredTask::new(),
        }
    }

    pub fn store(&self) -> &Arc<PostStore> {
        &self.store
    }

    /// Subscribe to the collection (idempotently) and keep the editor's pending load in
    /// step with every delivered snapshot.
    pub async fn start(&self) -> Result<JoinHandle<()>, RepoError> {
        let handle = self.store.subscribe().await?;
        Ok(tokio::spawn(follow_store(handle, self.state.clone())))
    }

    pub async fn snapshot(&self) -> EditorState {
        self.state.lock().await.clone()
    }

    pub fn posts(&self) -> PostSnapshot {
        self.store.snapshot()
    }

    /// Enter create mode (`None`) or edit mode for `edit_id`.
    pub async fn open(&self, edit_id: Option<String>) -> EditorState {
        let snapshot = self.store.snapshot();
        let mut state = self.state.lock().await;
        state.open(edit_id, &snapshot);
        state.clone()
    }

    pub async fn update_fields(&self, input: FieldsInput) {
        self.state.lock().await.update_fields(input);
    }

    pub async fn upload(
        &self,
        folder: AssetFolder,
        asset: UploadedAsset,
    ) -> Result<String, EditorError> {
        self.state.lock().await.begin_upload(folder)?;

        let result = match self.require_session().await {
            Ok(()) => self
                .uploader
                .upload(asset, folder)
                .await
                .map_err(EditorError::from),
            Err(err) => Err(err),
        };

        let outcome = if result.is_ok() { "stored" } else { "failed" };
        counter!(
            "postdesk_upload_total",
            "folder" => folder.as_str(),
            "outcome" => outcome
        )
        .increment(1);

        let mut state = self.state.lock().await;
        match &result {
            Ok(url) => {
                state.finish_upload(folder, Ok(url.clone()));
                if folder == AssetFolder::Inline {
                    state.clear_copied();
                    self.copied_reset.cancel();
                }
            }
            Err(err) => {
                warn!(
                    target = "postdesk::editor",
                    folder = %folder,
                    error = %err,
                    "upload failed"
                );
                state.finish_upload(folder, Err(err));
            }
        }
        result
    }

    pub async fn reject_upload(&self, folder: AssetFolder, message: String) {
        counter!(
            "postdesk_upload_total",
            "folder" => folder.as_str(),
            "outcome" => "rejected"
        )
        .increment(1);
        self.state.lock().await.reject_upload(folder, message);
    }

    /// Mark the inline image tag as copied and return it. The indicator clears itself.
    pub async fn copy_inline_tag(&self) -> Result<String, EditorError> {
        let tag = {
            let mut state = self.state.lock().await;
            match state.copy_inline_tag() {
                Ok(tag) => tag,
                Err(err) => {
                    state.record_error(&err);
                    return Err(err);
                }
            }
        };

        let state = self.state.clone();
        self.copied_reset
            .schedule(self.timings.copied_reset, async move {
                state.lock().await.clear_copied();
            });
        Ok(tag)
    }

    pub async fn request_publish(&self) -> Result<(), EditorError> {
        let mut state = self.state.lock().await;
        let result = state.request_publish();
        match &result {
            Ok(()) => {
                self.success_reset.cancel();
                let missing = state.fields.missing_required();
                if !missing.is_empty() {
                    debug!(
                        target = "postdesk::editor",
                        missing = ?missing,
                        "publish requested with blank required fields"
                    );
                }
            }
            Err(err) => state.record_error(err),
        }
        result
    }

    pub async fn cancel_publish(&self) {
        self.state.lock().await.cancel_publish();
    }

    /// Verify `code` and, when it matches, write the post.
    pub async fn confirm_publish(&self, code: &str) -> Result<PublishOutcome, EditorError> {
        let accepted = self.code.matches(code);
        let ticket = {
            let mut state = self.state.lock().await;
            match state.begin_publish(accepted) {
                Ok(ticket) => ticket,
                Err(EditorError::InvalidCode) => {
                    counter!("postdesk_publish_total", "outcome" => "rejected_code").increment(1);
                    info!(target = "postdesk::editor", "verification code rejected");
                    return Err(EditorError::InvalidCode);
                }
                Err(err) => {
                    state.record_error(&err);
                    return Err(err);
                }
            }
        };

        let result = match self.require_session().await {
            Ok(()) => self
                .publisher
                .publish(ticket.edit_id.as_deref(), &ticket.fields)
                .await
                .map_err(EditorError::from),
            Err(err) => Err(err),
        };

        {
            let mut state = self.state.lock().await;
            state.finish_publish(result.as_ref());
        }

        match &result {
            Ok(outcome) => {
                let label = match outcome {
                    PublishOutcome::Created { .. } => "created",
                    PublishOutcome::Updated { .. } => "updated",
                };
                counter!("postdesk_publish_total", "outcome" => label).increment(1);

                let state = self.state.clone();
                self.success_reset
                    .schedule(self.timings.success_reset, async move {
                        state.lock().await.clear_success();
                    });
            }
            Err(err) => {
                counter!("postdesk_publish_total", "outcome" => "failed").increment(1);
                warn!(
                    target = "postdesk::editor",
                    error = %err,
                    "publish failed"
                );
            }
        }
        result
    }

    pub async fn request_delete(&self, id: String) -> Result<(), EditorError> {
        let mut state = self.state.lock().await;
        let result = state.request_delete(id);
        if let Err(err) = &result {
            state.record_error(err);
        }
        result
    }

    pub async fn cancel_delete(&self) {
        self.state.lock().await.cancel_delete();
    }

    pub async fn confirm_delete(&self) -> Result<usize, EditorError> {
        let target = {
            let mut state = self.state.lock().await;
            match state.begin_delete() {
                Ok(target) => target,
                Err(err) => {
                    state.record_error(&err);
                    return Err(err);
                }
            }
        };

        let result = match self.require_session().await {
            Ok(()) => self
                .deleter
                .delete_matching(&target)
                .await
                .map_err(EditorError::from),
            Err(err) => Err(err),
        };

        self.state.lock().await.finish_delete(result.as_ref().copied());

        match &result {
            Ok(_) => counter!("postdesk_delete_total", "outcome" => "deleted").increment(1),
            Err(err) => {
                counter!("postdesk_delete_total", "outcome" => "failed").increment(1);
                warn!(
                    target = "postdesk::editor",
                    post_id = %target,
                    error = %err,
                    "delete failed"
                );
            }
        }
        result
    }

    pub async fn dismiss_error(&self) {
        self.state.lock().await.dismiss_error();
    }

    async fn require_session(&self) -> Result<(), EditorError> {
        current_user_token(self.auth.as_ref())
            .await
            .map(|_| ())
            .ok_or(EditorError::AuthTokenUnavailable)
    }
}

async fn follow_store(mut handle: PostStoreHandle, state: Arc<Mutex<EditorState>>) {
    state.lock().await.apply_snapshot(&handle.current());
    while let Some(snapshot) = handle.changed().await {
        state.lock().await.apply_snapshot(&snapshot);
    }
}
