//! Editor state and its transitions.
//!
//! Everything here is synchronous; the service drives the collaborator calls between
//! the `begin_*` and `finish_*` halves of each workflow.

use url::form_urlencoded;

use crate::application::editor::types::EditorError;
use crate::application::post_store::PostSnapshot;
use crate::domain::posts::PostFields;
use crate::domain::slug::derive_slug;
use crate::domain::uploads::{AssetFolder, inline_image_tag};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UploadStatus {
    #[default]
    Idle,
    Uploading,
    Failed(String),
}

impl UploadStatus {
    pub fn is_uploading(&self) -> bool {
        matches!(self, UploadStatus::Uploading)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublishPhase {
    #[default]
    Idle,
    /// The verification dialog is open.
    ConfirmPending,
    Publishing,
    /// Shown until the success reset fires.
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeletePhase {
    #[default]
    Idle,
    ConfirmPending {
        target: String,
    },
    Deleting {
        target: String,
    },
}

/// Text fields submitted by the editor form. The main image is only ever set by an upload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldsInput {
    pub title: String,
    pub slug: String,
    pub category: String,
    pub excerpt: String,
    pub html_content: String,
}

/// Values captured when a publish is confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishTicket {
    pub edit_id: Option<String>,
    pub fields: PostFields,
}

/// Which branch a successful publish took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Created { id: String },
    Updated { id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorState {
    pub fields: PostFields,
    pub edit_id: Option<String>,
    pending_load: bool,
    pub main_upload: UploadStatus,
    pub inline_upload: UploadStatus,
    pub inline_image_link: Option<String>,
    /// Tag most recently copied; cleared by the copied reset.
    pub copied_tag: Option<String>,
    pub publish: PublishPhase,
    pub code_rejected: bool,
    pub delete: DeletePhase,
    pub error: Option<String>,
}

impl Default for EditorState {
    fn default() -> Self {
        Self {
            fields: PostFields::default(),
            edit_id: None,
            pending_load: false,
            main_upload: UploadStatus::Idle,
            inline_upload: UploadStatus::Idle,
            inline_image_link: None,
            copied_tag: None,
            publish: PublishPhase::Idle,
            code_rejected: false,
            delete: DeletePhase::Idle,
            error: None,
        }
    }
}

impl EditorState {
    pub fn is_edit_mode(&self) -> bool {
        self.edit_id.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.pending_load
    }

    pub fn dialog_open(&self) -> bool {
        self.publish == PublishPhase::ConfirmPending
    }

    pub fn publish_success(&self) -> bool {
        self.publish == PublishPhase::Success
    }

    /// Page location that reproduces the current mode.
    pub fn location(&self) -> String {
        match &self.edit_id {
            Some(id) => {
                let encoded: String = form_urlencoded::byte_serialize(id.as_bytes()).collect();
                format!("/?id={encoded}")
            }
            None => "/".to_string(),
        }
    }

    /// Switch between create and edit mode.
    ///
    /// A new edit id schedules a one-time load from the collection; reopening the id
    /// already being edited keeps the operator's unsaved changes. Leaving edit mode does
    /// not touch the fields.
    pub fn open(&mut self, edit_id: Option<String>, snapshot: &PostSnapshot) {
        let edit_id = edit_id.filter(|id| !id.is_empty());
        if edit_id != self.edit_id {
            self.pending_load = edit_id.is_some();
            self.edit_id = edit_id;
        }
        self.apply_snapshot(snapshot);
    }

    /// Load the post being edited once it appears in the collection.
    pub fn apply_snapshot(&mut self, snapshot: &PostSnapshot) {
        if !self.pending_load {
            return;
        }
        let Some(edit_id) = self.edit_id.as_deref() else {
            self.pending_load = false;
            return;
        };
        if let Some(post) = snapshot.find(edit_id) {
            self.fields = post.fields();
            self.pending_load = false;
        }
    }

    /// Apply a form submission. A changed title re-derives the slug and overrides any
    /// slug submitted alongside it.
    pub fn update_fields(&mut self, input: FieldsInput) {
        let slug = if input.title != self.fields.title {
            derive_slug(&input.title)
        } else {
            input.slug
        };
        self.fields.title = input.title;
        self.fields.slug = slug;
        self.fields.category = input.category;
        self.fields.excerpt = input.excerpt;
        self.fields.html_content = input.html_content;
    }

    fn upload_slot(&mut self, folder: AssetFolder) -> &mut UploadStatus {
        match folder {
            AssetFolder::Main => &mut self.main_upload,
            AssetFolder::Inline => &mut self.inline_upload,
        }
    }

    pub fn begin_upload(&mut self, folder: AssetFolder) -> Result<(), EditorError> {
        let slot = self.upload_slot(folder);
        if slot.is_uploading() {
            return Err(EditorError::UploadBusy);
        }
        *slot = UploadStatus::Uploading;
        Ok(())
    }

    pub fn finish_upload(&mut self, folder: AssetFolder, result: Result<String, &EditorError>) {
        match result {
            Ok(url) => {
                *self.upload_slot(folder) = UploadStatus::Idle;
                match folder {
                    AssetFolder::Main => self.fields.main_image = Some(url),
                    AssetFolder::Inline => self.inline_image_link = Some(url),
                }
            }
            Err(err) => {
                *self.upload_slot(folder) = UploadStatus::Failed(err.operator_message());
            }
        }
    }

    /// Fail a slot before any upload started, e.g. for an unreadable form payload.
    pub fn reject_upload(&mut self, folder: AssetFolder, message: String) {
        let slot = self.upload_slot(folder);
        if !slot.is_uploading() {
            *slot = UploadStatus::Failed(message);
        }
    }

    /// The image tag for the current inline link, marked as copied.
    pub fn copy_inline_tag(&mut self) -> Result<String, EditorError> {
        let link = self
            .inline_image_link
            .as_deref()
            .ok_or(EditorError::NothingToCopy)?;
        let tag = inline_image_tag(link);
        self.copied_tag = Some(tag.clone());
        Ok(tag)
    }

    pub fn clear_copied(&mut self) {
        self.copied_tag = None;
    }

    pub fn request_publish(&mut self) -> Result<(), EditorError> {
        if self.publish == PublishPhase::Publishing {
            return Err(EditorError::PublishBusy);
        }
        self.publish = PublishPhase::ConfirmPending;
        self.code_rejected = false;
        Ok(())
    }

    pub fn cancel_publish(&mut self) {
        if self.publish == PublishPhase::ConfirmPending {
            self.publish = PublishPhase::Idle;
            self.code_rejected = false;
        }
    }

    /// Close the dialog and start writing when `code_accepted`; otherwise keep the dialog
    /// open with the rejection flag set.
    pub fn begin_publish(&mut self, code_accepted: bool) -> Result<PublishTicket, EditorError> {
        match self.publish {
            PublishPhase::ConfirmPending => {}
            PublishPhase::Publishing => return Err(EditorError::PublishBusy),
            PublishPhase::Idle | PublishPhase::Success => {
                return Err(EditorError::NotAwaitingConfirmation);
            }
        }
        if !code_accepted {
            self.code_rejected = true;
            return Err(EditorError::InvalidCode);
        }

        self.code_rejected = false;
        self.publish = PublishPhase::Publishing;
        Ok(PublishTicket {
            edit_id: self.edit_id.clone(),
            fields: self.fields.clone(),
        })
    }

    /// Record the publish result. A created post clears the draft; either success leaves
    /// edit mode for the listing.
    pub fn finish_publish(&mut self, result: Result<&PublishOutcome, &EditorError>) {
        match result {
            Ok(outcome) => {
                if matches!(outcome, PublishOutcome::Created { .. }) {
                    self.fields = PostFields::default();
                }
                self.publish = PublishPhase::Success;
                self.edit_id = None;
                self.pending_load = false;
                self.error = None;
            }
            Err(err) => {
                self.publish = PublishPhase::Idle;
                self.error = Some(err.operator_message());
            }
        }
    }

    pub fn clear_success(&mut self) {
        if self.publish == PublishPhase::Success {
            self.publish = PublishPhase::Idle;
        }
    }

    pub fn request_delete(&mut self, target: String) -> Result<(), EditorError> {
        if matches!(self.delete, DeletePhase::Deleting { .. }) {
            return Err(EditorError::DeleteBusy);
        }
        self.delete = DeletePhase::ConfirmPending { target };
        Ok(())
    }

    pub fn cancel_delete(&mut self) {
        if matches!(self.delete, DeletePhase::ConfirmPending { .. }) {
            self.delete = DeletePhase::Idle;
        }
    }

    pub fn begin_delete(&mut self) -> Result<String, EditorError> {
        match std::mem::take(&mut self.delete) {
            DeletePhase::ConfirmPending { target } => {
                self.delete = DeletePhase::Deleting {
                    target: target.clone(),
                };
                Ok(target)
            }
            other @ DeletePhase::Deleting { .. } => {
                self.delete = other;
                Err(EditorError::DeleteBusy)
            }
            DeletePhase::Idle => Err(EditorError::NoDeletePending),
        }
    }

    pub fn finish_delete(&mut self, result: Result<usize, &EditorError>) {
        self.delete = DeletePhase::Idle;
        if let Err(err) = result {
            self.error = Some(err.operator_message());
        }
    }

    pub fn record_error(&mut self, err: &EditorError) {
        self.error = Some(err.operator_message());
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::posts::Post;

    fn snapshot_with(posts: Vec<Post>) -> PostSnapshot {
        PostSnapshot {
            posts: Arc::new(posts),
            loaded: true,
        }
    }

    fn stored(id: &str, title: &str) -> Post {
        Post {
            id: id.into(),
            title: title.into(),
            slug: "kept-slug".into(),
            category: "Notes".into(),
            excerpt: "Short".into(),
            main_image: Some("https://cdn.example/a.png".into()),
            html_content: "<p>a</p>".into(),
            created_at: None,
            updated_at: None,
            published: true,
        }
    }

    fn input(title: &str, slug: &str) -> FieldsInput {
        FieldsInput {
            title: title.into(),
            slug: slug.into(),
            category: "Notes".into(),
            excerpt: String::new(),
            html_content: "<p>x</p>".into(),
        }
    }

    #[test]
    fn title_change_rederives_slug() {
        let mut state = EditorState::default();
        state.update_fields(input("Zażółć gęślą", "ignored"));
        assert_eq!(state.fields.slug, "zazoc-gesla");
    }

    #[test]
    fn slug_edit_without_title_change_is_kept() {
        let mut state = EditorState::default();
        state.update_fields(input("Hello", ""));
        state.update_fields(input("Hello", "custom-slug"));
        assert_eq!(state.fields.slug, "custom-slug");
    }

    #[test]
    fn edit_mode_loads_once_and_keeps_stored_slug() {
        let mut state = EditorState::default();
        state.open(Some("abc".into()), &PostSnapshot::default());
        assert!(state.is_loading());

        state.apply_snapshot(&snapshot_with(vec![stored("abc", "Original")]));
        assert!(!state.is_loading());
        assert_eq!(state.fields.slug, "kept-slug");

        state.update_fields(input("Changed", "x"));
        state.apply_snapshot(&snapshot_with(vec![stored("abc", "Original")]));
        assert_eq!(state.fields.title, "Changed");

        state.open(Some("abc".into()), &snapshot_with(vec![stored("abc", "Original")]));
        assert_eq!(state.fields.title, "Changed");
    }

    #[test]
    fn empty_edit_id_means_create_mode() {
        let mut state = EditorState::default();
        state.open(Some(String::new()), &PostSnapshot::default());
        assert!(!state.is_edit_mode());
        assert_eq!(state.location(), "/");
    }

    #[test]
    fn location_encodes_edit_id() {
        let mut state = EditorState::default();
        state.open(Some("a b&c".into()), &PostSnapshot::default());
        assert_eq!(state.location(), "/?id=a+b%26c");
    }

    #[test]
    fn rejected_code_keeps_dialog_open() {
        let mut state = EditorState::default();
        state.request_publish().expect("open dialog");

        let err = state.begin_publish(false).expect_err("rejected");
        assert!(matches!(err, EditorError::InvalidCode));
        assert!(state.dialog_open());
        assert!(state.code_rejected);

        state.cancel_publish();
        assert_eq!(state.publish, PublishPhase::Idle);
        assert!(!state.code_rejected);
    }

    #[test]
    fn confirm_without_dialog_is_refused() {
        let mut state = EditorState::default();
        let err = state.begin_publish(true).expect_err("no dialog");
        assert!(matches!(err, EditorError::NotAwaitingConfirmation));
    }

    #[test]
    fn created_post_clears_draft_but_update_keeps_it() {
        let mut state = EditorState::default();
        state.update_fields(input("Draft", ""));
        state.request_publish().expect("dialog");
        state.begin_publish(true).expect("ticket");
        state.finish_publish(Ok(&PublishOutcome::Created { id: "n".into() }));
        assert_eq!(state.fields, PostFields::default());
        assert!(state.publish_success());

        state.open(Some("abc".into()), &snapshot_with(vec![stored("abc", "Original")]));
        state.request_publish().expect("dialog");
        state.begin_publish(true).expect("ticket");
        state.finish_publish(Ok(&PublishOutcome::Updated { id: "abc".into() }));
        assert_eq!(state.fields.title, "Original");
        assert!(!state.is_edit_mode());

        state.clear_success();
        assert_eq!(state.publish, PublishPhase::Idle);
    }

    #[test]
    fn delete_needs_confirmation() {
        let mut state = EditorState::default();
        assert!(matches!(
            state.begin_delete(),
            Err(EditorError::NoDeletePending)
        ));

        state.request_delete("abc".into()).expect("request");
        assert_eq!(state.begin_delete().expect("target"), "abc");
        assert!(matches!(state.begin_delete(), Err(EditorError::DeleteBusy)));

        state.finish_delete(Ok(1));
        assert_eq!(state.delete, DeletePhase::Idle);
    }

    #[test]
    fn copy_requires_inline_link() {
        let mut state = EditorState::default();
        assert!(matches!(
            state.copy_inline_tag(),
            Err(EditorError::NothingToCopy)
        ));

        state.inline_image_link = Some("https://cdn.example/i.png".into());
        let tag = state.copy_inline_tag().expect("tag");
        assert!(tag.contains("https://cdn.example/i.png"));
        assert_eq!(state.copied_tag.as_deref(), Some(tag.as_str()));
    }
}
