use askama::Template;
use time::{Month, OffsetDateTime};
use url::Url;

use crate::application::editor::{DeletePhase, EditorState, PublishPhase, UploadStatus};
use crate::application::post_store::PostSnapshot;
use crate::domain::posts::Post;

const PREVIEW_TITLE_PLACEHOLDER: &str = "Tytuł wpisu pojawi się tutaj...";

#[derive(Clone)]
pub struct AdminChrome {
    pub title: String,
    pub description: String,
    pub signed_in: bool,
}

impl Default for AdminChrome {
    fn default() -> Self {
        Self {
            title: "Edytor bloga".to_string(),
            description: "Tworzenie, podgląd i publikacja wpisów.".to_string(),
            signed_in: false,
        }
    }
}

#[derive(Clone)]
pub struct AdminLayout<T> {
    pub chrome: AdminChrome,
    pub asset_version: String,
    pub content: T,
}

impl<T> AdminLayout<T> {
    pub fn new(chrome: AdminChrome, content: T) -> Self {
        Self {
            chrome,
            asset_version: env!("CARGO_PKG_VERSION").to_string(),
            content,
        }
    }
}

#[derive(Clone)]
pub struct EditorFieldsView {
    pub title: String,
    pub slug: String,
    pub category: String,
    pub excerpt: String,
    pub html_content: String,
    pub main_image: Option<String>,
}

#[derive(Clone)]
pub struct UploadSlotView {
    pub uploading: bool,
    pub error: Option<String>,
}

impl From<&UploadStatus> for UploadSlotView {
    fn from(status: &UploadStatus) -> Self {
        match status {
            UploadStatus::Idle => Self {
                uploading: false,
                error: None,
            },
            UploadStatus::Uploading => Self {
                uploading: true,
                error: None,
            },
            UploadStatus::Failed(message) => Self {
                uploading: false,
                error: Some(message.clone()),
            },
        }
    }
}

#[derive(Clone)]
pub struct InlineImageView {
    pub url: String,
    pub tag: String,
    pub copied: bool,
}

/// The post rendered the way the public blog shows it.
#[derive(Clone)]
pub struct PreviewView {
    pub title: String,
    pub has_title: bool,
    pub category: String,
    pub date_label: String,
    pub main_image: Option<String>,
    /// Sanitized body markup; `None` while the body is empty.
    pub body_html: Option<String>,
}

#[derive(Clone)]
pub struct PublishView {
    pub publishing: bool,
    pub success: bool,
    pub dialog_open: bool,
    pub code_rejected: bool,
    pub missing_required: bool,
}

#[derive(Clone)]
pub struct DeleteDialogView {
    pub target: String,
    pub title: Option<String>,
    pub deleting: bool,
}

#[derive(Clone)]
pub struct PostRowView {
    pub id: String,
    pub title: String,
    pub category: String,
    pub date_label: String,
    pub edit_href: String,
    pub delete_action: String,
    pub is_editing: bool,
}

#[derive(Clone)]
pub struct EditorPageView {
    pub heading: &'static str,
    pub edit_id: Option<String>,
    pub loading: bool,
    pub fields: EditorFieldsView,
    pub main_upload: UploadSlotView,
    pub inline_upload: UploadSlotView,
    pub inline_image: Option<InlineImageView>,
    pub preview: PreviewView,
    pub publish: PublishView,
    pub delete_dialog: Option<DeleteDialogView>,
    pub error: Option<String>,
    pub posts_loaded: bool,
    pub posts: Vec<PostRowView>,
}

impl EditorPageView {
    pub fn build(state: &EditorState, posts: &PostSnapshot, today: OffsetDateTime) -> Self {
        let fields = &state.fields;

        let inline_image = state.inline_image_link.as_ref().map(|url| {
            let tag = crate::domain::uploads::inline_image_tag(url);
            InlineImageView {
                copied: state.copied_tag.as_deref() == Some(tag.as_str()),
                url: url.clone(),
                tag,
            }
        });

        let preview = PreviewView {
            has_title: !fields.title.is_empty(),
            title: if fields.title.is_empty() {
                PREVIEW_TITLE_PLACEHOLDER.to_string()
            } else {
                fields.title.clone()
            },
            category: fields.category.clone(),
            date_label: format_date(today),
            main_image: fields.main_image.clone(),
            body_html: (!fields.html_content.is_empty())
                .then(|| sanitize_preview(&fields.html_content)),
        };

        let publish = PublishView {
            publishing: state.publish == PublishPhase::Publishing,
            success: state.publish_success(),
            dialog_open: state.dialog_open(),
            code_rejected: state.code_rejected,
            missing_required: !fields.missing_required().is_empty(),
        };

        let delete_dialog = match &state.delete {
            DeletePhase::Idle => None,
            DeletePhase::ConfirmPending { target } => Some((target, false)),
            DeletePhase::Deleting { target } => Some((target, true)),
        }
        .map(|(target, deleting)| DeleteDialogView {
            title: posts.find(target).map(|post| post.title.clone()),
            target: target.clone(),
            deleting,
        });

        let rows = posts
            .posts
            .iter()
            .map(|post| PostRowView::build(post, state.edit_id.as_deref()))
            .collect();

        Self {
            heading: if state.is_edit_mode() {
                "Edytuj wpis"
            } else {
                "Nowy wpis"
            },
            edit_id: state.edit_id.clone(),
            loading: state.is_loading(),
            fields: EditorFieldsView {
                title: fields.title.clone(),
                slug: fields.slug.clone(),
                category: fields.category.clone(),
                excerpt: fields.excerpt.clone(),
                html_content: fields.html_content.clone(),
                main_image: fields.main_image.clone(),
            },
            main_upload: UploadSlotView::from(&state.main_upload),
            inline_upload: UploadSlotView::from(&state.inline_upload),
            inline_image,
            preview,
            publish,
            delete_dialog,
            error: state.error.clone(),
            posts_loaded: posts.loaded,
            posts: rows,
        }
    }
}

impl PostRowView {
    fn build(post: &Post, editing: Option<&str>) -> Self {
        let date_label = post
            .updated_at
            .or(post.created_at)
            .map(format_date)
            .unwrap_or_default();
        Self {
            id: post.id.clone(),
            title: post.title.clone(),
            category: post.category.clone(),
            date_label,
            edit_href: admin_path(&[], Some(&post.id)),
            delete_action: admin_path(&["posts", &post.id, "delete"], None),
            is_editing: editing == Some(post.id.as_str()),
        }
    }
}

#[derive(Template)]
#[template(path = "admin/editor.html")]
pub struct AdminEditorTemplate {
    pub view: AdminLayout<EditorPageView>,
}

/// Long Polish date, e.g. `19 października 2026`.
pub fn format_date(at: OffsetDateTime) -> String {
    let month = match at.month() {
        Month::January => "stycznia",
        Month::February => "lutego",
        Month::March => "marca",
        Month::April => "kwietnia",
        Month::May => "maja",
        Month::June => "czerwca",
        Month::July => "lipca",
        Month::August => "sierpnia",
        Month::September => "września",
        Month::October => "października",
        Month::November => "listopada",
        Month::December => "grudnia",
    };
    format!("{} {} {}", at.day(), month, at.year())
}

/// Strip scripts and event handlers from the body before it is shown in the preview.
pub fn sanitize_preview(html: &str) -> String {
    ammonia::Builder::default()
        .add_generic_attributes(&["class"])
        .clean(html)
        .to_string()
}

/// Admin-relative path with percent-encoded segments and an optional `id` query.
fn admin_path(segments: &[&str], id: Option<&str>) -> String {
    let Ok(mut url) = Url::parse("http://admin.invalid/") else {
        return "/".to_string();
    };
    if let Ok(mut path) = url.path_segments_mut() {
        path.clear().extend(segments);
    }
    if let Some(id) = id {
        url.query_pairs_mut().append_pair("id", id);
    }
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::macros::datetime;

    use super::*;
    use crate::application::editor::FieldsInput;

    fn post(id: &str) -> Post {
        Post {
            id: id.into(),
            title: "Stored".into(),
            slug: "stored".into(),
            category: "Notes".into(),
            excerpt: String::new(),
            main_image: None,
            html_content: String::new(),
            created_at: Some(datetime!(2026-03-01 10:00 UTC)),
            updated_at: Some(datetime!(2026-10-19 10:00 UTC)),
            published: true,
        }
    }

    #[test]
    fn polish_long_dates() {
        assert_eq!(format_date(datetime!(2026-10-19 08:00 UTC)), "19 października 2026");
        assert_eq!(format_date(datetime!(2026-01-02 08:00 UTC)), "2 stycznia 2026");
    }

    #[test]
    fn preview_strips_scripts_and_keeps_classes() {
        let cleaned = sanitize_preview(
            r#"<p class="lead" onclick="x()">Hi</p><script>alert(1)</script>"#,
        );
        assert_eq!(cleaned, r#"<p class="lead">Hi</p>"#);
    }

    #[test]
    fn rows_link_to_edit_and_delete() {
        let row = PostRowView::build(&post("a b/c"), None);
        assert_eq!(row.edit_href, "/?id=a+b%2Fc");
        assert_eq!(row.delete_action, "/posts/a%20b%2Fc/delete");
        assert_eq!(row.date_label, "19 października 2026");
    }

    #[test]
    fn empty_editor_shows_placeholders_and_hint() {
        let state = EditorState::default();
        let view = EditorPageView::build(
            &state,
            &PostSnapshot::default(),
            datetime!(2026-10-19 08:00 UTC),
        );

        assert_eq!(view.heading, "Nowy wpis");
        assert!(!view.preview.has_title);
        assert!(view.preview.body_html.is_none());
        assert!(view.publish.missing_required);
        assert!(!view.posts_loaded);
    }

    #[test]
    fn delete_dialog_names_the_target() {
        let mut state = EditorState::default();
        state.update_fields(FieldsInput {
            title: "Draft".into(),
            ..FieldsInput::default()
        });
        state.request_delete("a".into()).expect("request");
        let snapshot = PostSnapshot {
            posts: Arc::new(vec![post("a")]),
            loaded: true,
        };

        let view = EditorPageView::build(&state, &snapshot, datetime!(2026-10-19 08:00 UTC));
        let dialog = view.delete_dialog.expect("dialog");
        assert_eq!(dialog.title.as_deref(), Some("Stored"));
        assert!(!dialog.deleting);
        assert_eq!(view.posts.len(), 1);
    }
}
