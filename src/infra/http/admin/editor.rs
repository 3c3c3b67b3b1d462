//! Editor page and the form actions that drive it.
//!
//! Every action answers with a `303 See Other` back to the page for the editor's current
//! mode. Workflow failures are recorded in the editor state and shown on the page.

use axum::{
    extract::{Form, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use time::OffsetDateTime;
use tracing::debug;

use crate::presentation::{
    admin::views::{AdminChrome, AdminEditorTemplate, AdminLayout, EditorPageView},
    views::render_template_response,
};

use super::AdminState;
use super::forms::{EditorQuery, FieldsForm, PublishConfirmForm};

pub(super) async fn back_to_editor(state: &AdminState) -> Response {
    let location = state.editor.snapshot().await.location();
    Redirect::to(&location).into_response()
}

pub(crate) async fn editor_page(
    State(state): State<AdminState>,
    Query(query): Query<EditorQuery>,
) -> Response {
    let editor = state.editor.open(query.id).await;
    let posts = state.editor.posts();

    let content = EditorPageView::build(&editor, &posts, OffsetDateTime::now_utc());
    let chrome = AdminChrome {
        signed_in: state.session.is_signed_in(),
        ..AdminChrome::default()
    };
    let view = AdminLayout::new(chrome, content);
    render_template_response(AdminEditorTemplate { view }, StatusCode::OK)
}

pub(crate) async fn update_fields(
    State(state): State<AdminState>,
    Form(form): Form<FieldsForm>,
) -> Response {
    state.editor.update_fields(form.into()).await;
    back_to_editor(&state).await
}

pub(crate) async fn copy_inline_tag(State(state): State<AdminState>) -> Response {
    if let Err(err) = state.editor.copy_inline_tag().await {
        debug!(target = "postdesk::http::admin::editor", error = %err, "nothing to copy");
    }
    back_to_editor(&state).await
}

pub(crate) async fn request_publish(State(state): State<AdminState>) -> Response {
    let _ = state.editor.request_publish().await;
    back_to_editor(&state).await
}

pub(crate) async fn confirm_publish(
    State(state): State<AdminState>,
    Form(form): Form<PublishConfirmForm>,
) -> Response {
    let _ = state.editor.confirm_publish(&form.code).await;
    back_to_editor(&state).await
}

pub(crate) async fn cancel_publish(State(state): State<AdminState>) -> Response {
    state.editor.cancel_publish().await;
    back_to_editor(&state).await
}

pub(crate) async fn request_delete(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Response {
    let _ = state.editor.request_delete(id).await;
    back_to_editor(&state).await
}

pub(crate) async fn confirm_delete(State(state): State<AdminState>) -> Response {
    let _ = state.editor.confirm_delete().await;
    back_to_editor(&state).await
}

pub(crate) async fn cancel_delete(State(state): State<AdminState>) -> Response {
    state.editor.cancel_delete().await;
    back_to_editor(&state).await
}

pub(crate) async fn dismiss_error(State(state): State<AdminState>) -> Response {
    state.editor.dismiss_error().await;
    back_to_editor(&state).await
}
