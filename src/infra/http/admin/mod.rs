mod editor;
mod forms;
mod health;
mod media;
mod session;
mod state;
mod uploads;

pub use state::AdminState;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};

use super::middleware::{log_responses, set_request_context};

pub fn build_admin_router(state: AdminState, upload_body_limit: usize) -> Router {
    Router::new()
        .route("/", get(editor::editor_page))
        .route("/fields", post(editor::update_fields))
        .route(
            "/uploads/main",
            post(uploads::upload_main_image).layer(DefaultBodyLimit::max(upload_body_limit)),
        )
        .route(
            "/uploads/inline",
            post(uploads::upload_inline_image).layer(DefaultBodyLimit::max(upload_body_limit)),
        )
        .route("/inline/copy", post(editor::copy_inline_tag))
        .route("/publish", post(editor::request_publish))
        .route("/publish/confirm", post(editor::confirm_publish))
        .route("/publish/cancel", post(editor::cancel_publish))
        .route("/posts/{id}/delete", post(editor::request_delete))
        .route("/delete/confirm", post(editor::confirm_delete))
        .route("/delete/cancel", post(editor::cancel_delete))
        .route("/errors/dismiss", post(editor::dismiss_error))
        .route("/session/sign-in", post(session::sign_in))
        .route("/session/sign-out", post(session::sign_out))
        .route("/media/{*path}", get(media::serve_media))
        .route("/_health", get(health::admin_health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}
