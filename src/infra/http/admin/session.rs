use axum::{extract::State, response::Response};

use super::AdminState;
use super::editor::back_to_editor;

pub(super) async fn sign_in(State(state): State<AdminState>) -> Response {
    state.session.sign_in();
    back_to_editor(&state).await
}

pub(super) async fn sign_out(State(state): State<AdminState>) -> Response {
    state.session.sign_out();
    back_to_editor(&state).await
}
