use axum::{
    body::Body,
    extract::{Path, State},
    http::{
        StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};

use crate::application::{error::HttpError, repos::StorageError};

use super::AdminState;

const SOURCE: &str = "infra::http::admin::media";

pub(crate) async fn serve_media(
    State(state): State<AdminState>,
    Path(path): Path<String>,
) -> Response {
    let bytes = match state.storage.read(&path).await {
        Ok(bytes) => bytes,
        Err(err) => return media_error(err).into_response(),
    };

    let content_type = mime_guess::from_path(&path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type)
        .header(CACHE_CONTROL, "public, max-age=31536000, immutable")
        .body(Body::from(bytes))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn media_error(err: StorageError) -> HttpError {
    let (status, public_message) = match &err {
        StorageError::NotFound(_) => (StatusCode::NOT_FOUND, "Media not found"),
        StorageError::InvalidPath(_) => (StatusCode::BAD_REQUEST, "Invalid media path"),
        StorageError::EmptyPayload | StorageError::PublicUrl(_) | StorageError::Io(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "Media could not be read")
        }
    };
    HttpError::from_error(SOURCE, status, public_message, &err)
}
