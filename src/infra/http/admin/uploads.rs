//! Multipart image uploads into the main and inline slots.

use axum::{extract::State, http::StatusCode, response::Response};
use axum_extra::extract::Multipart;
use tracing::{error, warn};

use crate::application::assets::UploadedAsset;
use crate::domain::uploads::AssetFolder;

use super::AdminState;
use super::editor::back_to_editor;

const SOURCE_BASE: &str = "infra::http::admin::uploads";

enum UploadPayloadError {
    Missing,
    PayloadTooLarge,
    InvalidFormData,
    Read,
}

impl UploadPayloadError {
    fn operator_message(&self, limit_bytes: u64) -> String {
        match self {
            UploadPayloadError::Missing => "Wybierz plik do przesłania.".to_string(),
            UploadPayloadError::PayloadTooLarge => {
                let limit_mib = limit_bytes.div_ceil(1_048_576);
                format!("Plik jest za duży (limit to {limit_mib} MiB).")
            }
            UploadPayloadError::InvalidFormData => {
                "Dane formularza przesyłania są nieprawidłowe.".to_string()
            }
            UploadPayloadError::Read => "Przesyłanie nie powiodło się, spróbuj ponownie.".to_string(),
        }
    }
}

pub(crate) async fn upload_main_image(
    State(state): State<AdminState>,
    multipart: Multipart,
) -> Response {
    handle_upload(state, multipart, AssetFolder::Main).await
}

pub(crate) async fn upload_inline_image(
    State(state): State<AdminState>,
    multipart: Multipart,
) -> Response {
    handle_upload(state, multipart, AssetFolder::Inline).await
}

async fn handle_upload(state: AdminState, mut multipart: Multipart, folder: AssetFolder) -> Response {
    match read_upload_payload(&mut multipart).await {
        Ok(asset) => {
            // Failures are recorded on the slot by the editor.
            let _ = state.editor.upload(folder, asset).await;
        }
        Err(err) => {
            let message = err.operator_message(state.upload_limit_bytes);
            warn!(
                target = SOURCE_BASE,
                folder = %folder,
                reason = %message,
                "upload payload rejected"
            );
            state.editor.reject_upload(folder, message).await;
        }
    }
    back_to_editor(&state).await
}

async fn read_upload_payload(
    multipart: &mut Multipart,
) -> Result<UploadedAsset, UploadPayloadError> {
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("file") {
                    continue;
                }

                let file_name = field
                    .file_name()
                    .map(|value| value.to_string())
                    .filter(|value| !value.trim().is_empty())
                    .ok_or(UploadPayloadError::Missing)?;
                let content_type = field.content_type().map(|mime| mime.to_string());

                let bytes = field.bytes().await.map_err(|err| {
                    error!(
                        target = SOURCE_BASE,
                        status = err.status().as_u16(),
                        error = %err,
                        "failed to read upload body"
                    );
                    payload_error(err.status())
                })?;
                if bytes.is_empty() {
                    return Err(UploadPayloadError::Missing);
                }

                return Ok(UploadedAsset::new(file_name, content_type, bytes));
            }
            Ok(None) => break,
            Err(err) => {
                let status = err.status();
                error!(
                    target = SOURCE_BASE,
                    status = status.as_u16(),
                    error = %err,
                    "failed to read multipart payload"
                );
                return Err(payload_error(status));
            }
        }
    }

    Err(UploadPayloadError::Missing)
}

fn payload_error(status: StatusCode) -> UploadPayloadError {
    match status {
        StatusCode::PAYLOAD_TOO_LARGE => UploadPayloadError::PayloadTooLarge,
        StatusCode::BAD_REQUEST => UploadPayloadError::InvalidFormData,
        _ => UploadPayloadError::Read,
    }
}
