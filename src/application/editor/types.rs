use thiserror::Error;

use crate::application::{
    assets::UploadError,
    repos::{DocumentHandle, RepoError},
};

/// Failures of the database writes behind publish and delete.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("lookup of post `{id}` failed")]
    Query {
        id: String,
        #[source]
        source: RepoError,
    },
    #[error("no stored post has id `{id}`")]
    MissingTarget { id: String },
    #[error("creating the post failed")]
    Create {
        #[source]
        source: RepoError,
    },
    #[error("updating `{handle}` failed")]
    Update {
        handle: DocumentHandle,
        #[source]
        source: RepoError,
    },
    #[error("deleting `{handle}` failed")]
    Delete {
        handle: DocumentHandle,
        #[source]
        source: RepoError,
    },
    #[error("could not allocate an unused post id")]
    IdExhausted,
}

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("a publish is already in progress")]
    PublishBusy,
    #[error("publish is not awaiting confirmation")]
    NotAwaitingConfirmation,
    #[error("verification code rejected")]
    InvalidCode,
    #[error("a delete is already in progress")]
    DeleteBusy,
    #[error("no delete is awaiting confirmation")]
    NoDeletePending,
    #[error("an upload into this slot is already running")]
    UploadBusy,
    #[error("no inline image has been uploaded yet")]
    NothingToCopy,
    #[error("no signed-in session")]
    AuthTokenUnavailable,
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Write(#[from] WriteError),
}

impl EditorError {
    /// Message shown to the operator on the page.
    pub fn operator_message(&self) -> String {
        match self {
            EditorError::PublishBusy => "Publikowanie już trwa.".to_string(),
            EditorError::NotAwaitingConfirmation => {
                "Najpierw otwórz okno potwierdzenia publikacji.".to_string()
            }
            EditorError::InvalidCode => "Nieprawidłowy kod weryfikacyjny.".to_string(),
            EditorError::DeleteBusy => "Usuwanie już trwa.".to_string(),
            EditorError::NoDeletePending => "Brak wpisu oczekującego na usunięcie.".to_string(),
            EditorError::UploadBusy => "Poczekaj na zakończenie przesyłania.".to_string(),
            EditorError::NothingToCopy => "Najpierw prześlij obrazek do treści.".to_string(),
            EditorError::AuthTokenUnavailable => {
                "Brak zalogowanej sesji; operacja nie została wykonana.".to_string()
            }
            EditorError::Upload(err) => format!("Przesyłanie nie powiodło się: {err}."),
            EditorError::Write(WriteError::MissingTarget { id }) => {
                format!("Wpis `{id}` już nie istnieje.")
            }
            EditorError::Write(err) => format!("Zapis nie powiódł się: {err}."),
        }
    }
}
