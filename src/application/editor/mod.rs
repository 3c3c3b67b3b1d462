//! The single-operator post editor: field editing, uploads, publish and delete.

mod delete;
mod publish;
mod service;
mod state;
mod types;

pub use delete::DeleteWorkflow;
pub use publish::{PublishWorkflow, VerificationCode};
pub use service::{EditorService, EditorTimings};
pub use state::{
    DeletePhase, EditorState, FieldsInput, PublishOutcome, PublishPhase, PublishTicket,
    UploadStatus,
};
pub use types::{EditorError, WriteError};
