use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("stored document `{document}` does not match the post shape: {message}")]
    MalformedDocument { document: String, message: String },
}

impl DomainError {
    pub fn malformed(document: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedDocument {
            document: document.into(),
            message: message.into(),
        }
    }
}
