use pdfsign_core::PdfSignError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Failed to create HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("Failed to send request: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid form field {field}: {message}")]
    Form { field: &'static str, message: String },

    #[error("No artifact URL configured for the second signing step")]
    MissingArtifactUrl,

    #[error("Invalid artifact URL: {0}")]
    InvalidArtifactUrl(String),
}

impl From<ClientError> for PdfSignError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Build(_)
            | ClientError::MissingArtifactUrl
            | ClientError::InvalidArtifactUrl(_) => {
                PdfSignError::Config(err.to_string())
            }
            ClientError::Request(_) => PdfSignError::Transport(err.to_string()),
            ClientError::Form { .. } => PdfSignError::InvalidInput(err.to_string()),
        }
    }
}
