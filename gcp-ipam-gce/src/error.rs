use thiserror::Error;

/// Errors from the GCE REST surface and the metadata server.
#[derive(Debug, Error)]
pub enum Error {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gce api error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("operation failed: {0}")]
    Operation(String),

    #[error("metadata server error: {0}")]
    Metadata(String),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
